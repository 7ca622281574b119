mod settings;

pub use settings::{
    RetentionSettings, RetrySettings, RewardMode, RewardSettings, Settings, StoreSettings,
};
