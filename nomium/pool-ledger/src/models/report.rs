use super::Scaled;
use crate::errors::LedgerError;

/// Result of a read that walks a cursor; a scan failure keeps what was
/// collected before it.
#[derive(Debug)]
pub struct ScanReport<T> {
    pub items: T,
    pub error: Option<LedgerError>,
}

impl<T> ScanReport<T> {
    pub fn complete(items: T) -> Self {
        Self { items, error: None }
    }

    pub fn partial(items: T, error: LedgerError) -> Self {
        Self {
            items,
            error: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, LedgerError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.items),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub login: String,
    pub amount: Scaled,
}

#[derive(Debug)]
pub struct FailedCredit {
    pub credit: Credit,
    pub error: LedgerError,
}

/// Per-recipient outcome of splitting a reward across miners.
///
/// Credits are independent transactions: entries in `failed` were not
/// applied and can be retried one by one.
#[derive(Debug, Default)]
pub struct Distribution {
    pub job_hash: String,
    pub credited: Vec<Credit>,
    pub failed: Vec<FailedCredit>,
}

impl Distribution {
    pub fn new(job_hash: &str) -> Self {
        Self {
            job_hash: job_hash.to_string(),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_credited(&self) -> Scaled {
        self.credited.iter().map(|c| c.amount).sum()
    }

    pub fn credited_to(&self, login: &str) -> Option<Scaled> {
        self.credited
            .iter()
            .find(|c| c.login == login)
            .map(|c| c.amount)
    }
}
