use super::Scaled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceKind {
    Reward,
    Payment,
}

impl BalanceKind {
    pub fn tag(self) -> &'static str {
        match self {
            BalanceKind::Reward => "reward",
            BalanceKind::Payment => "payment",
        }
    }
}

/// One entry of an account's `balance` stream.
///
/// `reference` is the job hash for rewards and the remark (or the paid
/// login, on the pool stream) for payments. `id` tells apart events that
/// are otherwise identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub kind: BalanceKind,
    pub amount: Scaled,
    pub millis: i64,
    pub id: String,
    pub tx_hash: String,
    pub reference: String,
}

impl BalanceEntry {
    pub fn parse(member: &str) -> Option<Self> {
        let mut parts = member.splitn(6, ':');
        let kind = match parts.next()? {
            "reward" => BalanceKind::Reward,
            "payment" => BalanceKind::Payment,
            _ => return None,
        };
        let amount = Scaled::from_units(parts.next()?.parse().ok()?);
        let millis = parts.next()?.parse().ok()?;
        let id = parts.next()?.to_string();
        let tx_hash = parts.next()?.to_string();
        let reference = parts.next().unwrap_or_default().to_string();
        Some(Self {
            kind,
            amount,
            millis,
            id,
            tx_hash,
            reference,
        })
    }
}

/// Balance counters of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub reward: Scaled,
    pub unpaid: Scaled,
    pub payment: Scaled,
}

impl AccountSnapshot {
    pub fn is_consistent(&self) -> bool {
        self.unpaid == self.reward - self.payment
    }
}
