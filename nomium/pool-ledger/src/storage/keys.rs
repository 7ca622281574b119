use std::fmt::Display;

/// Colon-joins the display form of every part.
pub fn join(parts: &[&dyn Display]) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// Key layout of the ledger, scoped under a configured prefix.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, parts: &[&dyn Display]) -> String {
        format!("{}:{}", self.prefix, join(parts))
    }

    pub fn hashrate(&self) -> String {
        self.key(&[&"hashrate"])
    }

    pub fn login_hashrate(&self, login: &str) -> String {
        self.key(&[&"hashrate", &login])
    }

    pub fn login_hashrate_pattern(&self) -> String {
        self.key(&[&"hashrate", &"*"])
    }

    /// Login of a per-login hashrate key, `None` for any other key.
    pub fn login_of_hashrate_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        self.strip(key, "hashrate")
    }

    pub fn invalid_hashrate(&self) -> String {
        self.key(&[&"invalidhashrate"])
    }

    pub fn reject_hashrate(&self) -> String {
        self.key(&[&"rejecthashrate"])
    }

    pub fn round_shares(&self) -> String {
        self.key(&[&"shares", &"roundCurrent"])
    }

    pub fn works(&self, login: &str, worker_id: &str) -> String {
        self.key(&[&"works", &format!("{}.{}", login, worker_id)])
    }

    pub fn miner(&self, login: &str) -> String {
        self.key(&[&"miners", &login])
    }

    pub fn stats(&self) -> String {
        self.key(&[&"stats"])
    }

    pub fn account(&self, login: &str) -> String {
        self.key(&[&"account", &login])
    }

    pub fn account_pattern(&self) -> String {
        self.key(&[&"account", &"*"])
    }

    pub fn login_of_account_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        self.strip(key, "account")
    }

    pub fn pool_account(&self) -> String {
        self.key(&[&"pool", &"account"])
    }

    pub fn rewards(&self, login: &str) -> String {
        self.key(&[&"rewards", &login])
    }

    pub fn pool_rewards(&self) -> String {
        self.key(&[&"pool", &"rewards"])
    }

    pub fn payment(&self, login: &str) -> String {
        self.key(&[&"payment", &login])
    }

    pub fn pool_payment(&self) -> String {
        self.key(&[&"pool", &"payment"])
    }

    pub fn balance(&self, login: &str) -> String {
        self.key(&[&"balance", &login])
    }

    pub fn pool_balance(&self) -> String {
        self.key(&[&"pool", &"balance"])
    }

    pub fn donate(&self, fund: &str) -> String {
        self.key(&[&"donate", &fund])
    }

    pub fn mini(&self, job_hash: &str) -> String {
        self.key(&[&"mini", &job_hash])
    }

    pub fn submit(&self, job_hash: &str) -> String {
        self.key(&[&"submit", &job_hash])
    }

    /// Hash of pool-wide diff, one field per job hash.
    pub fn pool_diff(&self) -> String {
        self.key(&[&"pool", &"diff"])
    }

    /// Hash of per-miner diff of one job, one field per login.
    pub fn job(&self, job_hash: &str) -> String {
        self.key(&[&"job", &job_hash])
    }

    pub fn waiting(&self) -> String {
        self.key(&[&"waiting"])
    }

    pub fn win(&self) -> String {
        self.key(&[&"win"])
    }

    pub fn lost(&self) -> String {
        self.key(&[&"lost"])
    }

    fn strip<'a>(&self, key: &'a str, section: &str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())?
            .strip_prefix(':')?
            .strip_prefix(section)?
            .strip_prefix(':')
            .filter(|rest| !rest.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_typed_parts() {
        assert_eq!(join(&[&"reward", &15_i64, &"tx", &3_u64]), "reward:15:tx:3");
    }

    #[test]
    fn formats_prefixed_keys() {
        let keys = KeySpace::new("xdag");
        assert_eq!(keys.login_hashrate("alice"), "xdag:hashrate:alice");
        assert_eq!(keys.round_shares(), "xdag:shares:roundCurrent");
        assert_eq!(keys.works("alice", "rig1"), "xdag:works:alice.rig1");
        assert_eq!(keys.mini("J1"), "xdag:mini:J1");
    }

    #[test]
    fn extracts_login_from_keys() {
        let keys = KeySpace::new("xdag");
        assert_eq!(keys.login_of_hashrate_key("xdag:hashrate:alice"), Some("alice"));
        assert_eq!(keys.login_of_hashrate_key("xdag:hashrate"), None);
        assert_eq!(keys.login_of_account_key("xdag:account:bob"), Some("bob"));
        assert_eq!(keys.login_of_account_key("other:account:bob"), None);
    }
}
