//! Integer division of scaled amounts across miners.

use crate::models::{Credit, Scaled};

/// Splits `fee` evenly; the indivisible remainder goes one unit at a time
/// to the first logins.
pub fn even_split(fee: Scaled, logins: &[String]) -> Vec<Credit> {
    if logins.is_empty() {
        return Vec::new();
    }
    let n = logins.len() as i64;
    let each = fee.units().div_euclid(n);
    let leftover = fee.units().rem_euclid(n) as usize;
    logins
        .iter()
        .enumerate()
        .map(|(i, login)| Credit {
            login: login.clone(),
            amount: Scaled::from_units(each + (i < leftover) as i64),
        })
        .collect()
}

/// `amount * diff / total + fee / n` for every participant.
///
/// The proportional part uses largest-remainder rounding, so when the
/// participants' diffs add up to `total` the credits sum to exactly
/// `amount + fee`.
pub fn proportional_split(
    amount: Scaled,
    fee: Scaled,
    diffs: &[(String, i64)],
    total: i64,
) -> Vec<Credit> {
    if diffs.is_empty() || total <= 0 {
        return Vec::new();
    }
    let amount = amount.units() as i128;
    let total = total as i128;

    let mut parts: Vec<(i128, i128)> = diffs
        .iter()
        .map(|(_, diff)| {
            let exact = amount * (*diff).max(0) as i128;
            (exact / total, exact % total)
        })
        .collect();

    let contributed: i128 = diffs.iter().map(|(_, d)| (*d).max(0) as i128).sum();
    let target = amount * contributed.min(total) / total;
    let assigned: i128 = parts.iter().map(|(base, _)| *base).sum();
    let mut order: Vec<usize> = (0..parts.len()).collect();
    order.sort_by(|a, b| parts[*b].1.cmp(&parts[*a].1));
    for i in order.into_iter().take((target - assigned).max(0) as usize) {
        parts[i].0 += 1;
    }

    let logins: Vec<String> = diffs.iter().map(|(login, _)| login.clone()).collect();
    even_split(fee, &logins)
        .into_iter()
        .zip(parts)
        .map(|(credit, (base, _))| Credit {
            login: credit.login,
            amount: credit.amount + Scaled::from_units(base as i64),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logins(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn even_split_conserves_fee() {
        let credits = even_split(Scaled::from_units(10), &logins(&["a", "b", "c"]));
        let amounts: Vec<i64> = credits.iter().map(|c| c.amount.units()).collect();
        assert_eq!(amounts, vec![4, 3, 3]);
    }

    #[test]
    fn proportional_split_follows_diff() {
        let diffs = vec![("a".to_string(), 1), ("b".to_string(), 3)];
        let credits = proportional_split(Scaled::from_whole(8), Scaled::from_whole(2), &diffs, 4);
        assert_eq!(credits[0].amount, Scaled::from_whole(3));
        assert_eq!(credits[1].amount, Scaled::from_whole(7));
    }

    #[test]
    fn proportional_split_conserves_awkward_fractions() {
        let diffs = vec![
            ("a".to_string(), 1),
            ("b".to_string(), 1),
            ("c".to_string(), 1),
        ];
        let amount = Scaled::from_coins(1.0);
        let fee = Scaled::from_coins(0.1);
        let credits = proportional_split(amount, fee, &diffs, 3);
        let total: Scaled = credits.iter().map(|c| c.amount).sum();
        assert_eq!(total, amount + fee);
        let max = credits.iter().map(|c| c.amount).max().unwrap();
        let min = credits.iter().map(|c| c.amount).min().unwrap();
        assert!((max - min).units() <= 2);
    }

    #[test]
    fn missing_diff_leaves_remainder_unassigned() {
        let diffs = vec![("a".to_string(), 1)];
        let credits = proportional_split(Scaled::from_whole(10), Scaled::ZERO, &diffs, 4);
        assert_eq!(credits[0].amount, Scaled::from_coins(2.5));
    }
}
