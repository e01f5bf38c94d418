//! Applying a posted entry to account running totals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use neoledger_core::{AccountId, LedgerError, LedgerResult, money};

use crate::account::Account;
use crate::entry::LedgerLine;

/// Net debits/credits one entry contributes to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingEffect {
    pub account_id: AccountId,
    pub debit: i64,
    pub credit: i64,
}

/// Aggregate lines per account, ordered by account id (the lock order).
pub fn posting_effects(lines: &[LedgerLine]) -> LedgerResult<Vec<PostingEffect>> {
    let mut by_account: BTreeMap<AccountId, (i64, i64)> = BTreeMap::new();
    for line in lines {
        let slot = by_account.entry(line.account_id).or_insert((0, 0));
        slot.0 = money::checked_add(slot.0, line.debit_amount, "line debit sum")?;
        slot.1 = money::checked_add(slot.1, line.credit_amount, "line credit sum")?;
    }
    Ok(by_account
        .into_iter()
        .map(|(account_id, (debit, credit))| PostingEffect {
            account_id,
            debit,
            credit,
        })
        .collect())
}

/// Apply effects to locked accounts.
///
/// All-or-nothing: on any error the map is left untouched.
pub fn apply_posting_effects(
    accounts: &mut BTreeMap<AccountId, Account>,
    effects: &[PostingEffect],
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let mut updated = Vec::with_capacity(effects.len());
    for effect in effects {
        let mut account = accounts
            .get(&effect.account_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("account {}", effect.account_id)))?;
        account.apply_posting(effect.debit, effect.credit, now)?;
        updated.push(account);
    }
    for account in updated {
        accounts.insert(account.id, account);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoledger_core::{Currency, EntryId, LineId, Metadata};

    use crate::account::{AccountType, NewAccount};

    fn open(code: &str, kind: AccountType) -> Account {
        Account::open(
            AccountId::new(),
            NewAccount {
                code: code.to_string(),
                name: code.to_string(),
                account_type: kind,
                currency: Currency::parse("INR").unwrap(),
                parent_id: None,
                metadata: Metadata::new(),
            },
            Utc::now(),
        )
    }

    fn line(n: u32, account_id: AccountId, debit: i64, credit: i64) -> LedgerLine {
        LedgerLine {
            id: LineId::new(),
            entry_id: EntryId::new(),
            line_number: n,
            account_id,
            debit_amount: debit,
            credit_amount: credit,
            description: None,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn sale_moves_cash_and_revenue() {
        let cash = open("1000", AccountType::Asset);
        let revenue = open("4000", AccountType::Revenue);
        let lines = vec![line(1, cash.id, 10_000, 0), line(2, revenue.id, 0, 10_000)];

        let mut accounts = BTreeMap::from([(cash.id, cash.clone()), (revenue.id, revenue.clone())]);
        let effects = posting_effects(&lines).unwrap();
        apply_posting_effects(&mut accounts, &effects, Utc::now()).unwrap();

        assert_eq!(accounts[&cash.id].balance, 10_000);
        assert_eq!(accounts[&revenue.id].balance, 10_000);
        assert_eq!(accounts[&revenue.id].credit_total, 10_000);
    }

    #[test]
    fn repeated_account_lines_are_aggregated() {
        let a = AccountId::new();
        let b = AccountId::new();
        let lines = vec![line(1, a, 100, 0), line(2, b, 0, 150), line(3, a, 50, 0)];
        let effects = posting_effects(&lines).unwrap();
        assert_eq!(effects.len(), 2);
        let a_effect = effects.iter().find(|e| e.account_id == a).unwrap();
        assert_eq!((a_effect.debit, a_effect.credit), (150, 0));
    }

    #[test]
    fn missing_account_leaves_others_untouched() {
        let cash = open("1000", AccountType::Asset);
        let lines = vec![line(1, cash.id, 100, 0), line(2, AccountId::new(), 0, 100)];
        let mut accounts = BTreeMap::from([(cash.id, cash.clone())]);
        let effects = posting_effects(&lines).unwrap();
        assert!(apply_posting_effects(&mut accounts, &effects, Utc::now()).is_err());
        assert_eq!(accounts[&cash.id].balance, 0);
    }
}
