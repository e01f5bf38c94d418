use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use neoledger_core::{AccountId, EntryId, LedgerError, LedgerResult, LineId, Metadata, UserId};

use crate::account::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Standard,
    Opening,
    Closing,
    Adjusting,
    /// Reserved for entries produced by `Reverse`/`Void`.
    Reversing,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Standard => "standard",
            EntryType::Opening => "opening",
            EntryType::Closing => "closing",
            EntryType::Adjusting => "adjusting",
            EntryType::Reversing => "reversing",
        }
    }
}

impl core::str::FromStr for EntryType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(EntryType::Standard),
            "opening" => Ok(EntryType::Opening),
            "closing" => Ok(EntryType::Closing),
            "adjusting" => Ok(EntryType::Adjusting),
            "reversing" => Ok(EntryType::Reversing),
            other => Err(LedgerError::validation(format!(
                "invalid entry type '{other}': must be one of standard, opening, closing, adjusting, reversing"
            ))),
        }
    }
}

/// Journal entry lifecycle.
///
/// `Draft → Posted → {Voided | Reversed}`. Only drafts are editable; every
/// transition out of `Posted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Voided,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Voided => "voided",
            EntryStatus::Reversed => "reversed",
        }
    }
}

impl core::str::FromStr for EntryStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(EntryStatus::Draft),
            "posted" => Ok(EntryStatus::Posted),
            "voided" => Ok(EntryStatus::Voided),
            "reversed" => Ok(EntryStatus::Reversed),
            other => Err(LedgerError::validation(format!(
                "invalid entry status '{other}': must be one of draft, posted, voided, reversed"
            ))),
        }
    }
}

/// One side of a journal entry as submitted by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerLine {
    pub account_id: AccountId,
    /// Amount in smallest unit (e.g. paise). Exactly one side is positive.
    pub debit_amount: i64,
    pub credit_amount: i64,
    pub description: Option<String>,
    pub metadata: Metadata,
}

impl NewLedgerLine {
    pub fn debit(account_id: AccountId, amount: i64) -> Self {
        Self {
            account_id,
            debit_amount: amount,
            credit_amount: 0,
            description: None,
            metadata: Metadata::new(),
        }
    }

    pub fn credit(account_id: AccountId, amount: i64) -> Self {
        Self {
            account_id,
            debit_amount: 0,
            credit_amount: amount,
            description: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A persisted line of a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub id: LineId,
    pub entry_id: EntryId,
    /// 1-based position in creation order.
    pub line_number: u32,
    pub account_id: AccountId,
    pub debit_amount: i64,
    pub credit_amount: i64,
    pub description: Option<String>,
    pub metadata: Metadata,
}

/// Exactly one side strictly positive, the other exactly zero.
fn check_line_sides(index: usize, debit: i64, credit: i64) -> LedgerResult<()> {
    let line_no = index + 1;
    if debit < 0 || credit < 0 {
        return Err(LedgerError::validation(format!(
            "line {line_no}: amounts must not be negative"
        )));
    }
    match (debit > 0, credit > 0) {
        (true, false) | (false, true) => Ok(()),
        (true, true) => Err(LedgerError::validation(format!(
            "line {line_no}: a line cannot carry both a debit and a credit"
        ))),
        (false, false) => Err(LedgerError::validation(format!(
            "line {line_no}: either debit_amount or credit_amount must be positive"
        ))),
    }
}

/// Check Σdebit == Σcredit over `(debit, credit)` pairs.
///
/// Sums are accumulated in `i128`; the returned total is the debit side.
pub fn ensure_balanced(lines: impl IntoIterator<Item = (i64, i64)>) -> LedgerResult<i128> {
    let mut debits: i128 = 0;
    let mut credits: i128 = 0;
    for (debit, credit) in lines {
        debits += debit as i128;
        credits += credit as i128;
    }
    if debits != credits {
        return Err(LedgerError::validation(format!(
            "entry not balanced: debits={debits}, credits={credits}"
        )));
    }
    Ok(debits)
}

/// Request to create a draft journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJournalEntry {
    pub entry_type: EntryType,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub lines: Vec<NewLedgerLine>,
    pub metadata: Metadata,
    pub created_by: Option<UserId>,
}

impl NewJournalEntry {
    pub fn new(entry_type: EntryType, description: impl Into<String>, lines: Vec<NewLedgerLine>) -> Self {
        Self {
            entry_type,
            description: description.into(),
            reference_type: None,
            reference_id: None,
            lines,
            metadata: Metadata::new(),
            created_by: None,
        }
    }

    pub fn with_reference(mut self, reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn created_by(mut self, user: Option<UserId>) -> Self {
        self.created_by = user;
        self
    }

    /// Validation for caller-submitted entries: structure plus the rule that
    /// `reversing` entries are produced only by the engine.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.entry_type == EntryType::Reversing {
            return Err(LedgerError::validation(
                "entry type 'reversing' is reserved for reversals; use the reverse operation",
            ));
        }
        self.validate_structure()
    }

    /// Line count, per-line sides, reference pairing and the balance invariant.
    pub fn validate_structure(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::validation(format!(
                "journal entry requires at least 2 lines, got {}",
                self.lines.len()
            )));
        }
        if self.reference_type.is_some() != self.reference_id.is_some() {
            return Err(LedgerError::validation(
                "reference_type and reference_id must be provided together",
            ));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            check_line_sides(idx, line.debit_amount, line.credit_amount)?;
        }
        ensure_balanced(self.lines.iter().map(|l| (l.debit_amount, l.credit_amount)))?;
        Ok(())
    }

    /// Every referenced account must exist, be active and share one currency.
    pub fn validate_accounts<'a, F>(&self, lookup: F) -> LedgerResult<()>
    where
        F: Fn(AccountId) -> Option<&'a Account>,
    {
        let mut currency = None;
        for line in &self.lines {
            let account = lookup(line.account_id).ok_or_else(|| {
                LedgerError::validation(format!("account {} does not exist", line.account_id))
            })?;
            if !account.is_active() {
                return Err(LedgerError::validation(format!(
                    "account {} is inactive",
                    account.code
                )));
            }
            match &currency {
                None => currency = Some(account.currency.clone()),
                Some(c) if *c != account.currency => {
                    return Err(LedgerError::validation(format!(
                        "entry mixes currencies {} and {}",
                        c, account.currency
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Distinct accounts referenced by the lines, ascending (lock order).
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.lines
            .iter()
            .map(|l| l.account_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A journal entry and (when loaded) its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub entry_number: String,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub posted_by: Option<UserId>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<UserId>,
    pub void_reason: Option<String>,
    /// Set on the original when a reversal is created.
    pub reversal_entry_id: Option<EntryId>,
    /// Set on a reversal; points at the entry it cancels.
    pub reverses_entry_id: Option<EntryId>,
    pub metadata: Metadata,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Empty in list views.
    pub lines: Vec<LedgerLine>,
}

impl JournalEntry {
    /// Materialize a validated request as a draft.
    pub fn draft(id: EntryId, entry_number: String, new: NewJournalEntry, now: DateTime<Utc>) -> Self {
        let lines = new
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, l)| LedgerLine {
                id: LineId::new(),
                entry_id: id,
                line_number: idx as u32 + 1,
                account_id: l.account_id,
                debit_amount: l.debit_amount,
                credit_amount: l.credit_amount,
                description: l.description,
                metadata: l.metadata,
            })
            .collect();

        Self {
            id,
            entry_number,
            entry_type: new.entry_type,
            status: EntryStatus::Draft,
            description: new.description,
            reference_type: new.reference_type,
            reference_id: new.reference_id,
            posted_at: None,
            posted_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            reversal_entry_id: None,
            reverses_entry_id: None,
            metadata: new.metadata,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            lines,
        }
    }

    pub fn total_debits(&self) -> i128 {
        self.lines.iter().map(|l| l.debit_amount as i128).sum()
    }

    pub fn is_reversal(&self) -> bool {
        self.entry_type == EntryType::Reversing || self.reverses_entry_id.is_some()
    }

    /// Draft → Posted. Re-checks the balance invariant before committing.
    pub fn post(&mut self, posted_by: Option<UserId>, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != EntryStatus::Draft {
            return Err(LedgerError::bad_request("journal entry not found or already posted"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            check_line_sides(idx, line.debit_amount, line.credit_amount)?;
        }
        ensure_balanced(self.lines.iter().map(|l| (l.debit_amount, l.credit_amount)))?;

        self.status = EntryStatus::Posted;
        self.posted_at = Some(now);
        self.posted_by = posted_by;
        self.updated_at = now;
        Ok(())
    }

    /// Precondition shared by `Reverse` and `Void`.
    pub fn ensure_reversible(&self, operation: &str) -> LedgerResult<()> {
        if self.status != EntryStatus::Posted {
            return Err(LedgerError::bad_request(format!(
                "cannot {operation} journal entry {}: status is {}, must be posted",
                self.entry_number,
                self.status.as_str()
            )));
        }
        if self.is_reversal() {
            return Err(LedgerError::bad_request(format!(
                "cannot {operation} journal entry {}: it is itself a reversal",
                self.entry_number
            )));
        }
        Ok(())
    }

    /// Build the reversing draft: every line copied with debit/credit swapped.
    pub fn reversal_draft(&self, actor: Option<UserId>, reason: &str) -> LedgerResult<NewJournalEntry> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::validation("a reason is required"));
        }
        if self.lines.is_empty() {
            return Err(LedgerError::internal(
                "reversal_draft",
                format!("journal entry {} loaded without lines", self.entry_number),
            ));
        }

        let lines = self
            .lines
            .iter()
            .map(|l| NewLedgerLine {
                account_id: l.account_id,
                debit_amount: l.credit_amount,
                credit_amount: l.debit_amount,
                description: l.description.clone(),
                metadata: l.metadata.clone(),
            })
            .collect();

        let mut metadata = Metadata::new();
        metadata.insert("reverses_entry_number", self.entry_number.clone());
        metadata.insert("reason", reason.to_string());

        Ok(NewJournalEntry {
            entry_type: EntryType::Reversing,
            description: format!("Reversal of {}: {}", self.entry_number, reason),
            reference_type: Some("journal_entry".to_string()),
            reference_id: Some(self.id.to_string()),
            lines,
            metadata,
            created_by: actor,
        })
    }

    /// Posted → Reversed, linking the new reversal entry.
    pub fn mark_reversed(&mut self, reversal_entry_id: EntryId, now: DateTime<Utc>) -> LedgerResult<()> {
        self.ensure_reversible("reverse")?;
        self.status = EntryStatus::Reversed;
        self.reversal_entry_id = Some(reversal_entry_id);
        self.updated_at = now;
        Ok(())
    }

    /// Posted → Voided. The balance correction is the linked reversal entry.
    pub fn mark_voided(
        &mut self,
        reversal_entry_id: EntryId,
        voided_by: Option<UserId>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.ensure_reversible("void")?;
        self.status = EntryStatus::Voided;
        self.voided_at = Some(now);
        self.voided_by = voided_by;
        self.void_reason = Some(reason.trim().to_string());
        self.reversal_entry_id = Some(reversal_entry_id);
        self.updated_at = now;
        Ok(())
    }
}

/// List filter for journal entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
    pub entry_type: Option<EntryType>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.status.is_none_or(|s| entry.status == s)
            && self.entry_type.is_none_or(|t| entry.entry_type == t)
            && self
                .reference_type
                .as_deref()
                .is_none_or(|r| entry.reference_type.as_deref() == Some(r))
            && self
                .reference_id
                .as_deref()
                .is_none_or(|r| entry.reference_id.as_deref() == Some(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoledger_core::Currency;
    use proptest::prelude::*;

    use crate::account::{AccountType, NewAccount};

    fn test_account(code: &str, kind: AccountType) -> Account {
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

    fn simple_entry(cash: AccountId, revenue: AccountId, debit: i64, credit: i64) -> NewJournalEntry {
        NewJournalEntry::new(
            EntryType::Standard,
            "Test entry",
            vec![NewLedgerLine::debit(cash, debit), NewLedgerLine::credit(revenue, credit)],
        )
    }

    fn posted_entry() -> JournalEntry {
        let cash = test_account("1000", AccountType::Asset);
        let revenue = test_account("4000", AccountType::Revenue);
        let new = simple_entry(cash.id, revenue.id, 10_000, 10_000);
        let mut entry = JournalEntry::draft(EntryId::new(), "JE-2026-00001".to_string(), new, Utc::now());
        entry.post(None, Utc::now()).unwrap();
        entry
    }

    #[test]
    fn balanced_entry_validates_and_drafts() {
        let new = simple_entry(AccountId::new(), AccountId::new(), 10_000, 10_000);
        new.validate().unwrap();
        let entry = JournalEntry::draft(EntryId::new(), "JE-2026-00001".to_string(), new, Utc::now());
        assert_eq!(entry.status, EntryStatus::Draft);
        assert_eq!(entry.lines.iter().map(|l| l.line_number).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn unbalanced_entry_reports_both_totals() {
        let new = simple_entry(AccountId::new(), AccountId::new(), 10_000, 5_000);
        let err = new.validate().unwrap_err();
        assert_eq!(
            err,
            LedgerError::Validation("entry not balanced: debits=10000, credits=5000".to_string())
        );
    }

    #[test]
    fn single_line_entry_is_rejected() {
        let new = NewJournalEntry::new(
            EntryType::Standard,
            "one line",
            vec![NewLedgerLine::debit(AccountId::new(), 100)],
        );
        assert!(matches!(new.validate(), Err(LedgerError::Validation(msg)) if msg.contains("at least 2 lines")));
    }

    #[test]
    fn line_with_both_sides_is_rejected() {
        let mut new = simple_entry(AccountId::new(), AccountId::new(), 100, 100);
        new.lines[0].credit_amount = 100;
        new.lines.push(NewLedgerLine::credit(AccountId::new(), 100));
        assert!(matches!(new.validate(), Err(LedgerError::Validation(msg)) if msg.contains("both")));
    }

    #[test]
    fn line_with_neither_side_is_rejected() {
        let mut new = simple_entry(AccountId::new(), AccountId::new(), 100, 100);
        new.lines.push(NewLedgerLine::debit(AccountId::new(), 0));
        assert!(matches!(new.validate(), Err(LedgerError::Validation(msg)) if msg.starts_with("line 3")));
    }

    #[test]
    fn reversing_type_is_reserved() {
        let mut new = simple_entry(AccountId::new(), AccountId::new(), 100, 100);
        new.entry_type = EntryType::Reversing;
        assert!(new.validate().is_err());
        assert!(new.validate_structure().is_ok());
    }

    #[test]
    fn inactive_account_is_rejected() {
        let cash = test_account("1000", AccountType::Asset);
        let mut revenue = test_account("4000", AccountType::Revenue);
        revenue.status = crate::account::AccountStatus::Inactive;
        let new = simple_entry(cash.id, revenue.id, 100, 100);
        let accounts = [cash, revenue];
        let err = new
            .validate_accounts(|id| accounts.iter().find(|a| a.id == id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(msg) if msg.contains("inactive")));
    }

    #[test]
    fn missing_account_is_rejected() {
        let cash = test_account("1000", AccountType::Asset);
        let new = simple_entry(cash.id, AccountId::new(), 100, 100);
        let accounts = [cash];
        let err = new
            .validate_accounts(|id| accounts.iter().find(|a| a.id == id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(msg) if msg.contains("does not exist")));
    }

    #[test]
    fn posting_twice_is_a_bad_request() {
        let mut entry = posted_entry();
        let err = entry.post(None, Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::BadRequest("journal entry not found or already posted".to_string()));
    }

    #[test]
    fn reversal_draft_swaps_sides() {
        let entry = posted_entry();
        let reversal = entry.reversal_draft(None, "duplicate charge").unwrap();
        assert_eq!(reversal.entry_type, EntryType::Reversing);
        assert_eq!(reversal.lines[0].account_id, entry.lines[0].account_id);
        assert_eq!(reversal.lines[0].credit_amount, 10_000);
        assert_eq!(reversal.lines[0].debit_amount, 0);
        assert_eq!(reversal.lines[1].debit_amount, 10_000);
        reversal.validate_structure().unwrap();
    }

    #[test]
    fn reversal_cannot_be_reversed() {
        let entry = posted_entry();
        let draft = entry.reversal_draft(None, "oops").unwrap();
        let mut reversal = JournalEntry::draft(EntryId::new(), "JE-2026-00002".to_string(), draft, Utc::now());
        reversal.reverses_entry_id = Some(entry.id);
        reversal.post(None, Utc::now()).unwrap();
        let err = reversal.ensure_reversible("reverse").unwrap_err();
        assert!(matches!(err, LedgerError::BadRequest(msg) if msg.contains("itself a reversal")));
    }

    #[test]
    fn draft_cannot_be_voided() {
        let new = simple_entry(AccountId::new(), AccountId::new(), 100, 100);
        let mut entry = JournalEntry::draft(EntryId::new(), "JE-2026-00003".to_string(), new, Utc::now());
        let err = entry.mark_voided(EntryId::new(), None, "typo", Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::BadRequest(msg) if msg.contains("status is draft")));
    }

    #[test]
    fn reversed_entry_cannot_be_voided() {
        let mut entry = posted_entry();
        entry.mark_reversed(EntryId::new(), Utc::now()).unwrap();
        assert!(entry.mark_voided(EntryId::new(), None, "again", Utc::now()).is_err());
    }

    #[test]
    fn blank_reason_is_rejected() {
        let entry = posted_entry();
        assert!(matches!(entry.reversal_draft(None, "   "), Err(LedgerError::Validation(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: any entry that passes validation has equal debit and credit sums,
        /// and its reversal cancels it per account.
        #[test]
        fn validated_entries_balance_and_reversals_cancel(
            amounts in prop::collection::vec(1i64..1_000_000_000i64, 1..8)
        ) {
            let accounts: Vec<AccountId> = (0..amounts.len() + 1).map(|_| AccountId::new()).collect();
            let total: i64 = amounts.iter().sum();
            let mut lines: Vec<NewLedgerLine> = amounts
                .iter()
                .zip(accounts.iter())
                .map(|(amount, account)| NewLedgerLine::debit(*account, *amount))
                .collect();
            lines.push(NewLedgerLine::credit(accounts[amounts.len()], total));

            let new = NewJournalEntry::new(EntryType::Standard, "prop", lines);
            prop_assert!(new.validate().is_ok());

            let mut entry = JournalEntry::draft(EntryId::new(), "JE-2026-00001".to_string(), new, Utc::now());
            entry.post(None, Utc::now()).unwrap();
            let reversal = entry.reversal_draft(None, "prop").unwrap();

            let mut net = std::collections::HashMap::<AccountId, i128>::new();
            for l in &entry.lines {
                *net.entry(l.account_id).or_default() += l.debit_amount as i128 - l.credit_amount as i128;
            }
            for l in &reversal.lines {
                *net.entry(l.account_id).or_default() += l.debit_amount as i128 - l.credit_amount as i128;
            }
            prop_assert!(net.values().all(|v| *v == 0));
        }

        /// Property: an entry whose sides differ is always rejected with the exact totals.
        #[test]
        fn unbalanced_entries_are_rejected(debit in 1i64..1_000_000i64, credit in 1i64..1_000_000i64) {
            prop_assume!(debit != credit);
            let new = NewJournalEntry::new(
                EntryType::Standard,
                "prop",
                vec![NewLedgerLine::debit(AccountId::new(), debit), NewLedgerLine::credit(AccountId::new(), credit)],
            );
            let expected = format!("entry not balanced: debits={debit}, credits={credit}");
            prop_assert_eq!(new.validate(), Err(LedgerError::Validation(expected)));
        }
    }
}
