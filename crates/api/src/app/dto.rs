//! Request DTOs and their mapping onto domain inputs.
//!
//! Responses serialize the domain types directly.

use serde::Deserialize;
use serde_json::Value;

use neoledger_core::{AccountId, Currency, LedgerResult, Metadata, Page, TransactionId, UserId, WalletId};
use neoledger_ledger::{
    AccountFilter, AccountUpdate, EntryFilter, EntryType, NewAccount, NewJournalEntry, NewLedgerLine,
};
use neoledger_wallet::{Deposit, LimitsUpdate, Transfer, WalletType, Withdrawal};

fn metadata(value: Option<Value>) -> LedgerResult<Metadata> {
    value.map(Metadata::from_json).transpose().map(Option::unwrap_or_default)
}

fn parse_opt<T: core::str::FromStr>(raw: Option<&str>) -> Result<Option<T>, T::Err> {
    raw.map(str::parse).transpose()
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub currency: Option<String>,
    pub parent_id: Option<AccountId>,
    pub metadata: Option<Value>,
}

impl CreateAccountRequest {
    pub fn into_new_account(self, default_currency: &Currency) -> LedgerResult<NewAccount> {
        let currency = match self.currency.as_deref() {
            Some(code) => Currency::parse(code)?,
            None => default_currency.clone(),
        };
        Ok(NewAccount {
            code: self.code,
            name: self.name,
            account_type: self.account_type.parse()?,
            currency,
            parent_id: self.parent_id,
            metadata: metadata(self.metadata)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub status: Option<String>,
}

impl UpdateAccountRequest {
    pub fn into_update(self) -> LedgerResult<AccountUpdate> {
        Ok(AccountUpdate {
            name: self.name,
            status: parse_opt(self.status.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccountsQuery {
    pub account_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListAccountsQuery {
    pub fn into_parts(self) -> LedgerResult<(AccountFilter, Page)> {
        let filter = AccountFilter {
            account_type: parse_opt(self.account_type.as_deref())?,
            status: parse_opt(self.status.as_deref())?,
        };
        Ok((filter, Page::new(self.limit, self.offset)))
    }
}

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub account_id: AccountId,
    #[serde(default)]
    pub debit_amount: i64,
    #[serde(default)]
    pub credit_amount: i64,
    pub description: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub entry_type: Option<String>,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub lines: Vec<LineRequest>,
    pub metadata: Option<Value>,
}

impl CreateEntryRequest {
    pub fn into_new_entry(self, created_by: UserId) -> LedgerResult<NewJournalEntry> {
        let entry_type = parse_opt::<EntryType>(self.entry_type.as_deref())?.unwrap_or(EntryType::Standard);
        let lines = self
            .lines
            .into_iter()
            .map(|line| {
                Ok(NewLedgerLine {
                    account_id: line.account_id,
                    debit_amount: line.debit_amount,
                    credit_amount: line.credit_amount,
                    description: line.description,
                    metadata: metadata(line.metadata)?,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let mut new = NewJournalEntry::new(entry_type, self.description, lines).created_by(Some(created_by));
        new.reference_type = self.reference_type;
        new.reference_id = self.reference_id;
        new.metadata = metadata(self.metadata)?;
        Ok(new)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    pub status: Option<String>,
    pub entry_type: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListEntriesQuery {
    pub fn into_parts(self) -> LedgerResult<(EntryFilter, Page)> {
        let filter = EntryFilter {
            status: parse_opt(self.status.as_deref())?,
            entry_type: parse_opt(self.entry_type.as_deref())?,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
        };
        Ok((filter, Page::new(self.limit, self.offset)))
    }
}

/// Body for void, reverse, freeze and close.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListWalletsQuery {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLimitsRequest {
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
}

impl From<UpdateLimitsRequest> for LimitsUpdate {
    fn from(body: UpdateLimitsRequest) -> Self {
        LimitsUpdate {
            daily_limit: body.daily_limit,
            monthly_limit: body.monthly_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenWalletRequest {
    pub user_id: UserId,
    pub wallet_type: Option<String>,
    pub currency: Option<String>,
    /// Link an existing liability account instead of provisioning one.
    pub ledger_account_id: Option<AccountId>,
}

impl OpenWalletRequest {
    pub fn wallet_type(&self) -> LedgerResult<WalletType> {
        Ok(parse_opt(self.wallet_type.as_deref())?.unwrap_or(WalletType::Primary))
    }

    pub fn currency(&self, default_currency: &Currency) -> LedgerResult<Currency> {
        match self.currency.as_deref() {
            Some(code) => Currency::parse(code),
            None => Ok(default_currency.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_wallet_id: WalletId,
    pub destination_wallet_id: WalletId,
    pub amount: i64,
    pub transaction_id: TransactionId,
    pub description: Option<String>,
}

impl From<TransferRequest> for Transfer {
    fn from(body: TransferRequest) -> Self {
        Transfer {
            source_wallet_id: body.source_wallet_id,
            destination_wallet_id: body.destination_wallet_id,
            amount: body.amount,
            transaction_id: body.transaction_id,
            description: body.description,
        }
    }
}

/// Body for deposit and withdraw.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub wallet_id: WalletId,
    pub amount: i64,
    pub transaction_id: TransactionId,
    pub description: Option<String>,
}

impl From<MovementRequest> for Deposit {
    fn from(body: MovementRequest) -> Self {
        Deposit {
            wallet_id: body.wallet_id,
            amount: body.amount,
            transaction_id: body.transaction_id,
            description: body.description,
        }
    }
}

impl From<MovementRequest> for Withdrawal {
    fn from(body: MovementRequest) -> Self {
        Withdrawal {
            wallet_id: body.wallet_id,
            amount: body.amount,
            transaction_id: body.transaction_id,
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_request_defaults_to_standard_type() {
        let body: CreateEntryRequest = serde_json::from_value(json!({
            "description": "sale",
            "lines": [
                { "account_id": AccountId::new(), "debit_amount": 100 },
                { "account_id": AccountId::new(), "credit_amount": 100 }
            ]
        }))
        .unwrap();
        let new = body.into_new_entry(UserId::new()).unwrap();
        assert_eq!(new.entry_type, EntryType::Standard);
        assert_eq!(new.lines[1].credit_amount, 100);
        assert_eq!(new.lines[1].debit_amount, 0);
    }

    #[test]
    fn unknown_account_type_is_a_validation_error() {
        let body = CreateAccountRequest {
            code: "1000".into(),
            name: "Cash".into(),
            account_type: "income".into(),
            currency: None,
            parent_id: None,
            metadata: None,
        };
        assert!(body.into_new_account(&Currency::parse("INR").unwrap()).is_err());
    }

    #[test]
    fn nested_metadata_is_rejected() {
        let body = CreateAccountRequest {
            code: "1000".into(),
            name: "Cash".into(),
            account_type: "asset".into(),
            currency: None,
            parent_id: None,
            metadata: Some(json!({ "tags": ["a"] })),
        };
        assert!(body.into_new_account(&Currency::parse("INR").unwrap()).is_err());
    }
}
