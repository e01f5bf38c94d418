//! Rolling daily/monthly spending caps.
//!
//! Windows reset lazily: any read or reservation at or after `*_reset_at`
//! zeroes the counter and moves the boundary forward (daily: next UTC
//! midnight; monthly: first instant of the next UTC month).

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use neoledger_core::{LedgerError, LedgerResult, WalletId, money};

/// Next UTC midnight strictly after `now`.
pub fn next_daily_reset(now: DateTime<Utc>) -> LedgerResult<DateTime<Utc>> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| LedgerError::internal("next_daily_reset", format!("date overflow after {now}")))
}

/// First instant of the UTC month following `now`.
pub fn next_monthly_reset(now: DateTime<Utc>) -> LedgerResult<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| LedgerError::internal("next_monthly_reset", format!("date overflow after {now}")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletLimits {
    pub wallet_id: WalletId,
    pub daily_limit: i64,
    pub daily_spent: i64,
    pub daily_reset_at: DateTime<Utc>,
    pub monthly_limit: i64,
    pub monthly_spent: i64,
    pub monthly_reset_at: DateTime<Utc>,
}

impl WalletLimits {
    pub fn new(wallet_id: WalletId, daily_limit: i64, monthly_limit: i64, now: DateTime<Utc>) -> LedgerResult<Self> {
        validate_limits(daily_limit, monthly_limit)?;
        Ok(Self {
            wallet_id,
            daily_limit,
            daily_spent: 0,
            daily_reset_at: next_daily_reset(now)?,
            monthly_limit,
            monthly_spent: 0,
            monthly_reset_at: next_monthly_reset(now)?,
        })
    }

    /// Reset elapsed windows. Returns whether anything changed (and so needs
    /// persisting).
    pub fn refresh(&mut self, now: DateTime<Utc>) -> LedgerResult<bool> {
        let mut changed = false;
        if now >= self.daily_reset_at {
            self.daily_spent = 0;
            self.daily_reset_at = next_daily_reset(now)?;
            changed = true;
        }
        if now >= self.monthly_reset_at {
            self.monthly_spent = 0;
            self.monthly_reset_at = next_monthly_reset(now)?;
            changed = true;
        }
        Ok(changed)
    }

    pub fn daily_remaining(&self) -> i64 {
        (self.daily_limit - self.daily_spent).max(0)
    }

    pub fn monthly_remaining(&self) -> i64 {
        (self.monthly_limit - self.monthly_spent).max(0)
    }

    /// Verify both caps and count `amount` against them.
    ///
    /// On error the counters are unchanged (window resets may still apply).
    pub fn check_and_reserve(&mut self, amount: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        money::ensure_positive(amount, "amount")?;
        self.refresh(now)?;

        let daily = money::checked_add(self.daily_spent, amount, "daily spent")?;
        if daily > self.daily_limit {
            return Err(LedgerError::bad_request(format!(
                "daily limit exceeded: limit {}, spent {}, requested {}, remaining {}",
                self.daily_limit,
                self.daily_spent,
                amount,
                self.daily_remaining()
            )));
        }
        let monthly = money::checked_add(self.monthly_spent, amount, "monthly spent")?;
        if monthly > self.monthly_limit {
            return Err(LedgerError::bad_request(format!(
                "monthly limit exceeded: limit {}, spent {}, requested {}, remaining {}",
                self.monthly_limit,
                self.monthly_spent,
                amount,
                self.monthly_remaining()
            )));
        }

        self.daily_spent = daily;
        self.monthly_spent = monthly;
        Ok(())
    }

    pub fn apply_update(&mut self, update: &LimitsUpdate) -> LedgerResult<()> {
        if update.daily_limit.is_none() && update.monthly_limit.is_none() {
            return Err(LedgerError::validation(
                "nothing to update: provide daily_limit and/or monthly_limit",
            ));
        }
        let daily = update.daily_limit.unwrap_or(self.daily_limit);
        let monthly = update.monthly_limit.unwrap_or(self.monthly_limit);
        validate_limits(daily, monthly)?;
        self.daily_limit = daily;
        self.monthly_limit = monthly;
        Ok(())
    }
}

fn validate_limits(daily: i64, monthly: i64) -> LedgerResult<()> {
    money::ensure_positive(daily, "daily_limit")?;
    money::ensure_positive(monthly, "monthly_limit")?;
    if daily > monthly {
        return Err(LedgerError::validation(format!(
            "daily_limit {daily} exceeds monthly_limit {monthly}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitsUpdate {
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn reset_boundaries() {
        assert_eq!(next_daily_reset(at(2026, 3, 14, 15)).unwrap(), at(2026, 3, 15, 0));
        assert_eq!(next_daily_reset(at(2026, 12, 31, 23)).unwrap(), at(2027, 1, 1, 0));
        assert_eq!(next_monthly_reset(at(2026, 1, 31, 10)).unwrap(), at(2026, 2, 1, 0));
        assert_eq!(next_monthly_reset(at(2026, 12, 5, 0)).unwrap(), at(2027, 1, 1, 0));
    }

    #[test]
    fn daily_limit_reports_remaining_headroom() {
        let now = at(2026, 3, 14, 12);
        let mut limits = WalletLimits::new(WalletId::new(), 1_000_000, 10_000_000, now).unwrap();
        limits.daily_spent = 900_000;
        limits.monthly_spent = 900_000;

        let err = limits.check_and_reserve(200_000, now).unwrap_err();
        assert!(matches!(&err, LedgerError::BadRequest(msg) if msg.contains("remaining 100000")));
        assert_eq!(limits.daily_spent, 900_000);
        assert_eq!(limits.monthly_spent, 900_000);
    }

    #[test]
    fn elapsed_day_resets_before_checking() {
        let now = at(2026, 3, 14, 12);
        let mut limits = WalletLimits::new(WalletId::new(), 1_000_000, 10_000_000, now).unwrap();
        limits.check_and_reserve(900_000, now).unwrap();

        let tomorrow = at(2026, 3, 15, 0);
        limits.check_and_reserve(200_000, tomorrow).unwrap();
        assert_eq!(limits.daily_spent, 200_000);
        assert_eq!(limits.monthly_spent, 1_100_000);
        assert_eq!(limits.daily_reset_at, at(2026, 3, 16, 0));
    }

    #[test]
    fn monthly_cap_applies_across_days() {
        let now = at(2026, 3, 1, 9);
        let mut limits = WalletLimits::new(WalletId::new(), 600, 1_000, now).unwrap();
        limits.check_and_reserve(600, now).unwrap();
        let err = limits.check_and_reserve(500, at(2026, 3, 2, 9)).unwrap_err();
        assert!(matches!(err, LedgerError::BadRequest(msg) if msg.starts_with("monthly limit exceeded") && msg.contains("remaining 400")));
    }

    #[test]
    fn update_requires_a_field_and_ordering() {
        let now = at(2026, 3, 1, 9);
        let mut limits = WalletLimits::new(WalletId::new(), 600, 1_000, now).unwrap();
        assert!(matches!(limits.apply_update(&LimitsUpdate::default()), Err(LedgerError::Validation(_))));
        assert!(limits
            .apply_update(&LimitsUpdate { daily_limit: Some(2_000), monthly_limit: None })
            .is_err());
        limits
            .apply_update(&LimitsUpdate { daily_limit: Some(2_000), monthly_limit: Some(5_000) })
            .unwrap();
        assert_eq!((limits.daily_limit, limits.monthly_limit), (2_000, 5_000));
    }

    proptest! {
        /// Property: whatever sequence of reservations is attempted within one
        /// day, the counters never exceed their caps.
        #[test]
        fn counters_never_exceed_caps(amounts in prop::collection::vec(1i64..500_000i64, 1..40)) {
            let now = at(2026, 6, 10, 8);
            let mut limits = WalletLimits::new(WalletId::new(), 1_000_000, 3_000_000, now).unwrap();
            let mut accepted = 0i64;
            for amount in amounts {
                if limits.check_and_reserve(amount, now).is_ok() {
                    accepted += amount;
                }
                prop_assert!(limits.daily_spent <= limits.daily_limit);
                prop_assert!(limits.monthly_spent <= limits.monthly_limit);
            }
            prop_assert_eq!(limits.daily_spent, accepted);
        }
    }
}
