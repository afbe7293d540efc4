//! Daily quota ledger for provider accounts.
//!
//! Every (provider, account) pair gets one record guarded by its own mutex, registered when
//! the ledger is built. Records roll over lazily: any access compares the stored date with
//! the clock's current UTC date and zeroes the daily counters when they are stale.
//!
//! Callers never increment `consumed` directly. They reserve a [`QuotaPermit`] first, which
//! counts as in flight against the allowance, and then either commit it (success), fail it
//! (the call errored, which also starts a cool-down) or drop it (the call was abandoned).
//! Because the reservation check and the in-flight increment happen under the same lock,
//! concurrent generations cannot push `consumed` past `daily_quota`.

use crate::roundtable::clock::Clock;
use crate::roundtable::config::ProviderAccount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Identifies one credentialed account of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AccountKey {
    pub provider: String,
    pub account: String,
}

impl AccountKey {
    pub fn new(provider: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            account: account.into(),
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.account)
    }
}

/// Usage counters of one account for one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaRecord {
    pub date: NaiveDate,
    pub daily_quota: u32,
    /// Successful calls today.
    pub consumed: u32,
    /// Failed calls today.
    pub failed: u32,
    /// Reserved slots whose call has not finished yet.
    pub in_flight: u32,
    pub last_failure: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    pub fn remaining(&self) -> u32 {
        self.daily_quota
            .saturating_sub(self.consumed)
            .saturating_sub(self.in_flight)
    }
}

/// Why an account can or cannot take a call right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// `consumed + in_flight` has reached the daily quota.
    Exhausted,
    /// A recent failure put the account in cool-down.
    CoolingDown,
    Disabled,
    /// No such account is registered.
    Unknown,
}

impl Availability {
    pub fn is_available(self) -> bool {
        self == Availability::Available
    }
}

struct Slot {
    enabled: bool,
    record: Mutex<QuotaRecord>,
}

/// Process-wide usage tracker shared by every router through an `Arc`.
pub struct QuotaLedger {
    slots: BTreeMap<AccountKey, Slot>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
}

impl QuotaLedger {
    pub fn new(accounts: &[ProviderAccount], clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        let today = clock.today();
        let slots = accounts
            .iter()
            .map(|account| {
                let key = AccountKey::new(account.provider.clone(), account.account.clone());
                let slot = Slot {
                    enabled: account.enabled,
                    record: Mutex::new(QuotaRecord {
                        date: today,
                        daily_quota: account.daily_quota,
                        consumed: 0,
                        failed: 0,
                        in_flight: 0,
                        last_failure: None,
                    }),
                };
                (key, slot)
            })
            .collect();
        Self {
            slots,
            clock,
            cooldown,
        }
    }

    /// Locks a record and rolls it over if the UTC date changed since its last access.
    fn lock_current<'s>(&self, slot: &'s Slot) -> MutexGuard<'s, QuotaRecord> {
        let mut record = slot.record.lock().unwrap_or_else(|p| p.into_inner());
        let today = self.clock.today();
        if record.date != today {
            log::debug!(
                "quota rollover from {} to {} (consumed {}, failed {})",
                record.date,
                today,
                record.consumed,
                record.failed
            );
            record.date = today;
            record.consumed = 0;
            record.failed = 0;
        }
        record
    }

    fn availability_of(&self, enabled: bool, record: &QuotaRecord) -> Availability {
        if !enabled {
            return Availability::Disabled;
        }
        if record.consumed + record.in_flight >= record.daily_quota {
            return Availability::Exhausted;
        }
        if let Some(failed_at) = record.last_failure {
            let cooldown =
                chrono::Duration::from_std(self.cooldown).unwrap_or_else(|_| chrono::Duration::zero());
            if self.clock.now() < failed_at + cooldown {
                return Availability::CoolingDown;
            }
        }
        Availability::Available
    }

    pub fn availability(&self, key: &AccountKey) -> Availability {
        match self.slots.get(key) {
            Some(slot) => {
                let record = self.lock_current(slot);
                self.availability_of(slot.enabled, &record)
            }
            None => Availability::Unknown,
        }
    }

    /// Current (rolled-over) counters of an account.
    pub fn record(&self, key: &AccountKey) -> Option<QuotaRecord> {
        self.slots
            .get(key)
            .map(|slot| self.lock_current(slot).clone())
    }

    /// Reserves one call against the account's daily allowance.
    pub fn try_reserve(&self, key: &AccountKey) -> Result<QuotaPermit<'_>, Availability> {
        let slot = self.slots.get(key).ok_or(Availability::Unknown)?;
        let mut record = self.lock_current(slot);
        match self.availability_of(slot.enabled, &record) {
            Availability::Available => {
                record.in_flight += 1;
                Ok(QuotaPermit {
                    ledger: self,
                    key: key.clone(),
                    settled: false,
                })
            }
            other => Err(other),
        }
    }

    fn settle(&self, key: &AccountKey, outcome: Settlement) {
        let Some(slot) = self.slots.get(key) else {
            return;
        };
        let mut record = self.lock_current(slot);
        record.in_flight = record.in_flight.saturating_sub(1);
        match outcome {
            Settlement::Success => record.consumed += 1,
            Settlement::Failure => {
                record.failed += 1;
                record.last_failure = Some(self.clock.now());
            }
            Settlement::Released => {}
        }
    }

    /// Per-account usage plus totals.
    pub fn usage_summary(&self) -> UsageSummary {
        let mut accounts = Vec::with_capacity(self.slots.len());
        for (key, slot) in &self.slots {
            let record = self.lock_current(slot);
            let attempts = record.consumed + record.failed;
            let success_rate = if attempts > 0 {
                record.consumed as f64 / attempts as f64 * 100.0
            } else {
                0.0
            };
            accounts.push(AccountUsage {
                provider: key.provider.clone(),
                account: key.account.clone(),
                requests_made: attempts,
                requests_failed: record.failed,
                daily_limit: record.daily_quota,
                remaining: record.remaining(),
                success_rate,
                available: self.availability_of(slot.enabled, &record).is_available(),
            });
        }

        let mut provider_status: BTreeMap<String, bool> = BTreeMap::new();
        for usage in &accounts {
            *provider_status.entry(usage.provider.clone()).or_default() |= usage.available;
        }

        UsageSummary {
            total_requests: accounts.iter().map(|a| a.requests_made).sum(),
            total_failed: accounts.iter().map(|a| a.requests_failed).sum(),
            total_remaining: accounts
                .iter()
                .filter(|a| a.available)
                .map(|a| a.remaining)
                .sum(),
            provider_status,
            cost_estimate: CostEstimate::from_usage(&accounts, |_| 0.0),
            accounts,
        }
    }
}

impl fmt::Debug for QuotaLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaLedger")
            .field("accounts", &self.slots.len())
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

enum Settlement {
    Success,
    Failure,
    Released,
}

/// A reserved call slot. Dropping it without settling releases the slot unused.
#[must_use = "a permit holds a quota slot until it is committed, failed or dropped"]
pub struct QuotaPermit<'a> {
    ledger: &'a QuotaLedger,
    key: AccountKey,
    settled: bool,
}

impl QuotaPermit<'_> {
    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    /// The call succeeded: count it against today's allowance.
    pub fn commit(mut self) {
        self.settled = true;
        self.ledger.settle(&self.key, Settlement::Success);
    }

    /// The call failed: free the slot, count the failure and start the cool-down.
    pub fn fail(mut self) {
        self.settled = true;
        self.ledger.settle(&self.key, Settlement::Failure);
    }
}

impl Drop for QuotaPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.settle(&self.key, Settlement::Released);
        }
    }
}

/// Usage of one account as shown in status reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountUsage {
    pub provider: String,
    pub account: String,
    pub requests_made: u32,
    pub requests_failed: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    /// Percentage of today's calls that succeeded.
    pub success_rate: f64,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub accounts: Vec<AccountUsage>,
    pub total_requests: u32,
    pub total_failed: u32,
    /// Remaining calls across currently available accounts.
    pub total_remaining: u32,
    /// Whether each provider has at least one account able to take a call.
    pub provider_status: BTreeMap<String, bool>,
    pub cost_estimate: CostEstimate,
}

/// Spend implied by today's calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Today's cost per provider in USD.
    pub providers: BTreeMap<String, f64>,
    pub total_daily_cost: f64,
    /// `total_daily_cost` over 30 days.
    pub monthly_estimate: f64,
}

impl CostEstimate {
    /// Prices every call in `accounts` with `cost_per_request` of its provider.
    pub fn from_usage(accounts: &[AccountUsage], cost_per_request: impl Fn(&str) -> f64) -> Self {
        let mut providers: BTreeMap<String, f64> = BTreeMap::new();
        for usage in accounts {
            let cost = usage.requests_made as f64 * cost_per_request(&usage.provider);
            *providers.entry(usage.provider.clone()).or_default() += cost;
        }
        let total_daily_cost: f64 = providers.values().sum();
        Self {
            providers,
            total_daily_cost,
            monthly_estimate: total_daily_cost * 30.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roundtable::clock::ManualClock;
    use chrono::TimeZone;

    fn ledger(quota: u32, cooldown: Duration) -> (QuotaLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let accounts = vec![
            ProviderAccount::new("p", "a", quota),
            ProviderAccount::new("p", "off", quota).disabled(),
        ];
        (QuotaLedger::new(&accounts, clock.clone(), cooldown), clock)
    }

    #[test]
    fn committed_calls_exhaust_the_account_until_rollover() {
        let (ledger, clock) = ledger(2, Duration::ZERO);
        let key = AccountKey::new("p", "a");
        ledger.try_reserve(&key).unwrap().commit();
        ledger.try_reserve(&key).unwrap().commit();
        assert_eq!(ledger.availability(&key), Availability::Exhausted);
        assert!(ledger.try_reserve(&key).is_err());

        clock.advance(chrono::Duration::hours(12));
        assert_eq!(ledger.availability(&key), Availability::Available);
        assert_eq!(ledger.record(&key).unwrap().consumed, 0);
    }

    #[test]
    fn in_flight_reservations_count_against_quota() {
        let (ledger, _) = ledger(1, Duration::ZERO);
        let key = AccountKey::new("p", "a");
        let permit = ledger.try_reserve(&key).unwrap();
        assert_eq!(ledger.try_reserve(&key).err(), Some(Availability::Exhausted));
        drop(permit);
        assert_eq!(ledger.record(&key).unwrap().consumed, 0);
        assert!(ledger.try_reserve(&key).is_ok());
    }

    #[test]
    fn failure_starts_cooldown() {
        let (ledger, clock) = ledger(10, Duration::from_secs(60));
        let key = AccountKey::new("p", "a");
        ledger.try_reserve(&key).unwrap().fail();
        assert_eq!(ledger.availability(&key), Availability::CoolingDown);
        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(ledger.availability(&key), Availability::Available);
        assert_eq!(ledger.record(&key).unwrap().failed, 1);
    }

    #[test]
    fn disabled_and_unknown_accounts_are_not_reservable() {
        let (ledger, _) = ledger(10, Duration::ZERO);
        assert_eq!(
            ledger.availability(&AccountKey::new("p", "off")),
            Availability::Disabled
        );
        assert_eq!(
            ledger.try_reserve(&AccountKey::new("x", "y")).err(),
            Some(Availability::Unknown)
        );
    }

    #[test]
    fn usage_summary_reports_rates_and_totals() {
        let (ledger, _) = ledger(10, Duration::ZERO);
        let key = AccountKey::new("p", "a");
        ledger.try_reserve(&key).unwrap().commit();
        ledger.try_reserve(&key).unwrap().commit();
        ledger.try_reserve(&key).unwrap().commit();
        ledger.try_reserve(&key).unwrap().fail();

        let summary = ledger.usage_summary();
        let usage = summary
            .accounts
            .iter()
            .find(|a| a.account == "a")
            .unwrap();
        assert_eq!(usage.requests_made, 4);
        assert_eq!(usage.requests_failed, 1);
        assert_eq!(usage.remaining, 7);
        assert!((usage.success_rate - 75.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_requests, 4);
        assert_eq!(summary.total_remaining, 7);
        assert_eq!(summary.provider_status.get("p"), Some(&true));
        assert_eq!(summary.cost_estimate.total_daily_cost, 0.0);
    }

    #[test]
    fn cost_estimate_prices_calls_per_provider() {
        let usage = |provider: &str, account: &str, made: u32| AccountUsage {
            provider: provider.to_string(),
            account: account.to_string(),
            requests_made: made,
            requests_failed: 0,
            daily_limit: 100,
            remaining: 100 - made,
            success_rate: 100.0,
            available: true,
        };
        let accounts = vec![usage("groq", "a", 10), usage("groq", "b", 30), usage("free", "a", 7)];
        let estimate = CostEstimate::from_usage(&accounts, |provider| match provider {
            "groq" => 0.5,
            _ => 0.0,
        });
        assert_eq!(estimate.providers.get("groq"), Some(&20.0));
        assert_eq!(estimate.providers.get("free"), Some(&0.0));
        assert_eq!(estimate.total_daily_cost, 20.0);
        assert_eq!(estimate.monthly_estimate, 600.0);
    }
}
