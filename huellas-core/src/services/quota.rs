// huellas-core/src/services/quota.rs
//! Free-tier usage caps over calendar periods.
//!
//! - One counter per feature, persisted in the local KV store under
//!   `<feature>_used` and `<feature>_period`.
//! - Every read or write first compares the stored period id with the one
//!   derived from today's date; on mismatch the counter restarts at 0.
//!   A tracker idle for N periods resets once, with no back-fill.
//! - `register_usage` never refuses and never clamps. Callers check first.
//! - Trusts the device clock and performs no locking: it is meant to be
//!   driven from the UI task only (concurrent registrations may lose updates).

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::QuotaError;
use crate::services::kv::KvStore;
use crate::utils::Logbook;

pub const CANDLES: &str = "candles";
pub const AI_MESSAGES: &str = "ai_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Daily,
    Monthly,
}

impl PeriodKind {
    /// `"YYYY-MM-DD"` for daily windows, `"YYYY-MM"` for monthly ones.
    pub fn identifier(&self, date: NaiveDate) -> String {
        match self {
            PeriodKind::Daily => date.format("%Y-%m-%d").to_string(),
            PeriodKind::Monthly => date.format("%Y-%m").to_string(),
        }
    }
}

/// Static configuration of one gated feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub feature_id: String,
    pub limit: u32,
    pub period_kind: PeriodKind,
}

impl QuotaPolicy {
    /// A limit of 0 is raised to 1: every gated feature allows at least one use.
    pub fn new(feature_id: &str, limit: u32, period_kind: PeriodKind) -> Self {
        if limit == 0 {
            tracing::warn!(feature = feature_id, "quota limit 0 raised to 1");
        }
        Self {
            feature_id: feature_id.to_string(),
            limit: limit.max(1),
            period_kind,
        }
    }
}

/// Snapshot of a feature's counter after any due rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaWindow {
    pub feature_id: String,
    pub limit: u32,
    pub period_kind: PeriodKind,
    pub used_count: u32,
    pub period_identifier: String,
}

impl QuotaWindow {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used_count)
    }
}

/// Outcome of asking to perform a gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Premium: allowed, nothing counted.
    Unlimited,
    /// Free tier: allowed and counted; `remaining` is what is left afterwards.
    Granted { remaining: u32 },
    Denied { limit: u32 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Denied { .. })
    }
}

pub trait Clock: Send + Sync {
    /// Today's calendar date in the device's timezone.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and the admin CLI's `--date` override.
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today: Mutex::new(today) }
    }

    pub fn set(&self, date: NaiveDate) {
        if let Ok(mut d) = self.today.lock() {
            *d = date;
        }
    }

    pub fn advance_days(&self, days: u64) {
        if let Ok(mut d) = self.today.lock() {
            if let Some(next) = d.checked_add_days(chrono::Days::new(days)) {
                *d = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        match self.today.lock() {
            Ok(d) => *d,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub struct QuotaTracker {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    policies: HashMap<String, QuotaPolicy>,
    logbook: Option<Logbook>,
}

impl QuotaTracker {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            policies: HashMap::new(),
            logbook: None,
        }
    }

    /// Candles per day and AI messages per month, the two gates the app ships with.
    pub fn with_defaults(
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        candles_per_day: u32,
        ai_messages_per_month: u32,
    ) -> Self {
        Self::new(kv, clock)
            .with_policy(QuotaPolicy::new(CANDLES, candles_per_day, PeriodKind::Daily))
            .with_policy(QuotaPolicy::new(AI_MESSAGES, ai_messages_per_month, PeriodKind::Monthly))
    }

    pub fn with_policy(mut self, policy: QuotaPolicy) -> Self {
        self.policies.insert(policy.feature_id.clone(), policy);
        self
    }

    pub fn with_logbook(mut self, logbook: Logbook) -> Self {
        self.logbook = Some(logbook);
        self
    }

    pub fn features(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    /// The configured cap. Pure; does not touch storage.
    pub fn limit(&self, feature: &str) -> Result<u32, QuotaError> {
        Ok(self.policy(feature)?.limit)
    }

    /// `max(0, limit - used)` for the current period.
    pub fn remaining(&self, feature: &str) -> Result<u32, QuotaError> {
        Ok(self.window(feature)?.remaining())
    }

    pub fn can_use(&self, feature: &str) -> Result<bool, QuotaError> {
        Ok(self.remaining(feature)? > 0)
    }

    /// Count one use. Never fails on the cap and may push `used` past `limit`.
    pub fn register_usage(&self, feature: &str) -> Result<(), QuotaError> {
        let window = self.window(feature)?;
        let used = window.used_count.saturating_add(1);
        self.kv.set_int(&used_key(feature), i64::from(used))?;
        tracing::debug!(feature, used, limit = window.limit, period = %window.period_identifier, "quota usage registered");
        if let Some(book) = &self.logbook {
            book.record(
                "quota_used",
                json!({
                    "feature": feature,
                    "used": used,
                    "limit": window.limit,
                    "period": window.period_identifier,
                }),
            );
        }
        Ok(())
    }

    /// Check and count in one step, honoring the premium entitlement.
    pub fn admit(&self, feature: &str, is_premium: bool) -> Result<Admission, QuotaError> {
        if is_premium {
            // Still validate the feature name so typos surface for premium users too.
            self.policy(feature)?;
            return Ok(Admission::Unlimited);
        }
        let window = self.window(feature)?;
        if window.remaining() == 0 {
            tracing::debug!(feature, limit = window.limit, "quota exhausted");
            return Ok(Admission::Denied { limit: window.limit });
        }
        self.register_usage(feature)?;
        Ok(Admission::Granted {
            remaining: window.remaining() - 1,
        })
    }

    /// Current counter state, applying the rollover reset first if one is due.
    pub fn window(&self, feature: &str) -> Result<QuotaWindow, QuotaError> {
        let policy = self.policy(feature)?;
        let current = policy.period_kind.identifier(self.clock.today());
        let stored = self.kv.get_string(&period_key(feature))?;

        let used_count = if stored.as_deref() != Some(current.as_str()) {
            self.kv.set_string(&period_key(feature), &current)?;
            self.kv.set_int(&used_key(feature), 0)?;
            if stored.is_some() {
                tracing::debug!(feature, from = ?stored, to = %current, "quota period rolled over");
            }
            0
        } else {
            let raw = self.kv.get_int(&used_key(feature))?.unwrap_or(0);
            u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
        };

        Ok(QuotaWindow {
            feature_id: policy.feature_id.clone(),
            limit: policy.limit,
            period_kind: policy.period_kind,
            used_count,
            period_identifier: current,
        })
    }

    fn policy(&self, feature: &str) -> Result<&QuotaPolicy, QuotaError> {
        self.policies
            .get(feature)
            .ok_or_else(|| QuotaError::UnknownFeature(feature.to_string()))
    }
}

fn used_key(feature: &str) -> String {
    format!("{feature}_used")
}

fn period_key(feature: &str) -> String {
    format!("{feature}_period")
}
