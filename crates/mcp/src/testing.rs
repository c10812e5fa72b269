// Test doubles shared by the dispatcher and tool tests

use crate::protocol::ToolSchema;
use crate::tools::{json_schema_object, Tool};
use chrono::NaiveDate;
use fx_core::{
    CurrencyCode, FxError, FxResult, Identity, RateProvider, RateSet, TimeSeries, TokenVerifier,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Provider quoting one fixed rate for every pair.
pub struct FixedRateProvider {
    pub rate: f64,
    pub calls: AtomicUsize,
}

impl FixedRateProvider {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn rate_set(&self, base: CurrencyCode, date: NaiveDate, targets: Option<&[CurrencyCode]>) -> RateSet {
        let targets = targets.map(|t| t.to_vec()).unwrap_or_else(|| {
            fx_core::CurrencyCatalog
                .codes()
                .filter(|c| *c != base)
                .collect()
        });
        RateSet {
            amount: 1.0,
            base,
            date,
            rates: targets.iter().map(|t| (t.to_string(), self.rate)).collect(),
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[async_trait::async_trait]
impl RateProvider for FixedRateProvider {
    async fn fetch_latest(&self, base: CurrencyCode, targets: Option<&[CurrencyCode]>) -> FxResult<RateSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rate_set(base, date("2024-03-01"), targets))
    }

    async fn fetch_historical(
        &self,
        date: NaiveDate,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<RateSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rate_set(base, date, targets))
    }

    async fn fetch_time_series(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        base: CurrencyCode,
        targets: Option<&[CurrencyCode]>,
    ) -> FxResult<TimeSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TimeSeries {
            amount: 1.0,
            base,
            start_date: start,
            end_date: end,
            entries: start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|d| self.rate_set(base, d, targets))
                .collect(),
        })
    }
}

/// Tool that only counts how often it runs.
pub struct CountingTool {
    pub calls: AtomicUsize,
}

impl CountingTool {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Tool for CountingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "counting".to_string(),
            description: "Counts invocations".to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }

    async fn execute(&self, _arguments: serde_json::Value) -> FxResult<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({"ok": true}))
    }
}

/// Accepts exactly one token.
pub struct SingleTokenVerifier(pub &'static str);

#[async_trait::async_trait]
impl TokenVerifier for SingleTokenVerifier {
    async fn verify(&self, token: &str) -> FxResult<Identity> {
        if token == self.0 {
            Ok(Identity {
                login: "octocat".to_string(),
                id: 1,
                scopes: vec!["user:email".to_string()],
            })
        } else {
            Err(FxError::Unauthenticated("token not recognised".to_string()))
        }
    }
}
