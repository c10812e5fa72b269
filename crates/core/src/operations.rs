//! The five FX operations exposed as tools.
//!
//! Each operation validates all of its inputs before touching the
//! [`RateProvider`], so a rejected request never costs an upstream call.

use crate::catalog::{CurrencyCatalog, CurrencyCode};
use crate::client::RateProvider;
use crate::error::{FxError, FxResult};
use crate::types::{ConversionResult, RateSet, TimeSeries};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Earliest date the provider serves.
pub fn earliest_supported_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("2020-01-01 is a valid date")
}

/// Parse a `YYYY-MM-DD` date and check it lies in `[2020-01-01, today]`.
pub fn validate_date(field: &str, value: &str, today: NaiveDate) -> FxResult<NaiveDate> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields; the wire format does not
    if trimmed.len() != 10 {
        return Err(FxError::invalid_date(field, value, "expected format YYYY-MM-DD"));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|e| FxError::invalid_date(field, value, format!("expected format YYYY-MM-DD ({})", e)))?;

    let earliest = earliest_supported_date();
    if date < earliest {
        return Err(FxError::invalid_date(
            field,
            value,
            format!("rates are only available from {}", earliest),
        ));
    }
    if date > today {
        return Err(FxError::invalid_date(
            field,
            value,
            format!("date is in the future (today is {})", today),
        ));
    }

    Ok(date)
}

/// Split a comma-separated symbol list into validated codes.
///
/// `None` or a blank string means no filter. Entries are trimmed and
/// de-duplicated keeping first occurrence; the first unknown entry rejects
/// the whole list.
pub fn parse_symbols(symbols: Option<&str>) -> FxResult<Option<Vec<CurrencyCode>>> {
    let raw = match symbols {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    let mut codes: Vec<CurrencyCode> = Vec::new();
    for entry in raw.split(',') {
        let code = CurrencyCode::parse(entry.trim())?;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    Ok(Some(codes))
}

fn validate_amount(amount: f64) -> FxResult<f64> {
    if amount.is_nan() {
        return Err(FxError::InvalidAmount("amount is NaN".to_string()));
    }
    if amount.is_infinite() {
        return Err(FxError::InvalidAmount(format!("amount {} is not finite", amount)));
    }
    if amount < 0.0 {
        return Err(FxError::InvalidAmount(format!("amount {} is negative", amount)));
    }
    Ok(amount)
}

/// Tool operations over a rate provider
#[derive(Clone)]
pub struct FxOperations {
    catalog: CurrencyCatalog,
    provider: Arc<dyn RateProvider>,
}

impl FxOperations {
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self {
            catalog: CurrencyCatalog,
            provider,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Code → display name for every supported currency.
    pub fn available_currencies(&self) -> BTreeMap<&'static str, &'static str> {
        self.catalog.list()
    }

    /// Convert `amount` of `from` into `to` at the latest rate.
    pub async fn convert_currency(&self, from: &str, to: &str, amount: f64) -> FxResult<ConversionResult> {
        let base = CurrencyCode::parse(from)?;
        let target = CurrencyCode::parse(to)?;
        let amount = validate_amount(amount)?;

        if base == target {
            return Ok(ConversionResult::new(amount, base, target, 1.0, Self::today()));
        }

        let rates = self.provider.fetch_latest(base, Some(&[target])).await?;
        let rate = rates.rate(target).ok_or_else(|| {
            FxError::UpstreamMalformed(format!("response for base {} has no rate for {}", base, target))
        })?;

        let result = ConversionResult::new(amount, base, target, rate, rates.date);
        if !result.converted_amount.is_finite() {
            return Err(FxError::InvalidAmount(format!(
                "{} {} converted at {} to {} is out of range",
                amount, base, rate, target
            )));
        }
        Ok(result)
    }

    /// Latest rates for `code` against every other known currency.
    pub async fn today_rates(&self, code: &str) -> FxResult<RateSet> {
        let base = CurrencyCode::parse(code)?;
        self.provider.fetch_latest(base, None).await
    }

    /// Rates on a single past date.
    pub async fn historical_rates(&self, date: &str, base: &str, symbols: Option<&str>) -> FxResult<RateSet> {
        let date = validate_date("date", date, Self::today())?;
        let base = CurrencyCode::parse(base)?;
        let symbols = parse_symbols(symbols)?;

        self.provider
            .fetch_historical(date, base, symbols.as_deref())
            .await
    }

    /// Rates for every business day between two dates, inclusive.
    pub async fn time_series_rates(
        &self,
        start_date: &str,
        end_date: &str,
        base: &str,
        symbols: Option<&str>,
    ) -> FxResult<TimeSeries> {
        let today = Self::today();
        let start = validate_date("start_date", start_date, today)?;
        let end = validate_date("end_date", end_date, today)?;
        if start > end {
            return Err(FxError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let base = CurrencyCode::parse(base)?;
        let symbols = parse_symbols(symbols)?;

        self.provider
            .fetch_time_series(start, end, base, symbols.as_deref())
            .await
    }
}
