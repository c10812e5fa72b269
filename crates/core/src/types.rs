// Rate data model: queries, rate sets, time series and conversions

use crate::catalog::CurrencyCode;
use chrono::NaiveDate;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Which point(s) in time a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePeriod {
    Latest,
    On(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

/// A validated request for rates.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuery {
    pub base: CurrencyCode,
    /// Target filter in caller order; `None` means every known code.
    pub symbols: Option<Vec<CurrencyCode>>,
    pub period: RatePeriod,
}

impl RateQuery {
    pub fn new(base: CurrencyCode, symbols: Option<&[CurrencyCode]>, period: RatePeriod) -> Self {
        Self {
            base,
            symbols: symbols.map(|s| s.to_vec()),
            period,
        }
    }

    /// Provider path segment for this query.
    pub fn path(&self) -> String {
        match self.period {
            RatePeriod::Latest => "latest".to_string(),
            RatePeriod::On(date) => date.format("%Y-%m-%d").to_string(),
            RatePeriod::Range { start, end } => format!(
                "{}..{}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }

    /// Query-string pairs: `base` always, `symbols` only when filtered.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("base", self.base.to_string())];
        if let Some(symbols) = &self.symbols {
            let joined = symbols
                .iter()
                .map(CurrencyCode::as_str)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("symbols", joined));
        }
        pairs
    }
}

/// Rates for one base currency on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSet {
    pub amount: f64,
    pub base: CurrencyCode,
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

impl RateSet {
    pub fn rate(&self, target: CurrencyCode) -> Option<f64> {
        self.rates.get(target.as_str()).copied()
    }
}

/// Rates over a date range, ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub amount: f64,
    pub base: CurrencyCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub entries: Vec<RateSet>,
}

impl TimeSeries {
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.iter().map(|entry| entry.date)
    }
}

struct SeriesRates<'a>(&'a [RateSet]);

impl Serialize for SeriesRates<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(&entry.date, &entry.rates)?;
        }
        map.end()
    }
}

// {amount, base, start_date, end_date, rates: {date: {code: rate}}}
impl Serialize for TimeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TimeSeries", 5)?;
        state.serialize_field("amount", &self.amount)?;
        state.serialize_field("base", &self.base)?;
        state.serialize_field("start_date", &self.start_date)?;
        state.serialize_field("end_date", &self.end_date)?;
        state.serialize_field("rates", &SeriesRates(&self.entries))?;
        state.end()
    }
}

/// Outcome of converting an amount between two currencies.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub amount: f64,
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    pub rate: f64,
    pub date: NaiveDate,
    pub converted_amount: f64,
}

impl ConversionResult {
    pub fn new(amount: f64, base: CurrencyCode, target: CurrencyCode, rate: f64, date: NaiveDate) -> Self {
        Self {
            amount,
            base,
            target,
            rate,
            date,
            converted_amount: amount * rate,
        }
    }
}

// {amount, base, date, rates: {target: rate}, converted_amount}
impl Serialize for ConversionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rates: BTreeMap<&str, f64> = [(self.target.as_str(), self.rate)].into_iter().collect();

        let mut state = serializer.serialize_struct("ConversionResult", 5)?;
        state.serialize_field("amount", &self.amount)?;
        state.serialize_field("base", &self.base)?;
        state.serialize_field("date", &self.date)?;
        state.serialize_field("rates", &rates)?;
        state.serialize_field("converted_amount", &self.converted_amount)?;
        state.end()
    }
}
