// Closed catalog of currencies served by the upstream provider

use crate::error::{FxError, FxResult};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Supported currencies, sorted by code.
const CURRENCIES: [(&str, &str); 31] = [
    ("AUD", "Australian Dollar"),
    ("BGN", "Bulgarian Lev"),
    ("BRL", "Brazilian Real"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CNY", "Chinese Renminbi Yuan"),
    ("CZK", "Czech Koruna"),
    ("DKK", "Danish Krone"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
    ("HKD", "Hong Kong Dollar"),
    ("HUF", "Hungarian Forint"),
    ("IDR", "Indonesian Rupiah"),
    ("ILS", "Israeli New Sheqel"),
    ("INR", "Indian Rupee"),
    ("ISK", "Icelandic Króna"),
    ("JPY", "Japanese Yen"),
    ("KRW", "South Korean Won"),
    ("MXN", "Mexican Peso"),
    ("MYR", "Malaysian Ringgit"),
    ("NOK", "Norwegian Krone"),
    ("NZD", "New Zealand Dollar"),
    ("PHP", "Philippine Peso"),
    ("PLN", "Polish Złoty"),
    ("RON", "Romanian Leu"),
    ("SEK", "Swedish Krona"),
    ("SGD", "Singapore Dollar"),
    ("THB", "Thai Baht"),
    ("TRY", "Turkish Lira"),
    ("USD", "United States Dollar"),
    ("ZAR", "South African Rand"),
];

/// A currency code known to be in the catalog.
///
/// Only constructible through [`CurrencyCode::parse`], so holding one is
/// proof that the code was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode(&'static str);

impl CurrencyCode {
    /// Validate a caller-supplied code. Matching is exact and case sensitive.
    pub fn parse(code: &str) -> FxResult<Self> {
        CURRENCIES
            .binary_search_by(|(known, _)| known.cmp(&code))
            .map(|idx| Self(CURRENCIES[idx].0))
            .map_err(|_| FxError::UnknownCurrency(code.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Display name, e.g. "Euro".
    pub fn name(&self) -> &'static str {
        CURRENCIES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    pub fn euro() -> Self {
        Self("EUR")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Read-only view over the supported currencies
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyCatalog;

impl CurrencyCatalog {
    /// Code → display name, ordered by code.
    pub fn list(&self) -> BTreeMap<&'static str, &'static str> {
        CURRENCIES.iter().copied().collect()
    }

    pub fn is_supported(&self, code: &str) -> bool {
        CurrencyCode::parse(code).is_ok()
    }

    pub fn codes(&self) -> impl Iterator<Item = CurrencyCode> {
        CURRENCIES.iter().map(|(code, _)| CurrencyCode(*code))
    }

    pub fn len(&self) -> usize {
        CURRENCIES.len()
    }

    pub fn is_empty(&self) -> bool {
        CURRENCIES.is_empty()
    }
}
