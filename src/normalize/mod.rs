//! Normalizer: maps decoded source records into canonical
//! `NormalizedBar/Quote/Fundamentals/Profile/News` entities.
//!
//! Grounded on `models.rs`'s plain value-struct + `validate()` idiom,
//! retargeted at market-data entities instead of trading-bot order types.

pub mod bars;
pub mod fundamentals;
pub mod news;
pub mod profile;
pub mod quote;

use crate::error::{ErrorKind, FetchError};

/// Schema version stamped on every normalized artifact. The patch
/// component documents the scope of the quarterly-period assumption in
/// `fundamentals::period_bounds`; bump it whenever that assumption's
/// scope changes.
pub const SCHEMA_VERSION: &str = "1.0.1";

/// Provenance metadata attached to every normalized artifact. Immutable
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Meta {
    pub run_id: String,
    pub source: String,
    pub producer: String,
    pub schema_version: String,
}

impl Meta {
    pub fn new(run_id: impl Into<String>, producer: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            source: "yahoo-finance-web".to_string(),
            producer: producer.into(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

/// `^[A-Z]{3}$`, checked without a regex dependency since it's a fixed
/// 3-char ASCII shape.
pub fn is_valid_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// `^[A-Z0-9]{4}$`.
pub fn is_valid_mic(mic: &str) -> bool {
    mic.len() == 4 && mic.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

pub fn validate_currency_code(code: &str) -> Result<(), FetchError> {
    if !is_valid_currency_code(code) {
        return Err(FetchError::new(
            ErrorKind::ValidationError,
            format!("currency_code {code:?} does not match ^[A-Z]{{3}}$"),
        ));
    }
    Ok(())
}

pub fn validate_mic_if_present(mic: &str) -> Result<(), FetchError> {
    if !mic.is_empty() && !is_valid_mic(mic) {
        return Err(FetchError::new(
            ErrorKind::ValidationError,
            format!("mic {mic:?} does not match ^[A-Z0-9]{{4}}$"),
        ));
    }
    Ok(())
}
