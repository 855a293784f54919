//! Raw sale records, and the validation that turns them into [`SaleRecord`]s.
//!
//! Readers produce [`RawRecord`]s: loosely typed key-value maps whose fields
//! may be strings (from CSV) or any JSON value. Nothing is checked at load
//! time; a record is only validated when it is folded into a report.

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use std::str::FromStr;

use crate::money::Money;

pub const USER_ID: &str = "user_id";
pub const DATE: &str = "date";
pub const PRICE: &str = "price";
pub const QUANTITY: &str = "quantity";

/// One raw transaction entry, with every field preserved as read.
pub type RawRecord = Map<String, Value>;

/// Why a single record could not be folded into a report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("field {field:?}: not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field {field:?}: negative value {value}")]
    Negative { field: &'static str, value: String },

    #[error("date {value:?} does not match format {format:?}")]
    InvalidDate { value: String, format: String },
}

/// A record that was skipped while building a user's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRecord {
    /// Position of the record in the loaded collection.
    pub index: usize,
    pub user_id: String,
    pub error: RecordError,
}

/// A validated sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub price: Money,
    pub quantity: u32,
}

impl SaleRecord {
    /// Validates `raw`, parsing its date with the chrono format string
    /// `date_format`.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] if any of `user_id`, `date`, `price` or
    /// `quantity` is missing or empty, if the date does not match
    /// `date_format`, or if price or quantity is not a non-negative number.
    pub fn from_raw(raw: &RawRecord, date_format: &str) -> Result<Self, RecordError> {
        let user_id = user_id(raw).ok_or(RecordError::MissingField(USER_ID))?;
        let date = parse_date(field(raw, DATE)?, date_format)?;
        let price = parse_price(field(raw, PRICE)?)?;
        let quantity = parse_quantity(field(raw, QUANTITY)?)?;
        Ok(Self {
            user_id,
            date,
            price,
            quantity,
        })
    }

    /// Returns `price * quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// Returns the normalized `user_id` of `raw`, if it has a usable one.
#[must_use]
pub fn user_id(raw: &RawRecord) -> Option<String> {
    raw.get(USER_ID).and_then(normalize_user_id)
}

/// Normalizes a user id so that `42`, `42.0`, `"42"` and `" 42 "` compare
/// equal. Returns `None` for null, empty, and non-scalar values.
#[must_use]
pub fn normalize_user_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => normalize_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!id.is_empty()).then_some(id)
}

#[allow(clippy::cast_possible_truncation)]
fn normalize_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

fn field<'a>(raw: &'a RawRecord, name: &'static str) -> Result<&'a Value, RecordError> {
    match raw.get(name) {
        None | Some(Value::Null) => Err(RecordError::MissingField(name)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(RecordError::MissingField(name)),
        Some(v) => Ok(v),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_date(value: &Value, format: &str) -> Result<NaiveDate, RecordError> {
    let invalid = || RecordError::InvalidDate {
        value: text(value),
        format: format.to_string(),
    };
    let Value::String(s) = value else {
        return Err(invalid());
    };
    NaiveDate::parse_from_str(s.trim(), format).map_err(|_| invalid())
}

fn parse_price(value: &Value) -> Result<Money, RecordError> {
    let invalid = || RecordError::InvalidNumber {
        field: PRICE,
        value: text(value),
    };
    let price = match value {
        Value::Number(n) => n.as_f64().and_then(Money::from_f64).ok_or_else(invalid)?,
        Value::String(s) => match Money::from_str(s) {
            Ok(m) => m,
            Err(_) if s.trim_start().starts_with('-') => {
                return Err(RecordError::Negative {
                    field: PRICE,
                    value: s.clone(),
                })
            }
            Err(_) => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };
    if price.is_negative() {
        return Err(RecordError::Negative {
            field: PRICE,
            value: text(value),
        });
    }
    Ok(price)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_quantity(value: &Value) -> Result<u32, RecordError> {
    let invalid = || RecordError::InvalidNumber {
        field: QUANTITY,
        value: text(value),
    };
    let negative = || RecordError::Negative {
        field: QUANTITY,
        value: text(value),
    };
    let qty = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => {
            let s = s.trim();
            if let Ok(q) = s.parse::<u32>() {
                return Ok(q);
            }
            s.parse::<f64>().map_err(|_| invalid())?
        }
        _ => return Err(invalid()),
    };
    if qty < 0.0 {
        return Err(negative());
    }
    if qty.fract() != 0.0 || qty > f64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(qty as u32)
}
