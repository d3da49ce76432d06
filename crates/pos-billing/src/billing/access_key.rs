//! 49-digit access key (`claveAcceso`) required on every electronic voucher.

use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::receipt::{ReceiptNumber, VoucherType};
use crate::catalog::choices::{EmissionType, EnvironmentType};

pub const ACCESS_KEY_LEN: usize = 49;

/// Fields the key is assembled from, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyParts {
    pub issue_date: NaiveDate,
    pub voucher_type: VoucherType,
    pub ruc: String,
    pub environment: EnvironmentType,
    pub establishment_code: String,
    pub issuing_point_code: String,
    pub sequence: ReceiptNumber,
    pub numeric_code: String,
    pub emission_type: EmissionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessKey(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccessKeyError {
    #[error("{field} must be {len} digits, got '{value}'")]
    Field {
        field: &'static str,
        len: usize,
        value: String,
    },
    #[error("access key must have {ACCESS_KEY_LEN} digits, got {0}")]
    Length(usize),
    #[error("unknown {field} code '{value}'")]
    UnknownCode { field: &'static str, value: String },
    #[error("check digit mismatch: expected {expected}, found {found}")]
    CheckDigit { expected: u8, found: u8 },
}

fn digits(field: &'static str, value: &str, len: usize) -> Result<(), AccessKeyError> {
    if value.len() == len && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AccessKeyError::Field {
            field,
            len,
            value: value.to_string(),
        })
    }
}

/// Modulo-11 check digit with weights 2..=7 applied from the rightmost digit.
///
/// A result of 11 maps to 0 and 10 maps to 1.
pub fn check_digit(payload: &str) -> u8 {
    let sum: u32 = payload
        .bytes()
        .rev()
        .filter(u8::is_ascii_digit)
        .zip((2..=7).cycle())
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();
    match 11 - (sum % 11) {
        11 => 0,
        10 => 1,
        value => value as u8,
    }
}

/// Eight random digits used as the key's numeric code.
pub fn random_numeric_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("{value:08}")
}

impl AccessKey {
    pub fn generate(parts: &AccessKeyParts) -> Result<Self, AccessKeyError> {
        digits("ruc", &parts.ruc, 13)?;
        digits("establishment_code", &parts.establishment_code, 3)?;
        digits("issuing_point_code", &parts.issuing_point_code, 3)?;
        digits("numeric_code", &parts.numeric_code, 8)?;

        let mut payload = String::with_capacity(ACCESS_KEY_LEN);
        payload.push_str(&parts.issue_date.format("%d%m%Y").to_string());
        payload.push_str(parts.voucher_type.code());
        payload.push_str(&parts.ruc);
        payload.push_str(&parts.environment.code().to_string());
        payload.push_str(&parts.establishment_code);
        payload.push_str(&parts.issuing_point_code);
        payload.push_str(&parts.sequence.to_string());
        payload.push_str(&parts.numeric_code);
        payload.push_str(&parts.emission_type.code().to_string());

        let check = check_digit(&payload);
        payload.push(char::from(b'0' + check));
        Ok(Self(payload))
    }

    /// Validates the layout and check digit of an existing key and splits it into its fields.
    pub fn parse(value: &str) -> Result<(Self, AccessKeyParts), AccessKeyError> {
        let value = value.trim();
        if value.len() != ACCESS_KEY_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccessKeyError::Length(value.len()));
        }

        let expected = check_digit(&value[..48]);
        let found = value.as_bytes()[48] - b'0';
        if expected != found {
            return Err(AccessKeyError::CheckDigit { expected, found });
        }

        let unknown = |field: &'static str, raw: &str| AccessKeyError::UnknownCode {
            field,
            value: raw.to_string(),
        };

        let issue_date = NaiveDate::parse_from_str(&value[0..8], "%d%m%Y")
            .map_err(|_| unknown("issue_date", &value[0..8]))?;
        let voucher_type =
            VoucherType::from_code(&value[8..10]).ok_or_else(|| unknown("voucher_type", &value[8..10]))?;
        let environment = value[23..24]
            .parse::<u8>()
            .ok()
            .and_then(EnvironmentType::from_code)
            .ok_or_else(|| unknown("environment", &value[23..24]))?;
        let sequence = value[30..39]
            .parse::<u64>()
            .map(ReceiptNumber)
            .map_err(|_| unknown("sequence", &value[30..39]))?;
        if &value[47..48] != "1" {
            return Err(unknown("emission_type", &value[47..48]));
        }

        let parts = AccessKeyParts {
            issue_date,
            voucher_type,
            ruc: value[10..23].to_string(),
            environment,
            establishment_code: value[24..27].to_string(),
            issuing_point_code: value[27..30].to_string(),
            sequence,
            numeric_code: value[39..47].to_string(),
            emission_type: EmissionType::Normal,
        };
        Ok((Self(value.to_string()), parts))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
