use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::choices::{EmissionType, EnvironmentType, TaxPercentage, TaxRegime};

/// Identifier wrapper for tenant companies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// Identifier of the user owning a company (and its subscription).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Issuer data printed on every electronic voucher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    #[serde(default)]
    pub owner: Option<UserId>,
    pub ruc: String,
    pub company_name: String,
    pub commercial_name: String,
    pub main_address: String,
    pub establishment_address: String,
    pub establishment_code: String,
    pub issuing_point_code: String,
    #[serde(default = "default_special_taxpayer")]
    pub special_taxpayer: String,
    #[serde(default)]
    pub obligated_accounting: bool,
    pub environment: EnvironmentType,
    #[serde(default)]
    pub emission_type: EmissionType,
    #[serde(default)]
    pub retention_agent: bool,
    #[serde(default)]
    pub regime: TaxRegime,
    #[serde(default)]
    pub tax_percentage: TaxPercentage,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
    /// Secret protecting the electronic signature material.
    #[serde(default, skip_serializing)]
    pub signature_key: Option<String>,
}

fn default_special_taxpayer() -> String {
    "000".to_string()
}

impl Company {
    /// VAT charged on taxed lines as a fraction (0.15 for 15%).
    pub fn tax_rate(&self) -> Decimal {
        self.tax_percentage.percent() / Decimal::ONE_HUNDRED
    }

    pub fn obligated_accounting_label(&self) -> &'static str {
        if self.obligated_accounting {
            "SI"
        } else {
            "NO"
        }
    }

    /// `000` is the placeholder used by issuers without a special-taxpayer resolution.
    pub fn has_special_taxpayer_resolution(&self) -> bool {
        let resolution = self.special_taxpayer.trim();
        !resolution.is_empty() && resolution != "000"
    }

    pub fn validate(&self) -> Result<(), CompanyValidationError> {
        if self.ruc.len() != 13 || !self.ruc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CompanyValidationError::InvalidRuc(self.ruc.clone()));
        }
        for (field, value) in [
            ("establishment_code", &self.establishment_code),
            ("issuing_point_code", &self.issuing_point_code),
        ] {
            if value.len() != 3 || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CompanyValidationError::InvalidCode {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.company_name.trim().is_empty() {
            return Err(CompanyValidationError::MissingName);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompanyValidationError {
    #[error("RUC must have 13 digits, got '{0}'")]
    InvalidRuc(String),
    #[error("{field} must have 3 digits, got '{value}'")]
    InvalidCode { field: &'static str, value: String },
    #[error("company name is required")]
    MissingName,
}
