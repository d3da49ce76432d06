//! Code tables published by the SRI and reused across the catalog and billing modules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax code for VAT (`IVA`) inside `totalImpuesto`/`impuesto` blocks.
pub const VAT_TAX_CODE: u8 = 2;

/// Identification reported for anonymous final-consumer sales.
pub const FINAL_CONSUMER_IDENTIFICATION: &str = "9999999999999";

/// SRI environment a document is issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    Test,
    Production,
}

impl EnvironmentType {
    pub const fn code(self) -> u8 {
        match self {
            EnvironmentType::Test => 1,
            EnvironmentType::Production => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            EnvironmentType::Test => "PRUEBAS",
            EnvironmentType::Production => "PRODUCCIÓN",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Test),
            2 => Some(Self::Production),
            _ => None,
        }
    }
}

/// Only normal emission is offered by the authority today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionType {
    #[default]
    Normal,
}

impl EmissionType {
    pub const fn code(self) -> u8 {
        match self {
            EmissionType::Normal => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    #[default]
    General,
    RimpeEntrepreneur,
    RimpePopularBusiness,
}

impl TaxRegime {
    pub const fn label(self) -> &'static str {
        match self {
            TaxRegime::General => "CONTRIBUYENTE RÉGIMEN GENERAL",
            TaxRegime::RimpeEntrepreneur => "CONTRIBUYENTE RÉGIMEN RIMPE",
            TaxRegime::RimpePopularBusiness => "CONTRIBUYENTE NEGOCIO POPULAR - RÉGIMEN RIMPE",
        }
    }

    pub const fn is_rimpe(self) -> bool {
        !matches!(self, TaxRegime::General)
    }
}

/// `codigoPorcentaje` values for VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxPercentage {
    Zero,
    Twelve,
    Fourteen,
    #[default]
    Fifteen,
    Five,
    NotSubject,
    Exempt,
    Differentiated,
    Thirteen,
}

impl TaxPercentage {
    pub const fn code(self) -> u8 {
        match self {
            TaxPercentage::Zero => 0,
            TaxPercentage::Twelve => 2,
            TaxPercentage::Fourteen => 3,
            TaxPercentage::Fifteen => 4,
            TaxPercentage::Five => 5,
            TaxPercentage::NotSubject => 6,
            TaxPercentage::Exempt => 7,
            TaxPercentage::Differentiated => 8,
            TaxPercentage::Thirteen => 10,
        }
    }

    /// Whole-number percentage charged for the code. Differentiated VAT is handled manually
    /// and therefore reported as zero.
    pub fn percent(self) -> Decimal {
        let value: i64 = match self {
            TaxPercentage::Twelve => 12,
            TaxPercentage::Fourteen => 14,
            TaxPercentage::Fifteen => 15,
            TaxPercentage::Five => 5,
            TaxPercentage::Thirteen => 13,
            TaxPercentage::Zero
            | TaxPercentage::NotSubject
            | TaxPercentage::Exempt
            | TaxPercentage::Differentiated => 0,
        };
        Decimal::from(value)
    }

    pub fn from_code(code: u8) -> Option<Self> {
        [
            Self::Zero,
            Self::Twelve,
            Self::Fourteen,
            Self::Fifteen,
            Self::Five,
            Self::NotSubject,
            Self::Exempt,
            Self::Differentiated,
            Self::Thirteen,
        ]
        .into_iter()
        .find(|candidate| candidate.code() == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[default]
    Cash,
    Credit,
    Card,
    Transfer,
}

impl PaymentType {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentType::Cash => "Efectivo",
            PaymentType::Credit => "Credito",
            PaymentType::Card => "Tarjeta",
            PaymentType::Transfer => "Transferencia bancaria",
        }
    }
}

/// `formaPago` codes accepted on the invoice `pagos` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    WithoutFinancialSystem,
    DebtCompensation,
    DebitCard,
    ElectronicMoney,
    PrepaidCard,
    #[default]
    OtherFinancialSystem,
    TitleEndorsement,
}

impl PaymentMethod {
    pub const fn code(self) -> &'static str {
        match self {
            PaymentMethod::WithoutFinancialSystem => "01",
            PaymentMethod::DebtCompensation => "15",
            PaymentMethod::DebitCard => "16",
            PaymentMethod::ElectronicMoney => "17",
            PaymentMethod::PrepaidCard => "18",
            PaymentMethod::OtherFinancialSystem => "20",
            PaymentMethod::TitleEndorsement => "21",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationType {
    Ruc,
    Cedula,
    Passport,
    FinalConsumer,
    Foreign,
}

impl IdentificationType {
    pub const fn code(self) -> &'static str {
        match self {
            IdentificationType::Ruc => "04",
            IdentificationType::Cedula => "05",
            IdentificationType::Passport => "06",
            IdentificationType::FinalConsumer => "07",
            IdentificationType::Foreign => "08",
        }
    }
}
