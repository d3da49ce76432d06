use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::choices::{IdentificationType, FINAL_CONSUMER_IDENTIFICATION};
use super::company::CompanyId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Buyer registered by a company. A customer may carry a RUC, a cédula, or neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub company: CompanyId,
    pub names: String,
    #[serde(default)]
    pub ruc: Option<String>,
    #[serde(default)]
    pub dni: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_credit_authorized: bool,
    #[serde(default)]
    pub credit_limit: Decimal,
}

impl Customer {
    /// RUC wins over cédula; anything else is billed as final consumer.
    pub fn identification_type(&self) -> IdentificationType {
        if non_blank(&self.ruc).is_some() {
            IdentificationType::Ruc
        } else if non_blank(&self.dni).is_some() {
            IdentificationType::Cedula
        } else {
            IdentificationType::FinalConsumer
        }
    }

    pub fn identification(&self) -> &str {
        non_blank(&self.ruc)
            .or_else(|| non_blank(&self.dni))
            .unwrap_or(FINAL_CONSUMER_IDENTIFICATION)
    }

    pub fn address(&self) -> Option<&str> {
        non_blank(&self.address)
    }

    pub fn mobile(&self) -> Option<&str> {
        non_blank(&self.mobile)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(ruc: Option<&str>, dni: Option<&str>) -> Customer {
        Customer {
            id: CustomerId("cus-1".to_string()),
            company: CompanyId("cmp-1".to_string()),
            names: "Ana Torres".to_string(),
            ruc: ruc.map(str::to_string),
            dni: dni.map(str::to_string),
            email: None,
            mobile: None,
            address: None,
            is_credit_authorized: false,
            credit_limit: Decimal::ZERO,
        }
    }

    #[test]
    fn ruc_takes_precedence_over_cedula() {
        let buyer = customer(Some("1790012345001"), Some("1712345678"));
        assert_eq!(buyer.identification_type(), IdentificationType::Ruc);
        assert_eq!(buyer.identification(), "1790012345001");
    }

    #[test]
    fn missing_identification_falls_back_to_final_consumer() {
        let buyer = customer(None, Some("  "));
        assert_eq!(buyer.identification_type(), IdentificationType::FinalConsumer);
        assert_eq!(buyer.identification(), FINAL_CONSUMER_IDENTIFICATION);
    }
}
