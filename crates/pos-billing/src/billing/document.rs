use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::receipt::{ReceiptKey, ReceiptNumber, VoucherType};
use super::totals::{DocumentTotals, LineItem};
use crate::catalog::choices::{EnvironmentType, PaymentMethod, PaymentType};
use crate::catalog::{CompanyId, CustomerId};
use crate::quotation::QuotationId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreditNoteId(pub String);

/// Lifecycle state shared by invoices and credit notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    WithoutAuthorizing,
    Authorized,
    AuthorizedAndSentByEmail,
    Canceled,
    SequentialRegisteredError,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::WithoutAuthorizing => "Sin autorizar",
            DocumentStatus::Authorized => "Autorizada",
            DocumentStatus::AuthorizedAndSentByEmail => "Autorizada y enviada por correo",
            DocumentStatus::Canceled => "Anulado",
            DocumentStatus::SequentialRegisteredError => "Error de secuencial registrado",
        }
    }

    pub const fn is_authorized(self) -> bool {
        matches!(
            self,
            DocumentStatus::Authorized | DocumentStatus::AuthorizedAndSentByEmail
        )
    }
}

/// Step of the electronic pipeline a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStage {
    XmlCreation,
    XmlSignature,
    XmlValidation,
    XmlAuthorized,
    SentByEmail,
}

impl VoucherStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            VoucherStage::XmlCreation => "xml_creation",
            VoucherStage::XmlSignature => "xml_signature",
            VoucherStage::XmlValidation => "xml_validation",
            VoucherStage::XmlAuthorized => "xml_authorized",
            VoucherStage::SentByEmail => "sent_by_email",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub access_key: String,
    pub authorization_number: String,
    pub authorized_at: DateTime<Utc>,
    pub authorized_xml: String,
}

/// Numbering and authorization data common to every electronic voucher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub company: CompanyId,
    pub receipt: ReceiptKey,
    pub issue_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub receipt_number: Option<ReceiptNumber>,
    pub receipt_number_full: Option<String>,
    pub environment: EnvironmentType,
    pub access_key: Option<String>,
    pub authorization: Option<Authorization>,
    pub create_electronic_invoice: bool,
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
    pub status: DocumentStatus,
}

impl DocumentHeader {
    pub fn voucher_type(&self) -> VoucherType {
        self.receipt.voucher_type
    }

    pub fn receipt_number_is_null(&self) -> bool {
        self.receipt_number.is_none() || self.receipt_number_full.is_none()
    }

    pub fn assign_number(&mut self, number: ReceiptNumber) {
        self.receipt_number_full = Some(self.receipt.full_number(number));
        self.receipt_number = Some(number);
    }

    pub fn authorize(&mut self, authorization: Authorization) {
        self.access_key = Some(authorization.access_key.clone());
        self.authorization = Some(authorization);
        self.status = DocumentStatus::Authorized;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    #[serde(flatten)]
    pub header: DocumentHeader,
    pub customer: CustomerId,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    /// Credit term in days, reported in the `pagos` block.
    pub time_limit: u32,
    pub cash: Decimal,
    pub change: Decimal,
    pub is_draft: bool,
    pub lines: Vec<LineItem>,
    pub totals: DocumentTotals,
    /// Whether inventoried stock has already been deducted for this invoice.
    pub stock_applied: bool,
    #[serde(default)]
    pub quotation: Option<QuotationId>,
}

impl Invoice {
    pub fn is_ticket(&self) -> bool {
        self.header.voucher_type() == VoucherType::SaleTicket
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: CreditNoteId,
    #[serde(flatten)]
    pub header: DocumentHeader,
    pub invoice: InvoiceId,
    pub motive: String,
    pub lines: Vec<LineItem>,
    pub totals: DocumentTotals,
}

/// Owner of a receipt error entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DocumentRef {
    Invoice(InvoiceId),
    CreditNote(CreditNoteId),
}
