use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{DocumentRef, VoucherStage};
use super::receipt::ReceiptKey;
use crate::catalog::choices::EnvironmentType;
use crate::catalog::CompanyId;
use crate::store::RepositoryError;

/// Failure reported while pushing a document through the SRI pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptErrorRecord {
    pub id: String,
    pub receipt: ReceiptKey,
    pub document: DocumentRef,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub environment: EnvironmentType,
    pub receipt_number_full: Option<String>,
    pub stage: Option<VoucherStage>,
    pub errors: serde_json::Value,
}

impl ReceiptErrorRecord {
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }
}

pub trait ReceiptErrorRepository: Send + Sync {
    fn record_receipt_error(&self, record: ReceiptErrorRecord) -> Result<(), RepositoryError>;
    /// Entries for a company, newest first.
    fn receipt_errors(&self, company: &CompanyId) -> Result<Vec<ReceiptErrorRecord>, RepositoryError>;
}
