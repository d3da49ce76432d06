use super::document::{CreditNote, CreditNoteId, Invoice, InvoiceId};
use crate::store::RepositoryError;

/// Storage abstraction for issued documents.
pub trait DocumentRepository: Send + Sync {
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError>;
    fn update_invoice(&self, invoice: Invoice) -> Result<(), RepositoryError>;
    fn invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;

    fn insert_credit_note(&self, note: CreditNote) -> Result<CreditNote, RepositoryError>;
    fn credit_note(&self, id: &CreditNoteId) -> Result<Option<CreditNote>, RepositoryError>;
    fn credit_notes_for(&self, invoice: &InvoiceId) -> Result<Vec<CreditNote>, RepositoryError>;
}
