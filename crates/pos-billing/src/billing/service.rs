use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::access_key::{random_numeric_code, AccessKey, AccessKeyError, AccessKeyParts};
use super::document::{
    Authorization, CreditNote, CreditNoteId, DocumentHeader, DocumentRef, DocumentStatus, Invoice,
    InvoiceId, VoucherStage,
};
use super::lines::{check_stock, inputs_from_items, resolve_lines, LineError, LineRequest};
use super::pipeline::{AuthorizationPipeline, PipelineFailure};
use super::receipt::{ReceiptKey, ReceiptLease, ReceiptNumber, ReceiptSequencer, SequencerError, VoucherType};
use super::receipt_error::ReceiptErrorRecord;
use super::sri::SriGateway;
use super::totals::{compute_document, LineInput, LineItem};
use super::xml::{render_credit_note, render_invoice};
use crate::accounts::{AccountId, AccountKind, Counterparty, DebtAccount};
use crate::catalog::choices::{PaymentMethod, PaymentType};
use crate::catalog::service::today;
use crate::catalog::{Company, CompanyId, Customer, CustomerId};
use crate::quotation::{QuotationError, QuotationId};
use crate::store::{BillingStore, RepositoryError};
use crate::subscription::{check_quota, ensure_quota, QuotaCheck, QuotaError, QuotaKind};

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

fn default_voucher_type() -> VoucherType {
    VoucherType::Invoice
}

/// Sale submitted from the point of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub company: CompanyId,
    pub customer: CustomerId,
    #[serde(default = "default_voucher_type")]
    pub voucher_type: VoucherType,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Credit term in days.
    #[serde(default)]
    pub time_limit: u32,
    /// Cash handed over; zero means the exact amount.
    #[serde(default)]
    pub cash: Decimal,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
    #[serde(default)]
    pub lines: Vec<LineRequest>,
}

/// Payment terms used when a quotation becomes an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotationInvoiceRequest {
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub time_limit: u32,
    #[serde(default)]
    pub cash: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteRequest {
    /// Overrides the default motive.
    #[serde(default)]
    pub motive: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
}

/// Preview of the number the next document of a voucher type would receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextReceipt {
    pub voucher_type: VoucherType,
    pub establishment_code: String,
    pub issuing_point_code: String,
    pub number: ReceiptNumber,
    pub full_number: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("unknown company {0}")]
    UnknownCompany(String),
    #[error("unknown customer {0}")]
    UnknownCustomer(String),
    #[error("invoice {0} not found")]
    UnknownInvoice(String),
    #[error("invalid document: {0}")]
    Invalid(String),
    #[error("invoice {0} is already authorized")]
    AlreadyAuthorized(String),
    #[error("invoice {0} is not authorized")]
    NotAuthorized(String),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Lines(#[from] LineError),
    #[error(transparent)]
    Quotation(#[from] QuotationError),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Authorization(#[from] PipelineFailure),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Common access to the numbering header of invoices and credit notes.
trait Voucher {
    fn header(&self) -> &DocumentHeader;
    fn header_mut(&mut self) -> &mut DocumentHeader;
    fn reference(&self) -> DocumentRef;
}

impl Voucher for Invoice {
    fn header(&self) -> &DocumentHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DocumentHeader {
        &mut self.header
    }

    fn reference(&self) -> DocumentRef {
        DocumentRef::Invoice(self.id.clone())
    }
}

impl Voucher for CreditNote {
    fn header(&self) -> &DocumentHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DocumentHeader {
        &mut self.header
    }

    fn reference(&self) -> DocumentRef {
        DocumentRef::CreditNote(self.id.clone())
    }
}

fn access_key_for(company: &Company, header: &DocumentHeader) -> Result<AccessKey, AccessKeyError> {
    let sequence = header.receipt_number.unwrap_or(ReceiptNumber(0));
    AccessKey::generate(&AccessKeyParts {
        issue_date: header.issue_date,
        voucher_type: header.voucher_type(),
        ruc: company.ruc.clone(),
        environment: header.environment,
        establishment_code: header.receipt.establishment_code.clone(),
        issuing_point_code: header.receipt.issuing_point_code.clone(),
        sequence,
        numeric_code: random_numeric_code(),
        emission_type: company.emission_type,
    })
}

/// Invoice and credit-note issuance on top of the receipt sequencer and the SRI pipeline.
pub struct BillingService<S, G: ?Sized> {
    store: Arc<S>,
    sequencer: Arc<ReceiptSequencer<S>>,
    pipeline: AuthorizationPipeline<G>,
}

impl<S, G> BillingService<S, G>
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    pub fn new(
        store: Arc<S>,
        sequencer: Arc<ReceiptSequencer<S>>,
        pipeline: AuthorizationPipeline<G>,
    ) -> Self {
        Self {
            store,
            sequencer,
            pipeline,
        }
    }

    pub fn sequencer(&self) -> &Arc<ReceiptSequencer<S>> {
        &self.sequencer
    }

    fn company(&self, id: &CompanyId) -> Result<Company, BillingError> {
        self.store
            .company(id)?
            .ok_or_else(|| BillingError::UnknownCompany(id.0.clone()))
    }

    fn customer(&self, company: &Company, id: &CustomerId) -> Result<Customer, BillingError> {
        self.store
            .customer(id)?
            .filter(|customer| customer.company == company.id)
            .ok_or_else(|| BillingError::UnknownCustomer(id.0.clone()))
    }

    pub fn invoice(&self, id: &InvoiceId) -> Result<Invoice, BillingError> {
        self.store
            .invoice(id)?
            .ok_or_else(|| BillingError::UnknownInvoice(id.0.clone()))
    }

    fn emittable_invoice(&self, id: &InvoiceId) -> Result<Invoice, BillingError> {
        let invoice = self.invoice(id)?;
        if invoice.header.status.is_authorized() {
            return Err(BillingError::AlreadyAuthorized(id.0.clone()));
        }
        if invoice.header.status == DocumentStatus::Canceled {
            return Err(BillingError::Invalid(format!("invoice {} is canceled", id.0)));
        }
        if invoice.is_ticket() {
            return Err(BillingError::Invalid("sale tickets are not sent to the SRI".into()));
        }
        Ok(invoice)
    }

    pub fn credit_note(&self, id: &CreditNoteId) -> Result<CreditNote, BillingError> {
        Ok(self.store.credit_note(id)?.ok_or(RepositoryError::NotFound)?)
    }

    /// Number the next document of `voucher_type` would get. Nothing is reserved.
    pub fn next_receipt_number(
        &self,
        company: &CompanyId,
        voucher_type: VoucherType,
    ) -> Result<NextReceipt, BillingError> {
        let company = self.company(company)?;
        let key = ReceiptKey::for_company(&company, voucher_type);
        let number = self.sequencer.next_number(&key)?;
        Ok(NextReceipt {
            voucher_type,
            full_number: key.full_number(number),
            establishment_code: key.establishment_code,
            issuing_point_code: key.issuing_point_code,
            number,
        })
    }

    pub fn quota_check(&self, company: &CompanyId, kind: QuotaKind) -> Result<QuotaCheck, BillingError> {
        let company = self.company(company)?;
        Ok(check_quota(self.store.as_ref(), &company, kind, today())?)
    }

    pub fn receipt_errors(&self, company: &CompanyId) -> Result<Vec<ReceiptErrorRecord>, BillingError> {
        self.company(company)?;
        Ok(self.store.receipt_errors(company)?)
    }

    /// Creates a sale. Electronic invoices are only stored once the SRI authorized them;
    /// drafts and sale tickets are stored right away.
    pub async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, BillingError> {
        let day = request.issue_date.unwrap_or_else(today);
        let inputs = resolve_lines(self.store.as_ref(), &request.company, &request.lines, day)?;
        self.issue(request, inputs, None).await
    }

    /// Turns an active quotation into an invoice at the quoted prices.
    pub async fn invoice_quotation(
        &self,
        id: &QuotationId,
        request: QuotationInvoiceRequest,
    ) -> Result<Invoice, BillingError> {
        let mut quotation = self.store.quotation(id)?.ok_or(RepositoryError::NotFound)?;
        if !quotation.active {
            return Err(QuotationError::Inactive(id.0.clone()).into());
        }
        if !request.is_draft {
            quotation.validate_stock(self.store.as_ref())?;
        }

        let invoice_request = InvoiceRequest {
            company: quotation.company.clone(),
            customer: quotation.customer.clone(),
            voucher_type: VoucherType::Invoice,
            payment_type: request.payment_type,
            payment_method: request.payment_method,
            time_limit: request.time_limit,
            cash: request.cash,
            is_draft: request.is_draft,
            issue_date: None,
            additional_info: BTreeMap::new(),
            lines: Vec::new(),
        };
        let inputs = inputs_from_items(&quotation.lines);
        let invoice = self.issue(invoice_request, inputs, Some(id.clone())).await?;

        quotation.active = false;
        self.store.update_quotation(quotation)?;
        info!(quotation = %id.0, invoice = %invoice.id.0, "quotation invoiced");
        Ok(invoice)
    }

    async fn issue(
        &self,
        request: InvoiceRequest,
        inputs: Vec<LineInput>,
        quotation: Option<QuotationId>,
    ) -> Result<Invoice, BillingError> {
        let company = self.company(&request.company)?;
        let customer = self.customer(&company, &request.customer)?;
        if request.voucher_type == VoucherType::CreditNote {
            return Err(BillingError::Invalid(
                "credit notes are issued against an authorized invoice".into(),
            ));
        }
        ensure_quota(self.store.as_ref(), &company, QuotaKind::Invoice, today())?;

        let day = request.issue_date.unwrap_or_else(today);
        let (lines, totals) = compute_document(inputs, company.tax_rate());
        if !request.is_draft {
            check_stock(self.store.as_ref(), &lines)?;
        }
        let (cash, change) = settle(&request, &customer, totals.total_amount)?;

        let receipt = ReceiptKey::for_company(&company, request.voucher_type);
        let electronic = request.voucher_type.is_electronic() && !request.is_draft;
        let mut invoice = Invoice {
            id: InvoiceId(next_id("inv")),
            header: DocumentHeader {
                company: company.id.clone(),
                receipt: receipt.clone(),
                issue_date: day,
                created_at: Utc::now(),
                receipt_number: None,
                receipt_number_full: None,
                environment: company.environment,
                access_key: None,
                authorization: None,
                create_electronic_invoice: electronic,
                additional_info: request.additional_info,
                status: DocumentStatus::WithoutAuthorizing,
            },
            customer: customer.id.clone(),
            payment_type: request.payment_type,
            payment_method: request.payment_method,
            time_limit: request.time_limit,
            cash,
            change,
            is_draft: request.is_draft,
            lines,
            totals,
            stock_applied: false,
            quotation,
        };

        if request.is_draft {
            let invoice = self.store.insert_invoice(invoice)?;
            info!(invoice = %invoice.id.0, company = %company.id.0, "draft invoice stored");
            return Ok(invoice);
        }

        let mut lease = self.sequencer.reserve(&receipt).await?;
        if electronic {
            let outcome = self
                .authorize_document(&company, &mut lease, &mut invoice, |invoice, key| {
                    render_invoice(&company, &customer, invoice, key)
                })
                .await;
            match outcome {
                Ok(authorization) => invoice.header.authorize(authorization),
                Err(BillingError::Authorization(failure)) => {
                    drop(lease);
                    // the renumbered sequence was rejected as well; never hand it out again
                    if let (true, Some(number)) =
                        (failure.is_duplicate_sequence(), invoice.header.receipt_number)
                    {
                        self.sequencer.advance_past(&receipt, number).await?;
                    }
                    return Err(BillingError::Authorization(failure));
                }
                Err(other) => return Err(other),
            }
        } else {
            invoice.header.assign_number(lease.number());
        }

        invoice.stock_applied = true;
        let invoice = self.store.insert_invoice(invoice)?;
        self.sequencer.commit(lease)?;
        self.apply_stock(&invoice.lines, -1)?;
        if invoice.payment_type == PaymentType::Credit {
            self.open_receivable(&invoice)?;
        }

        info!(
            invoice = %invoice.id.0,
            number = invoice.header.receipt_number_full.as_deref().unwrap_or_default(),
            voucher = invoice.header.voucher_type().code(),
            total = %invoice.totals.total_amount,
            "invoice issued"
        );
        Ok(invoice)
    }

    /// Sends a stored draft through the SRI pipeline.
    pub async fn emit_invoice(&self, id: &InvoiceId) -> Result<Invoice, BillingError> {
        let draft = self.emittable_invoice(id)?;
        let company = self.company(&draft.header.company)?;
        let customer = self.customer(&company, &draft.customer)?;

        // numbers always come from the company's current receipt
        let receipt = ReceiptKey::for_company(&company, draft.header.voucher_type());
        let mut lease = self.sequencer.reserve(&receipt).await?;

        // another emission may have finished while this one waited on the lease
        let mut invoice = self.emittable_invoice(id)?;
        if !invoice.stock_applied {
            check_stock(self.store.as_ref(), &invoice.lines)?;
        }
        invoice.header.receipt = receipt.clone();
        invoice.header.environment = company.environment;
        invoice.header.create_electronic_invoice = true;

        let outcome = self
            .authorize_document(&company, &mut lease, &mut invoice, |invoice, key| {
                render_invoice(&company, &customer, invoice, key)
            })
            .await;

        let authorization = match outcome {
            Ok(authorization) => authorization,
            Err(BillingError::Authorization(failure)) => {
                drop(lease);
                if failure.is_duplicate_sequence() {
                    self.mark_sequence_registered(&mut invoice).await?;
                }
                return Err(BillingError::Authorization(failure));
            }
            Err(other) => return Err(other),
        };

        invoice.header.authorize(authorization);
        invoice.is_draft = false;
        let deduct = !invoice.stock_applied;
        invoice.stock_applied = true;
        self.store.update_invoice(invoice.clone())?;
        if deduct {
            self.apply_stock(&invoice.lines, -1)?;
        }
        if invoice.payment_type == PaymentType::Credit
            && self.store.account_for_document(&invoice.id.0)?.is_none()
        {
            self.open_receivable(&invoice)?;
        }
        self.sequencer.commit(lease)?;
        info!(invoice = %invoice.id.0, number = invoice.header.receipt_number_full.as_deref().unwrap_or_default(), "invoice emitted");
        Ok(invoice)
    }

    /// Voids an authorized invoice with a credit note covering all of its lines.
    pub async fn create_credit_note(
        &self,
        invoice_id: &InvoiceId,
        request: CreditNoteRequest,
    ) -> Result<CreditNote, BillingError> {
        let invoice = self.invoice(invoice_id)?;
        if !invoice.header.status.is_authorized() {
            return Err(BillingError::NotAuthorized(invoice_id.0.clone()));
        }
        let company = self.company(&invoice.header.company)?;
        let customer = self.customer(&company, &invoice.customer)?;
        let invoice_number = invoice
            .header
            .receipt_number_full
            .clone()
            .unwrap_or_default();

        let (lines, totals) = compute_document(inputs_from_items(&invoice.lines), invoice.totals.tax);
        let receipt = ReceiptKey::for_company(&company, VoucherType::CreditNote);
        let motive = request
            .motive
            .map(|motive| motive.trim().to_string())
            .filter(|motive| !motive.is_empty())
            .unwrap_or_else(|| format!("NOTA DE CREDITO DE LA VENTA {invoice_number}"));

        let mut note = CreditNote {
            id: CreditNoteId(next_id("nc")),
            header: DocumentHeader {
                company: company.id.clone(),
                receipt: receipt.clone(),
                issue_date: request.issue_date.unwrap_or_else(today),
                created_at: Utc::now(),
                receipt_number: None,
                receipt_number_full: None,
                environment: company.environment,
                access_key: None,
                authorization: None,
                create_electronic_invoice: true,
                additional_info: BTreeMap::new(),
                status: DocumentStatus::WithoutAuthorizing,
            },
            invoice: invoice.id.clone(),
            motive,
            lines,
            totals,
        };

        let mut lease = self.sequencer.reserve(&receipt).await?;
        // a concurrent note may have canceled the invoice while this one waited on the lease
        let mut invoice = self.invoice(invoice_id)?;
        if !invoice.header.status.is_authorized() {
            return Err(BillingError::NotAuthorized(invoice_id.0.clone()));
        }
        let authorization = self
            .authorize_document(&company, &mut lease, &mut note, |note, key| {
                render_credit_note(&company, &customer, &invoice, note, key)
            })
            .await?;
        note.header.authorize(authorization);

        let note = self.store.insert_credit_note(note)?;
        invoice.header.status = DocumentStatus::Canceled;
        self.store.update_invoice(invoice.clone())?;
        if invoice.stock_applied {
            self.apply_stock(&note.lines, 1)?;
        }
        self.sequencer.commit(lease)?;
        info!(
            credit_note = %note.id.0,
            invoice = %invoice.id.0,
            number = note.header.receipt_number_full.as_deref().unwrap_or_default(),
            "credit note authorized; invoice canceled"
        );
        Ok(note)
    }

    /// Logs a pipeline failure for a stored invoice. With `change_status`, a duplicate-sequence
    /// rejection also flags the invoice and moves the receipt counter past its number.
    pub async fn record_failure(
        &self,
        invoice_id: &InvoiceId,
        failure: &PipelineFailure,
        change_status: bool,
    ) -> Result<ReceiptErrorRecord, BillingError> {
        let mut invoice = self.invoice(invoice_id)?;
        let record = self.log_failure(&invoice, failure)?;
        if change_status && failure.is_duplicate_sequence() {
            self.mark_sequence_registered(&mut invoice).await?;
        }
        Ok(record)
    }

    async fn mark_sequence_registered(&self, invoice: &mut Invoice) -> Result<(), BillingError> {
        invoice.header.status = DocumentStatus::SequentialRegisteredError;
        self.store.update_invoice(invoice.clone())?;
        if let Some(number) = invoice.header.receipt_number {
            self.sequencer
                .advance_past(&invoice.header.receipt, number)
                .await?;
        }
        warn!(
            invoice = %invoice.id.0,
            receipt = %invoice.header.receipt,
            "sequence already registered at the SRI; counter advanced"
        );
        Ok(())
    }

    fn log_failure<D: Voucher>(
        &self,
        document: &D,
        failure: &PipelineFailure,
    ) -> Result<ReceiptErrorRecord, BillingError> {
        let header = document.header();
        let now = Utc::now();
        let record = ReceiptErrorRecord {
            id: next_id("rerr"),
            receipt: header.receipt.clone(),
            document: document.reference(),
            date: now.date_naive(),
            time: now.time(),
            environment: header.environment,
            receipt_number_full: header.receipt_number_full.clone(),
            stage: Some(failure.stage),
            errors: failure.errors_json(),
        };
        self.store.record_receipt_error(record.clone())?;
        warn!(
            receipt = %header.receipt,
            number = header.receipt_number_full.as_deref().unwrap_or_default(),
            stage = failure.stage.as_str(),
            error = %failure,
            "electronic document failed"
        );
        Ok(record)
    }

    /// Numbers the document from the lease and runs the pipeline. A duplicate-sequence
    /// rejection burns the number and the document is retried once under the next one.
    async fn authorize_document<D, F>(
        &self,
        company: &Company,
        lease: &mut ReceiptLease,
        document: &mut D,
        render: F,
    ) -> Result<Authorization, BillingError>
    where
        D: Voucher,
        F: Fn(&D, &AccessKey) -> quick_xml::Result<String>,
    {
        let mut renumbered = false;
        loop {
            document.header_mut().assign_number(lease.number());
            let key = match access_key_for(company, document.header()) {
                Ok(key) => key,
                Err(err) => {
                    let failure = PipelineFailure::new(VoucherStage::XmlCreation, err.to_string());
                    self.log_failure(document, &failure)?;
                    return Err(failure.into());
                }
            };
            document.header_mut().access_key = Some(key.to_string());
            let xml = match render(document, &key) {
                Ok(xml) => xml,
                Err(err) => {
                    let failure = PipelineFailure::new(VoucherStage::XmlCreation, err.to_string());
                    self.log_failure(document, &failure)?;
                    return Err(failure.into());
                }
            };

            match self
                .pipeline
                .run(company, document.header().environment, &xml, &key)
                .await
            {
                Ok(outcome) => return Ok(outcome.into()),
                Err(failure) => {
                    self.log_failure(document, &failure)?;
                    if failure.is_duplicate_sequence() && !renumbered {
                        renumbered = true;
                        self.sequencer.skip(lease)?;
                        continue;
                    }
                    return Err(failure.into());
                }
            }
        }
    }

    fn apply_stock(&self, lines: &[LineItem], sign: i64) -> Result<(), BillingError> {
        for line in lines.iter().filter(|line| line.is_inventoried) {
            self.store.adjust_stock(&line.product, sign * line.quantity)?;
        }
        Ok(())
    }

    fn open_receivable(&self, invoice: &Invoice) -> Result<DebtAccount, BillingError> {
        let day = invoice.header.issue_date;
        let account = DebtAccount::open(
            AccountId(next_id("acc")),
            invoice.header.company.clone(),
            AccountKind::Receivable,
            Counterparty::Customer(invoice.customer.clone()),
            invoice.id.0.clone(),
            day,
            day + Duration::days(i64::from(invoice.time_limit)),
            invoice.totals.total_amount,
        );
        Ok(self.store.insert_account(account)?)
    }
}

/// Validates payment terms and returns `(cash, change)`.
fn settle(
    request: &InvoiceRequest,
    customer: &Customer,
    total: Decimal,
) -> Result<(Decimal, Decimal), BillingError> {
    match request.payment_type {
        PaymentType::Credit => {
            if !customer.is_credit_authorized {
                return Err(BillingError::Invalid(format!(
                    "customer {} is not authorized for credit sales",
                    customer.names
                )));
            }
            if customer.credit_limit > Decimal::ZERO && total > customer.credit_limit {
                return Err(BillingError::Invalid(format!(
                    "total {total} exceeds credit limit {}",
                    customer.credit_limit
                )));
            }
            Ok((Decimal::ZERO, Decimal::ZERO))
        }
        PaymentType::Cash if request.cash > Decimal::ZERO => {
            if request.cash < total {
                return Err(BillingError::Invalid(format!(
                    "cash {} does not cover total {total}",
                    request.cash
                )));
            }
            Ok((request.cash, request.cash - total))
        }
        _ => Ok((total, Decimal::ZERO)),
    }
}
