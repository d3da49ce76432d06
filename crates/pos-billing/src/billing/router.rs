use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::document::InvoiceId;
use super::lines::LineError;
use super::receipt::{SequencerError, VoucherType};
use super::service::{
    BillingError, BillingService, CreditNoteRequest, InvoiceRequest, QuotationInvoiceRequest,
};
use super::sri::SriGateway;
use crate::catalog::CompanyId;
use crate::quotation::{QuotationError, QuotationId};
use crate::store::{BillingStore, RepositoryError};
use crate::subscription::{QuotaError, QuotaKind};

/// HTTP surface of the billing service.
pub fn billing_router<S, G>(service: Arc<BillingService<S, G>>) -> Router
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/invoices", post(create_invoice_handler::<S, G>))
        .route("/api/v1/invoices/:invoice_id", get(invoice_handler::<S, G>))
        .route("/api/v1/invoices/:invoice_id/emit", post(emit_handler::<S, G>))
        .route(
            "/api/v1/invoices/:invoice_id/credit-notes",
            post(credit_note_handler::<S, G>),
        )
        .route(
            "/api/v1/quotations/:quotation_id/invoice",
            post(quotation_invoice_handler::<S, G>),
        )
        .route(
            "/api/v1/companies/:company_id/receipts/:voucher_type/next",
            get(next_receipt_handler::<S, G>),
        )
        .route(
            "/api/v1/companies/:company_id/quota/:kind",
            get(quota_handler::<S, G>),
        )
        .route(
            "/api/v1/companies/:company_id/receipt-errors",
            get(receipt_errors_handler::<S, G>),
        )
        .with_state(service)
}

impl BillingError {
    pub fn status(&self) -> StatusCode {
        match self {
            BillingError::UnknownCompany(_)
            | BillingError::UnknownCustomer(_)
            | BillingError::UnknownInvoice(_)
            | BillingError::Repository(RepositoryError::NotFound)
            | BillingError::Quotation(QuotationError::Repository(RepositoryError::NotFound))
            | BillingError::Sequencer(SequencerError::UnknownReceipt(_)) => StatusCode::NOT_FOUND,
            BillingError::Quota(QuotaError::Exceeded(_)) => StatusCode::FORBIDDEN,
            BillingError::AlreadyAuthorized(_)
            | BillingError::Quotation(QuotationError::Inactive(_))
            | BillingError::Sequencer(SequencerError::Exhausted(_))
            | BillingError::Sequencer(SequencerError::Repository(RepositoryError::Stale { .. }))
            | BillingError::Repository(RepositoryError::Conflict)
            | BillingError::Repository(RepositoryError::Stale { .. }) => StatusCode::CONFLICT,
            BillingError::Invalid(_)
            | BillingError::NotAuthorized(_)
            | BillingError::Quotation(QuotationError::Lines(_))
            | BillingError::Lines(LineError::Empty)
            | BillingError::Lines(LineError::UnknownProduct(_))
            | BillingError::Lines(LineError::InvalidQuantity(_))
            | BillingError::Lines(LineError::InvalidDiscount(_))
            | BillingError::Lines(LineError::InsufficientStock { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BillingError::Authorization(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let status = self.status();
        let payload = match &self {
            BillingError::Authorization(failure) => json!({
                "error": self.to_string(),
                "stage": failure.stage.as_str(),
                "duplicate_sequence": failure.is_duplicate_sequence(),
                "messages": failure.messages,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, axum::Json(payload)).into_response()
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, axum::Json(json!({ "error": message }))).into_response()
}

pub(crate) async fn create_invoice_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    axum::Json(request): axum::Json<InvoiceRequest>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    match service.create_invoice(request).await {
        Ok(invoice) => (StatusCode::CREATED, axum::Json(invoice)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn invoice_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path(invoice_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    match service.invoice(&InvoiceId(invoice_id)) {
        Ok(invoice) => (StatusCode::OK, axum::Json(invoice)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn emit_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path(invoice_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    match service.emit_invoice(&InvoiceId(invoice_id)).await {
        Ok(invoice) => (StatusCode::OK, axum::Json(invoice)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn credit_note_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path(invoice_id): Path<String>,
    request: Option<axum::Json<CreditNoteRequest>>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    let request = request.map(|axum::Json(body)| body).unwrap_or_default();
    match service
        .create_credit_note(&InvoiceId(invoice_id), request)
        .await
    {
        Ok(note) => (StatusCode::CREATED, axum::Json(note)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn quotation_invoice_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path(quotation_id): Path<String>,
    request: Option<axum::Json<QuotationInvoiceRequest>>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    let request = request.map(|axum::Json(body)| body).unwrap_or_default();
    match service
        .invoice_quotation(&QuotationId(quotation_id), request)
        .await
    {
        Ok(invoice) => (StatusCode::CREATED, axum::Json(invoice)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn next_receipt_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path((company_id, voucher_type)): Path<(String, String)>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    let Some(voucher_type) = VoucherType::parse(&voucher_type) else {
        return bad_request(format!("unknown voucher type '{voucher_type}'"));
    };
    match service.next_receipt_number(&CompanyId(company_id), voucher_type) {
        Ok(next) => (StatusCode::OK, axum::Json(next)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn quota_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path((company_id, kind)): Path<(String, String)>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    let Some(kind) = QuotaKind::parse(&kind) else {
        return bad_request(format!("unknown quota kind '{kind}'"));
    };
    match service.quota_check(&CompanyId(company_id), kind) {
        Ok(check) => (StatusCode::OK, axum::Json(check)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn receipt_errors_handler<S, G>(
    State(service): State<Arc<BillingService<S, G>>>,
    Path(company_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
    G: SriGateway + ?Sized + 'static,
{
    match service.receipt_errors(&CompanyId(company_id)) {
        Ok(records) => {
            let payload = json!({
                "count": records.len(),
                "errors": records,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
