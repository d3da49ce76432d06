use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{Duration as Days, NaiveDate};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::billing::lines::LineRequest;
use crate::billing::pipeline::{AuthorizationPipeline, PipelineConfig};
use crate::billing::receipt::{ReceiptKey, ReceiptSequencer, VoucherType};
use crate::billing::service::{BillingService, InvoiceRequest};
use crate::billing::signer::DigestSigner;
use crate::billing::sri::{
    AuthorizationResponse, AuthorizationState, GatewayError, ReceptionResponse, ReceptionState,
    SriGateway, SriMessage, DUPLICATE_SEQUENCE_MESSAGE,
};
use crate::catalog::choices::{EnvironmentType, PaymentMethod, PaymentType};
use crate::catalog::service::today;
use crate::catalog::{CatalogRepository, Company, CompanyId, Customer, CustomerId, Product, ProductId, UserId};
use crate::store::InMemoryStore;
use crate::subscription::{Plan, PlanId, Subscription, SubscriptionId, SubscriptionRepository};

pub(super) type TestService = BillingService<InMemoryStore, ScriptedGateway>;

pub(super) fn company_id() -> CompanyId {
    CompanyId("cmp-andina".to_string())
}

pub(super) fn company() -> Company {
    Company {
        id: company_id(),
        owner: Some(UserId("usr-owner".to_string())),
        ruc: "1790012345001".to_string(),
        company_name: "Comercial Andina S.A.".to_string(),
        commercial_name: "Andina & Hijos".to_string(),
        main_address: "Av. 10 de Agosto N24-12, Quito".to_string(),
        establishment_address: "Av. Amazonas N34-45, Quito".to_string(),
        establishment_code: "001".to_string(),
        issuing_point_code: "002".to_string(),
        special_taxpayer: "000".to_string(),
        obligated_accounting: true,
        environment: EnvironmentType::Test,
        emission_type: Default::default(),
        retention_agent: false,
        regime: Default::default(),
        tax_percentage: Default::default(),
        email: "facturacion@andina.ec".to_string(),
        mobile: Some("0991234567".to_string()),
        signature_key: Some("firma-electronica".to_string()),
    }
}

pub(super) fn customer() -> Customer {
    Customer {
        id: CustomerId("cus-perez".to_string()),
        company: company_id(),
        names: "Juan Pérez".to_string(),
        ruc: None,
        dni: Some("1712345678".to_string()),
        email: Some("juan@example.ec".to_string()),
        mobile: Some("0987654321".to_string()),
        address: Some("Calle Larga 5-10, Cuenca".to_string()),
        is_credit_authorized: true,
        credit_limit: Decimal::ZERO,
    }
}

/// Taxed and inventoried, 10.00 each, 10 in stock.
pub(super) fn taxed_product() -> Product {
    Product {
        id: ProductId("prd-arroz".to_string()),
        company: company_id(),
        category: None,
        code: "ARZ-001".to_string(),
        name: "Arroz 5kg".to_string(),
        price: Decimal::new(700, 2),
        pvp: Decimal::new(1000, 2),
        has_tax: true,
        is_inventoried: true,
        stock: 10,
    }
}

/// Untaxed service, 5.00, not inventoried.
pub(super) fn service_product() -> Product {
    Product {
        id: ProductId("prd-entrega".to_string()),
        company: company_id(),
        category: None,
        code: "SRV-001".to_string(),
        name: "Entrega a domicilio".to_string(),
        price: Decimal::ZERO,
        pvp: Decimal::new(500, 2),
        has_tax: false,
        is_inventoried: false,
        stock: 0,
    }
}

pub(super) fn plan(max_invoices: u32) -> Plan {
    Plan {
        id: PlanId("pln-basico".to_string()),
        name: "Básico".to_string(),
        description: None,
        max_invoices,
        max_customers: 0,
        max_products: 0,
        price: Decimal::new(1500, 2),
        period_days: 30,
        active: true,
    }
}

pub(super) fn subscribe(store: &InMemoryStore, max_invoices: u32) {
    let plan = plan(max_invoices);
    store.save_plan(plan.clone()).expect("plan saved");
    let subscription = Subscription::start(
        SubscriptionId("sub-1".to_string()),
        UserId("usr-owner".to_string()),
        &plan,
        today() - Days::days(1),
    );
    store.save_subscription(subscription).expect("subscription saved");
}

/// Company with zeroed receipts, one customer and two products. No subscription.
pub(super) fn bare_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let company = company();
    store.save_company(company.clone()).expect("company saved");
    ReceiptSequencer::new(store.clone())
        .ensure_receipts(&company)
        .expect("receipts seeded");
    store.insert_customer(customer()).expect("customer saved");
    store.insert_product(taxed_product()).expect("product saved");
    store.insert_product(service_product()).expect("product saved");
    store
}

/// [`bare_store`] plus an unlimited subscription.
pub(super) fn seeded_store() -> Arc<InMemoryStore> {
    let store = bare_store();
    subscribe(&store, 0);
    store
}

pub(super) fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        attempts: 3,
        retry_delay: Duration::ZERO,
    }
}

pub(super) fn build_service(
    store: Arc<InMemoryStore>,
    gateway: Arc<ScriptedGateway>,
) -> TestService {
    let sequencer = Arc::new(ReceiptSequencer::new(store.clone()));
    let pipeline = AuthorizationPipeline::new(gateway, Arc::new(DigestSigner), pipeline_config());
    BillingService::new(store, sequencer, pipeline)
}

pub(super) fn receipt_key(voucher_type: VoucherType) -> ReceiptKey {
    ReceiptKey::for_company(&company(), voucher_type)
}

pub(super) fn invoice_request() -> InvoiceRequest {
    InvoiceRequest {
        company: company_id(),
        customer: customer().id,
        voucher_type: VoucherType::Invoice,
        payment_type: PaymentType::Cash,
        payment_method: PaymentMethod::WithoutFinancialSystem,
        time_limit: 0,
        cash: Decimal::ZERO,
        is_draft: false,
        issue_date: NaiveDate::from_ymd_opt(2025, 3, 14),
        additional_info: Default::default(),
        lines: vec![
            LineRequest {
                product: taxed_product().id,
                quantity: 2,
                discount: Decimal::ZERO,
            },
            LineRequest {
                product: service_product().id,
                quantity: 1,
                discount: Decimal::ZERO,
            },
        ],
    }
}

pub(super) fn message(identifier: &str, text: &str) -> SriMessage {
    SriMessage {
        identifier: identifier.to_string(),
        message: text.to_string(),
        additional_info: None,
        kind: "ERROR".to_string(),
    }
}

pub(super) fn received() -> ReceptionResponse {
    ReceptionResponse {
        state: ReceptionState::Received,
        messages: Vec::new(),
    }
}

pub(super) fn duplicate_sequence() -> ReceptionResponse {
    ReceptionResponse {
        state: ReceptionState::Returned,
        messages: vec![message("45", DUPLICATE_SEQUENCE_MESSAGE)],
    }
}

pub(super) fn verdict(state: AuthorizationState) -> AuthorizationResponse {
    AuthorizationResponse {
        state,
        authorization_number: None,
        authorized_at: None,
        document: None,
        messages: match state {
            AuthorizationState::Rejected => vec![message("56", "ERROR ESTABLECIMIENTO CERRADO")],
            _ => Vec::new(),
        },
    }
}

/// Gateway replaying queued responses. With an empty queue every document is received and
/// authorized under its access key.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    receptions: Mutex<VecDeque<Result<ReceptionResponse, GatewayError>>>,
    authorizations: Mutex<VecDeque<Result<AuthorizationResponse, GatewayError>>>,
    submitted: Mutex<Vec<String>>,
    validate_calls: AtomicUsize,
    authorize_calls: AtomicUsize,
    yielding: bool,
}

impl ScriptedGateway {
    /// Gives other tasks a turn before every answer, so joined futures interleave at the SRI.
    pub(super) fn yielding() -> Self {
        Self {
            yielding: true,
            ..Self::default()
        }
    }

    pub(super) fn push_reception(&self, response: Result<ReceptionResponse, GatewayError>) {
        self.receptions.lock().expect("gateway mutex").push_back(response);
    }

    pub(super) fn push_authorization(&self, response: Result<AuthorizationResponse, GatewayError>) {
        self.authorizations
            .lock()
            .expect("gateway mutex")
            .push_back(response);
    }

    pub(super) fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub(super) fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub(super) fn submitted(&self) -> Vec<String> {
        self.submitted.lock().expect("gateway mutex").clone()
    }
}

#[async_trait]
impl SriGateway for ScriptedGateway {
    async fn validate(
        &self,
        _environment: EnvironmentType,
        signed_xml: &str,
    ) -> Result<ReceptionResponse, GatewayError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.submitted
            .lock()
            .expect("gateway mutex")
            .push(signed_xml.to_string());
        self.receptions
            .lock()
            .expect("gateway mutex")
            .pop_front()
            .unwrap_or_else(|| Ok(received()))
    }

    async fn authorize(
        &self,
        _environment: EnvironmentType,
        access_key: &str,
    ) -> Result<AuthorizationResponse, GatewayError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.yielding {
            tokio::task::yield_now().await;
        }
        let scripted = self.authorizations.lock().expect("gateway mutex").pop_front();
        scripted.unwrap_or_else(|| {
            Ok(AuthorizationResponse {
                state: AuthorizationState::Authorized,
                authorization_number: Some(access_key.to_string()),
                authorized_at: None,
                document: None,
                messages: Vec::new(),
            })
        })
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
