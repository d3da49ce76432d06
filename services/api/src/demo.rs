use chrono::{Local, NaiveDate};
use clap::Args;
use pos_billing::billing::sri::OfflineSriGateway;
use pos_billing::billing::{
    AuthorizationPipeline, BillingError, BillingService, CreditNoteRequest, DigestSigner, Invoice,
    InvoiceRequest, LineRequest, PipelineConfig, ReceiptSequencer, VoucherType,
};
use pos_billing::catalog::choices::{EnvironmentType, PaymentMethod, PaymentType};
use pos_billing::catalog::{
    CatalogRepository, CatalogService, Company, CompanyId, Customer, CustomerId, Product,
    ProductId, UserId,
};
use pos_billing::error::AppError;
use pos_billing::store::InMemoryStore;
use pos_billing::subscription::{Plan, PlanId, Subscription, SubscriptionId, SubscriptionRepository};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const DEMO_COMPANY: &str = "cmp-demo";
const DEMO_CUSTOMER: &str = "cus-demo";
const DEMO_PRODUCT: &str = "prd-cafe";
const DEMO_SERVICE: &str = "prd-molienda";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Issue date for the demo vouchers (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) issue_date: Option<NaiveDate>,
    /// Number of invoices issued before the duplicate-sequence walkthrough.
    #[arg(long, default_value_t = 2)]
    pub(crate) invoices: u32,
    /// Skip the duplicate-sequence walkthrough.
    #[arg(long)]
    pub(crate) skip_duplicate: bool,
}

fn demo_company() -> Company {
    Company {
        id: CompanyId(DEMO_COMPANY.to_string()),
        owner: Some(UserId("usr-demo".to_string())),
        ruc: "1790012345001".to_string(),
        company_name: "Tostadores del Valle S.A.".to_string(),
        commercial_name: "Café del Valle".to_string(),
        main_address: "Av. Amazonas N34-12, Quito".to_string(),
        establishment_address: "Av. Amazonas N34-12, Quito".to_string(),
        establishment_code: "001".to_string(),
        issuing_point_code: "001".to_string(),
        special_taxpayer: "000".to_string(),
        obligated_accounting: false,
        environment: EnvironmentType::Test,
        emission_type: Default::default(),
        retention_agent: false,
        regime: Default::default(),
        tax_percentage: Default::default(),
        email: "facturacion@cafedelvalle.ec".to_string(),
        mobile: Some("0991234567".to_string()),
        signature_key: Some("firma-demo".to_string()),
    }
}

/// Registers the demo tenant: an unlimited plan, its subscription, the company with its
/// receipts, one customer and two products.
pub(crate) fn seed_demo_tenant(
    store: &Arc<InMemoryStore>,
    sequencer: &Arc<ReceiptSequencer<InMemoryStore>>,
) -> Result<CompanyId, AppError> {
    let plan = Plan {
        id: PlanId("pln-demo".to_string()),
        name: "Demo".to_string(),
        description: Some("Plan sin límites para demostraciones".to_string()),
        max_invoices: 0,
        max_customers: 0,
        max_products: 0,
        price: Decimal::ZERO,
        period_days: 30,
        active: true,
    };
    store.save_plan(plan.clone())?;
    store.save_subscription(Subscription::start(
        SubscriptionId("sub-demo".to_string()),
        UserId("usr-demo".to_string()),
        &plan,
        Local::now().date_naive(),
    ))?;

    let catalog = CatalogService::new(store.clone(), sequencer.clone());
    let company = catalog.register_company(demo_company())?;
    catalog.register_customer(Customer {
        id: CustomerId(DEMO_CUSTOMER.to_string()),
        company: company.id.clone(),
        names: "María Fernanda Cevallos".to_string(),
        ruc: None,
        dni: Some("1712345678".to_string()),
        email: Some("mfcevallos@example.ec".to_string()),
        mobile: Some("0987654321".to_string()),
        address: Some("Calle Larga 5-10, Cuenca".to_string()),
        is_credit_authorized: true,
        credit_limit: Decimal::new(50000, 2),
    })?;
    catalog.register_product(Product {
        id: ProductId(DEMO_PRODUCT.to_string()),
        company: company.id.clone(),
        category: None,
        code: "CAF-500".to_string(),
        name: "Café tostado 500g".to_string(),
        price: Decimal::new(420, 2),
        pvp: Decimal::new(650, 2),
        has_tax: true,
        is_inventoried: true,
        stock: 50,
    })?;
    catalog.register_product(Product {
        id: ProductId(DEMO_SERVICE.to_string()),
        company: company.id.clone(),
        category: None,
        code: "SRV-MOL".to_string(),
        name: "Servicio de molienda".to_string(),
        price: Decimal::ZERO,
        pvp: Decimal::new(100, 2),
        has_tax: false,
        is_inventoried: false,
        stock: 0,
    })?;
    Ok(company.id)
}

fn sale(company: &CompanyId, issue_date: NaiveDate, quantity: i64) -> InvoiceRequest {
    InvoiceRequest {
        company: company.clone(),
        customer: CustomerId(DEMO_CUSTOMER.to_string()),
        voucher_type: VoucherType::Invoice,
        payment_type: PaymentType::Cash,
        payment_method: PaymentMethod::WithoutFinancialSystem,
        time_limit: 0,
        cash: Decimal::ZERO,
        is_draft: false,
        issue_date: Some(issue_date),
        additional_info: Default::default(),
        lines: vec![
            LineRequest {
                product: ProductId(DEMO_PRODUCT.to_string()),
                quantity,
                discount: Decimal::ZERO,
            },
            LineRequest {
                product: ProductId(DEMO_SERVICE.to_string()),
                quantity: 1,
                discount: Decimal::ZERO,
            },
        ],
    }
}

fn render_invoice(invoice: &Invoice) {
    println!(
        "- {} {} | total {} | status {:?}",
        invoice.header.voucher_type().label(),
        invoice.header.receipt_number_full.as_deref().unwrap_or("(sin número)"),
        invoice.totals.total_amount,
        invoice.header.status,
    );
    if let Some(key) = invoice.header.access_key.as_deref() {
        println!("  Clave de acceso: {key}");
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        issue_date,
        invoices,
        skip_duplicate,
    } = args;
    let issue_date = issue_date.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(InMemoryStore::new());
    let sequencer = Arc::new(ReceiptSequencer::new(store.clone()));
    let company = seed_demo_tenant(&store, &sequencer)?;

    let gateway = Arc::new(OfflineSriGateway::new());
    let pipeline = AuthorizationPipeline::new(
        gateway.clone(),
        Arc::new(DigestSigner),
        PipelineConfig {
            attempts: 1,
            retry_delay: Duration::ZERO,
        },
    );
    let billing = BillingService::new(store.clone(), sequencer, pipeline);

    println!("Electronic invoicing demo ({} on {issue_date})", company.0);
    let mut issued = Vec::new();
    for round in 0..invoices {
        let invoice = billing
            .create_invoice(sale(&company, issue_date, i64::from(round) + 1))
            .await?;
        render_invoice(&invoice);
        issued.push(invoice);
    }

    if !skip_duplicate {
        let next = billing.next_receipt_number(&company, VoucherType::Invoice)?;
        let profile = demo_company();
        gateway.preregister(
            profile.environment,
            &profile.ruc,
            VoucherType::Invoice,
            &next.establishment_code,
            &next.issuing_point_code,
            next.number,
        )?;
        println!(
            "\nSequence {} already registered at the SRI; issuing again",
            next.full_number
        );
        match billing.create_invoice(sale(&company, issue_date, 1)).await {
            Ok(invoice) => {
                render_invoice(&invoice);
                issued.push(invoice);
            }
            Err(BillingError::Authorization(failure)) => {
                println!("  Rejected at {}: {failure}", failure.stage.as_str());
            }
            Err(err) => return Err(err.into()),
        }
        let errors = billing.receipt_errors(&company)?;
        println!("  Receipt error log entries: {}", errors.len());
        for record in &errors {
            println!(
                "    - {} {}",
                record.receipt_number_full.as_deref().unwrap_or("-"),
                record.errors
            );
        }
    }

    if let Some(first) = issued.first() {
        let note = billing
            .create_credit_note(&first.id, CreditNoteRequest::default())
            .await?;
        println!(
            "\nCredit note {} cancels {}",
            note.header.receipt_number_full.as_deref().unwrap_or("-"),
            first.header.receipt_number_full.as_deref().unwrap_or("-"),
        );
    }

    let stock = store
        .product(&ProductId(DEMO_PRODUCT.to_string()))?
        .map(|product| product.stock)
        .unwrap_or_default();
    println!("\nRemaining stock for {DEMO_PRODUCT}: {stock}");
    Ok(())
}
