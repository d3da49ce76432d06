use crate::demo::{run_demo, DemoArgs};
use crate::server;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pos_billing::billing::access_key::random_numeric_code;
use pos_billing::billing::{AccessKey, AccessKeyParts, ReceiptNumber, VoucherType};
use pos_billing::catalog::choices::{EmissionType, EnvironmentType};
use pos_billing::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "POS Billing",
    about = "Run the point-of-sale billing service and its SRI tooling from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Build or inspect 49-digit SRI access keys
    AccessKey {
        #[command(subcommand)]
        command: AccessKeyCommand,
    },
    /// Issue invoices against the offline SRI gateway and walk through a duplicate sequence
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum AccessKeyCommand {
    /// Assemble a key from its fields
    Generate(GenerateKeyArgs),
    /// Validate a key and print its fields
    Parse {
        /// The 49-digit key
        key: String,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Register the demo tenant in the in-memory store on startup
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

#[derive(Args, Debug)]
pub(crate) struct GenerateKeyArgs {
    /// Issue date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) issue_date: NaiveDate,
    /// Voucher type, as SRI code (01) or name (invoice)
    #[arg(long, default_value = "invoice", value_parser = parse_voucher_type)]
    pub(crate) voucher_type: VoucherType,
    /// Issuer RUC (13 digits)
    #[arg(long)]
    pub(crate) ruc: String,
    /// Send to the production environment instead of test
    #[arg(long)]
    pub(crate) production: bool,
    #[arg(long, default_value = "001")]
    pub(crate) establishment: String,
    #[arg(long, default_value = "001")]
    pub(crate) issuing_point: String,
    /// Sequential number of the voucher
    #[arg(long)]
    pub(crate) sequence: u64,
    /// Eight-digit numeric code; random when omitted
    #[arg(long)]
    pub(crate) numeric_code: Option<String>,
}

fn parse_voucher_type(raw: &str) -> Result<VoucherType, String> {
    VoucherType::parse(raw.trim()).ok_or_else(|| format!("unknown voucher type '{raw}'"))
}

fn generate_key(args: GenerateKeyArgs) -> Result<AccessKey, AppError> {
    let parts = AccessKeyParts {
        issue_date: args.issue_date,
        voucher_type: args.voucher_type,
        ruc: args.ruc,
        environment: if args.production {
            EnvironmentType::Production
        } else {
            EnvironmentType::Test
        },
        establishment_code: args.establishment,
        issuing_point_code: args.issuing_point,
        sequence: ReceiptNumber(args.sequence),
        numeric_code: args.numeric_code.unwrap_or_else(random_numeric_code),
        emission_type: EmissionType::Normal,
    };
    Ok(AccessKey::generate(&parts)?)
}

fn describe_key(raw: &str) -> Result<Vec<(&'static str, String)>, AppError> {
    let (key, parts) = AccessKey::parse(raw)?;
    Ok(vec![
        ("access_key", key.into_string()),
        ("issue_date", parts.issue_date.to_string()),
        (
            "voucher_type",
            format!("{} ({})", parts.voucher_type.code(), parts.voucher_type.label()),
        ),
        ("ruc", parts.ruc),
        ("environment", format!("{:?}", parts.environment)),
        (
            "receipt",
            format!(
                "{}-{}-{}",
                parts.establishment_code, parts.issuing_point_code, parts.sequence
            ),
        ),
        ("numeric_code", parts.numeric_code),
    ])
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::AccessKey {
            command: AccessKeyCommand::Generate(args),
        } => {
            println!("{}", generate_key(args)?.as_str());
            Ok(())
        }
        Command::AccessKey {
            command: AccessKeyCommand::Parse { key },
        } => {
            for (field, value) in describe_key(&key)? {
                println!("{field:>13}: {value}");
            }
            Ok(())
        }
        Command::Demo(args) => run_demo(args).await,
    }
}
