use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use incident_relay::infra::{PgPaymentLedger, PremiumAccessService};
use incident_relay::metrics::MetricsRegistry;

fn print_help() {
    eprintln!(
        "\
incident-relay-admin

USAGE:
  incident-relay-admin <command> [options]

COMMANDS:
  migrate                         Run database migrations
  grant-access                    Record a payment granting premium access
  check-access                    Show premium access for a wallet
  list-payments                   List recorded payments for a wallet
  prune-expired                   Delete payments whose window has ended

COMMON OPTIONS:
  --database-url <postgres_url>    (defaults to env DATABASE_URL)

grant-access OPTIONS:
  --address <wallet>              (required)
  --transaction-id <id>           (required)
  --amount <n>                    (default: 5)

check-access OPTIONS:
  --address <wallet>              (required)

list-payments OPTIONS:
  --address <wallet>              (required)

prune-expired OPTIONS:
  --dry-run                       Count expired payments without deleting
"
    );
}

fn require_database_url(database_url: Option<String>) -> anyhow::Result<String> {
    database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (or pass --database-url)"))
}

fn require_value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn require_arg(value: Option<String>, flag: &str) -> anyhow::Result<String> {
    value.ok_or_else(|| anyhow::anyhow!("{flag} is required"))
}

async fn connect(database_url: Option<String>) -> anyhow::Result<PgPool> {
    let database_url = require_database_url(database_url)?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    incident_relay::migrations::run_postgres(&pool).await?;
    Ok(pool)
}

fn access_service(pool: PgPool) -> PremiumAccessService {
    PremiumAccessService::new(
        Arc::new(PgPaymentLedger::new(pool)),
        Arc::new(MetricsRegistry::new()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    let mut database_url: Option<String> = None;
    let mut address: Option<String> = None;
    let mut transaction_id: Option<String> = None;
    let mut amount: Option<f64> = None;
    let mut dry_run = false;

    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--database-url" => database_url = Some(require_value(&mut args, "--database-url")?),
            "--address" if command != "migrate" && command != "prune-expired" => {
                address = Some(require_value(&mut args, "--address")?);
            }
            "--transaction-id" if command == "grant-access" => {
                transaction_id = Some(require_value(&mut args, "--transaction-id")?);
            }
            "--amount" if command == "grant-access" => {
                amount = Some(require_value(&mut args, "--amount")?.parse()?);
            }
            "--dry-run" if command == "prune-expired" => dry_run = true,
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    match command.as_str() {
        "migrate" => {
            connect(database_url).await?;
            println!("ok: migrations applied");
            Ok(())
        }
        "grant-access" => {
            let address = require_arg(address, "--address")?;
            let transaction_id = require_arg(transaction_id, "--transaction-id")?;
            let service = access_service(connect(database_url).await?);

            let (record, access) = service
                .record_payment(&address, &transaction_id, amount)
                .await?;
            println!(
                "ok: recorded payment {} for {} (amount {} {}, expires {})",
                record.id,
                record.address,
                record.amount,
                record.currency,
                record.expires_at.to_rfc3339()
            );
            println!("{}", serde_json::to_string(&access)?);
            Ok(())
        }
        "check-access" => {
            let address = require_arg(address, "--address")?;
            let service = access_service(connect(database_url).await?);
            let access = service.check_access(&address).await?;
            println!("{}", serde_json::to_string(&access)?);
            Ok(())
        }
        "list-payments" => {
            let address = require_arg(address, "--address")?;
            let service = access_service(connect(database_url).await?);
            let payments = service.payment_history(&address).await?;
            for payment in &payments {
                println!("{}", serde_json::to_string(payment)?);
            }
            eprintln!("{} payment(s)", payments.len());
            Ok(())
        }
        "prune-expired" => {
            let service = access_service(connect(database_url).await?);
            let count = service.prune_expired_at(Utc::now(), dry_run).await?;
            if dry_run {
                println!("dry-run: {count} expired payment(s) would be deleted");
            } else {
                println!("ok: deleted {count} expired payment(s)");
            }
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
