//! Steeltrack CLI
//!
//! Command-line interface over a steeltrack inventory database: schema status, access-code
//! setup, CSV imports, balances and encryption maintenance.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process;

use steeltrack::balance::{balance, total_sold};
use steeltrack::metrics::METRICS;
use steeltrack::{import, ImportKind, Session, Store, StoreConfig};

#[derive(Parser)]
#[command(name = "steeltrack")]
#[command(about = "Inventory ledger for steel stock lots and sales")]
#[command(version)]
struct Cli {
    /// Configuration file (section `[store]`)
    #[arg(long, default_value = "config/config.toml")]
    config: String,

    /// Database file, overriding the configuration
    #[arg(long)]
    database: Option<String>,

    /// Access code; prefer the environment variable over the command line
    #[arg(long, env = "STEELTRACK_ACCESS_CODE", hide_env_values = true)]
    access_code: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show schema migration status (applied vs pending)
    Status,

    /// Register the access code of a new database
    Setup,

    /// Import a CSV file
    Import {
        #[arg(value_enum)]
        kind: ImportArg,

        /// CSV file to read
        file: PathBuf,
    },

    /// Show weight, sold quantity and balance of a lot
    Balance {
        /// Serial number of the lot
        serial: String,
    },

    /// Report whether stored sensitive values are encrypted
    EncryptionStatus,

    /// Encrypt every sensitive value still stored as plaintext
    EncryptLegacy,

    /// Re-encrypt everything under a new access code
    Rekey {
        /// The new access code
        #[arg(long, env = "STEELTRACK_NEW_ACCESS_CODE", hide_env_values = true)]
        new_code: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportArg {
    Inventory,
    Sales,
    Combined,
}

impl From<ImportArg> for ImportKind {
    fn from(arg: ImportArg) -> Self {
        match arg {
            ImportArg::Inventory => ImportKind::Inventory,
            ImportArg::Sales => ImportKind::Sales,
            ImportArg::Combined => ImportKind::Combined,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Access code not provided. Use --access-code or set STEELTRACK_ACCESS_CODE")]
    MissingAccessCode,

    #[error("No stock lot with serial number \"{0}\"")]
    UnknownSerial(String),
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    #[cfg(feature = "tracing")]
    if cli.verbose {
        steeltrack::metrics::tracing_helpers::init_fmt_subscriber();
    }

    let result = run(&cli);
    if cli.verbose {
        let snap = METRICS.snapshot();
        eprintln!(
            "{} queries ({} failed) in {:?}, {} decrypt fallback(s), {} row(s) imported",
            snap.queries_total, snap.query_errors_total, snap.query_time, snap.decrypt_fallbacks_total,
            snap.rows_imported_total
        );
    }

    match result {
        Ok(()) => {
            if !cli.quiet {
                println!("{}", "✅ Success".green());
            }
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{} {e:#}", "❌ Error:".red());
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = StoreConfig::load_from(&cli.config).context("loading configuration")?;
    if let Some(path) = &cli.database {
        config = config.with_path(path.clone());
    }
    let store = Store::open(config).context("opening the database")?;
    report_deferred(&store);

    match &cli.command {
        Commands::Status => handle_status(&store),
        Commands::Setup => {
            let code = access_code(cli)?;
            store.register_access_code(code)?;
            println!("Access code registered");
            Ok(())
        }
        Commands::Import { kind, file } => {
            let session = store.login(access_code(cli)?)?;
            handle_import(&session, (*kind).into(), file)
        }
        Commands::Balance { serial } => handle_balance(&store.login(access_code(cli)?)?, serial),
        Commands::EncryptionStatus => handle_encryption_status(&store.login(access_code(cli)?)?),
        Commands::EncryptLegacy => {
            let session = store.login(access_code(cli)?)?;
            let report = session.repository().encrypt_legacy_rows()?;
            println!(
                "Encrypted {} value(s) in {} stock lot(s) and {} sale(s)",
                report.values_encrypted, report.stock_lots_updated, report.sales_updated
            );
            Ok(())
        }
        Commands::Rekey { new_code } => {
            let mut session = store.login(access_code(cli)?)?;
            let resealed = session.rekey(new_code)?;
            println!("Access code changed, {resealed} value(s) re-encrypted");
            Ok(())
        }
    }
}

fn access_code(cli: &Cli) -> Result<&str, CliError> {
    cli.access_code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or(CliError::MissingAccessCode)
}

fn report_deferred(store: &Store) {
    for (version, name, error) in &store.migration_report().deferred {
        eprintln!(
            "{} migration m{version}_{name} was rolled back and will be retried: {error}",
            "⚠️".yellow()
        );
    }
}

fn handle_status(store: &Store) -> anyhow::Result<()> {
    let status = store.migration_status()?;

    println!("\n📊 Migration Status\n");

    if !status.applied.is_empty() {
        println!("✅ Applied Migrations ({}):", status.applied_count);
        for record in &status.applied {
            let time_str = record
                .execution_time_ms
                .map(|ms| format!("{ms}ms"))
                .unwrap_or_else(|| "N/A".to_string());
            println!(
                "  ✓ m{}_{} ({}, {})",
                record.version,
                record.name,
                record.applied_at.format("%Y-%m-%d %H:%M:%S"),
                time_str
            );
        }
    } else {
        println!("✅ Applied Migrations: None");
    }

    println!();

    if !status.pending.is_empty() {
        println!("⏳ Pending Migrations ({}):", status.pending_count);
        for pending in &status.pending {
            let note = if pending.fatal { "pending" } else { "pending, non-fatal" };
            println!("  ⏳ m{}_{} ({note})", pending.version, pending.name);
        }
    } else {
        println!("⏳ Pending Migrations: None");
    }

    println!(
        "\n📈 Summary: {} applied, {} pending, access code {}",
        status.applied_count,
        status.pending_count,
        if store.is_registered()? { "registered" } else { "not registered" }
    );
    Ok(())
}

fn handle_import(session: &Session, kind: ImportKind, file: &PathBuf) -> anyhow::Result<()> {
    let outcome = import::import_file(&session.repository(), kind, file)?;
    println!("\n📥 {kind} import of {}\n", file.display());
    println!("  {outcome}");
    if !outcome.messages.is_empty() {
        println!();
        for message in &outcome.messages {
            println!("  • {message}");
        }
    }
    Ok(())
}

fn handle_balance(session: &Session, serial: &str) -> anyhow::Result<()> {
    let repo = session.repository();
    let lot = repo
        .find_by_serial(serial)?
        .ok_or_else(|| CliError::UnknownSerial(serial.to_string()))?;
    let sold = total_sold(repo.executor(), repo.crypto(), lot.id)?;
    let remaining = balance(lot.weight, sold);

    println!("\n⚖️  Lot {} ({}, {} {})\n", lot.serial_number, lot.lot_code, lot.steel_type, lot.quality);
    println!("  Weight:  {}", lot.weight);
    println!("  Sold:    {sold}");
    let line = format!("  Balance: {remaining}");
    if remaining.is_zero() {
        println!("{}", line.yellow());
    } else {
        println!("{line}");
    }
    for sale in repo.sales_for_lot(lot.id)? {
        println!(
            "  {} {} to {}{}",
            sale.sale_date,
            sale.quantity_sold,
            sale.customer_name,
            sale.form.map(|f| format!(" ({f})")).unwrap_or_default()
        );
    }
    Ok(())
}

fn handle_encryption_status(session: &Session) -> anyhow::Result<()> {
    let status = session.repository().encryption_status()?;
    println!("\n🔐 Encryption Status\n");
    for (label, sample, total) in [
        ("Stock lots", status.stock_lots, status.total_stock_lots),
        ("Sales", status.sales, status.total_sales),
    ] {
        println!(
            "  {label}: {total} row(s), sample has encrypted={} plaintext={}",
            sample.has_encrypted, sample.has_plaintext
        );
    }
    if status.is_fully_encrypted() {
        println!("\n{}", "All sampled values are encrypted".green());
    } else {
        println!("\n{}", "Plaintext values found; run `steeltrack encrypt-legacy`".yellow());
    }
    Ok(())
}
