use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use payment_lifecycle::application::engine::{LifecycleEngine, Stores};
use payment_lifecycle::config::{
    DEFAULT_TOPIC_AUTHORIZED, DEFAULT_TOPIC_CAPTURED, DEFAULT_TOPIC_REFUNDED, Topics,
};
use payment_lifecycle::domain::operation::AuthorizeRequest;
use payment_lifecycle::domain::ports::EventPublisher;
use payment_lifecycle::infrastructure::events::{JsonLinesEventPublisher, TracingEventPublisher};
use payment_lifecycle::interfaces::csv::batch::BatchRunner;
use payment_lifecycle::interfaces::csv::command_reader::CommandReader;
use payment_lifecycle::interfaces::json::response_writer::ResponseWriter;
use serde_json::json;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYMENTS_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Append published events to this file as JSON lines instead of logging them.
    #[arg(long, env = "PAYMENTS_EVENTS_FILE", global = true)]
    events_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_TOPIC_AUTHORIZED, global = true)]
    topic_authorized: String,

    #[arg(long, default_value = DEFAULT_TOPIC_CAPTURED, global = true)]
    topic_captured: String,

    #[arg(long, default_value = DEFAULT_TOPIC_REFUNDED, global = true)]
    topic_refunded: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place an authorization hold
    Authorize {
        #[arg(long)]
        amount_cents: i64,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        token: String,
        /// Synthesized as ORD-<n> when omitted
        #[arg(long)]
        order_id: Option<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Capture an authorized payment
    Capture {
        payment_id: String,
        #[arg(long)]
        amount_cents: i64,
    },
    /// Refund a captured payment in full
    Refund { payment_id: String },
    /// Show a payment and its refunds
    Show { payment_id: String },
    /// Run the commands of a CSV file in order
    Batch {
        /// CSV with header op,payment,order_id,amount_cents,currency,token,idempotency_key
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    let stores = open_stores(cli.db_path.as_ref())?;
    let publisher: Arc<dyn EventPublisher> = match &cli.events_file {
        Some(path) => Arc::new(
            JsonLinesEventPublisher::open(path)
                .await
                .into_diagnostic()?,
        ),
        None => Arc::new(TracingEventPublisher),
    };
    let topics = Topics {
        authorized: cli.topic_authorized,
        captured: cli.topic_captured,
        refunded: cli.topic_refunded,
    };
    let engine = LifecycleEngine::new(stores, publisher.clone()).with_topics(topics);

    let outcome = run(&engine, cli.command).await;

    // Flush the bus handle even when the command failed.
    if let Err(e) = publisher.close().await {
        tracing::warn!(error = %e, "Failed to close event publisher");
    }
    outcome
}

async fn run(engine: &LifecycleEngine, command: Commands) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = ResponseWriter::new(stdout.lock());

    match command {
        Commands::Authorize {
            amount_cents,
            currency,
            token,
            order_id,
            idempotency_key,
        } => {
            let resp = engine
                .authorize(AuthorizeRequest {
                    order_id,
                    amount_cents,
                    currency,
                    payment_method_token: token,
                    idempotency_key,
                })
                .await
                .into_diagnostic()?;
            writer.write(&resp).into_diagnostic()?;
        }
        Commands::Capture {
            payment_id,
            amount_cents,
        } => {
            let resp = engine
                .capture(&payment_id, amount_cents)
                .await
                .into_diagnostic()?;
            writer.write(&resp).into_diagnostic()?;
        }
        Commands::Refund { payment_id } => {
            let resp = engine.refund(&payment_id).await.into_diagnostic()?;
            writer.write(&resp).into_diagnostic()?;
        }
        Commands::Show { payment_id } => {
            let payment = engine.payment(&payment_id).await.into_diagnostic()?;
            let refunds = engine.refunds(&payment_id).await.into_diagnostic()?;
            writer
                .write(&json!({ "payment": payment, "refunds": refunds }))
                .into_diagnostic()?;
        }
        Commands::Batch { input } => {
            let file = File::open(input).into_diagnostic()?;
            let reader = CommandReader::new(file);
            let mut runner = BatchRunner::new(engine);
            for command in reader.commands() {
                match command {
                    Ok(command) => match runner.run(command).await {
                        Ok(outcome) => writer.write(&outcome).into_diagnostic()?,
                        Err(e) => eprintln!("Error processing command: {}", e),
                    },
                    Err(e) => eprintln!("Error reading command: {}", e),
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    use payment_lifecycle::infrastructure::rocksdb::RocksDBStore;

    let Some(db_path) = db_path else {
        return Ok(Stores::in_memory());
    };
    let store = RocksDBStore::open(db_path).into_diagnostic()?;
    tracing::debug!(path = %db_path.display(), "Opened RocksDB storage");
    Ok(Stores {
        payments: Box::new(store.clone()),
        idempotency: Box::new(store.clone()),
        sequence: Box::new(store),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Stores::in_memory())
}
