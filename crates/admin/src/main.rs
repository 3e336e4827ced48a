// admin/main.rs - scripts for initializing and checking the dominios_db schema

use clap::{Parser, Subcommand};
use database::{ensure, verify, MongoStore, SchemaStore, DOMAIN_SCHEMA};
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::{error, info, subscriber::set_global_default, warn};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Parser, Debug)]
#[clap(name = "admin")]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommands,
    #[arg(
        long,
        env = "DATABASE_URI",
        default_value = "mongodb://localhost:27017"
    )]
    database_uri: String,
    #[arg(long, env = "DATABASE_NAME", default_value = database::DATABASE_NAME)]
    database_name: String,
    /// Print the result as JSON instead of a summary line
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Create any missing collections and indexes
    #[clap(name = "init-db")]
    InitDatabase {
        /// Drop the database before creating the schema
        #[arg(long)]
        reset: bool,
    },
    /// Compare the database against the schema without changing it
    #[clap(name = "verify")]
    Verify,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse CLI args, using ENV vars if not provided
    let args = Args::parse();

    // Set up tracing
    // Adds log tracer as the default tracer for the log crate
    if let Err(e) = LogTracer::init() {
        eprintln!("Failed to set log tracer: {}", e);
    }
    // Set log level based on env variable
    let env_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(true);
    let subscriber = Registry::default().with(env_layer).with(fmt_layer);
    if let Err(e) = set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", e);
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, String> {
    // Create the store handle; the client connects lazily on first use
    let store = MongoStore::connect(&args.database_uri, &args.database_name)
        .await
        .map_err(|e| format!("Failed to connect to database: {}", e))?;

    match args.subcommand {
        Subcommands::InitDatabase { reset } => {
            if reset {
                warn!("Dropping database {}", store.database_name());
                store
                    .drop_database()
                    .await
                    .map_err(|e| format!("Failed to drop database: {}", e))?;
            }

            let report = ensure(&store, DOMAIN_SCHEMA)
                .await
                .map_err(|e| format!("Failed to initialize database: {}", e))?;

            if args.json {
                println!("{}", to_json(&report)?);
            } else {
                println!("{}", report);
            }
            Ok(ExitCode::SUCCESS)
        }
        Subcommands::Verify => {
            let drift = verify(&store, DOMAIN_SCHEMA)
                .await
                .map_err(|e| format!("Failed to verify database: {}", e))?;

            if args.json {
                println!("{}", to_json(&drift)?);
            } else {
                println!("{}", drift);
            }

            if drift.is_clean() {
                info!("Database {} matches the schema.", store.database_name());
                Ok(ExitCode::SUCCESS)
            } else {
                warn!("Database {} has drifted from the schema.", store.database_name());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))
}
