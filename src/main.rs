//! Dynamo Provisioner
//!
//! Makes sure a composite-key DynamoDB table exists, then writes one contact
//! and reads it back by key and by range query.
//!
//! Usage:
//!   cargo run
//!
//! Against real DynamoDB with the default credential chain:
//!   DYNAMODB_ENDPOINT_URL= cargo run -- --default-credentials

use anyhow::{Context, Result};
use clap::Parser;
use dynamo_provisioner::{
    config::{create_dynamodb_client, LogFormat, Settings},
    db::{Contact, DynamoDbStore, InMemoryStore, TableStore},
    demo,
    logging::init_tracing,
    provisioner::TableProvisioner,
};
use std::io;

/// Dynamo Provisioner
///
/// Provisions a table keyed by `id` (string) and `date` (number) and runs a
/// put / get / range-query round trip against it.
#[derive(Parser, Debug)]
#[command(name = "dynamo-provisioner")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Table name (overrides DYNAMODB_TABLE_NAME env var)
    #[arg(short, long)]
    table: Option<String>,

    /// DynamoDB endpoint URL; pass an empty string to use the regional endpoint
    /// (overrides DYNAMODB_ENDPOINT_URL env var)
    #[arg(long)]
    endpoint_url: Option<String>,

    /// AWS region (overrides AWS_REGION env var)
    #[arg(long)]
    region: Option<String>,

    /// Use the SDK's default credential chain instead of static credentials
    #[arg(long)]
    default_credentials: bool,

    /// Seconds to wait for a new table to become active
    #[arg(long)]
    wait_timeout: Option<u64>,

    /// Seconds between table status polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Run against an in-process store instead of DynamoDB
    #[arg(long)]
    in_memory: bool,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (overrides LOG_FORMAT env var)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Partition key of the demo item
    #[arg(long, default_value = "123")]
    id: String,

    /// Sort key of the demo item
    #[arg(long, default_value_t = 20220410)]
    date: i64,

    /// Name attribute of the demo item
    #[arg(long, default_value = "John")]
    name: String,

    /// Email attribute of the demo item
    #[arg(long, default_value = "john@a.com")]
    email: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    // Override settings with CLI arguments
    if let Some(table) = args.table {
        settings.table_name = table;
    }
    if let Some(endpoint_url) = args.endpoint_url {
        settings.dynamodb_endpoint_url = Some(endpoint_url).filter(|url| !url.trim().is_empty());
    }
    if let Some(region) = args.region {
        settings.aws_region = region;
    }
    if args.default_credentials {
        settings.use_static_credentials = false;
    }
    if let Some(wait_timeout) = args.wait_timeout {
        settings.wait_timeout_secs = wait_timeout;
    }
    if let Some(poll_interval) = args.poll_interval {
        settings.poll_interval_secs = poll_interval;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(log_format) = args.log_format {
        settings.log_format = log_format;
    }
    settings.validate()?;

    init_tracing(&settings.log_level, settings.log_format);

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        table = %settings.table_name,
        region = %settings.aws_region,
        in_memory = args.in_memory,
        "Starting provisioner"
    );

    let record = Contact {
        id: args.id,
        date: args.date,
        name: Some(args.name),
        email: Some(args.email),
    };

    if args.in_memory {
        run(InMemoryStore::new(), &settings, &record).await
    } else {
        let client = create_dynamodb_client(&settings).await;
        run(DynamoDbStore::new(client), &settings, &record).await
    }
}

async fn run<S: TableStore>(store: S, settings: &Settings, record: &Contact) -> Result<()> {
    let provisioner =
        TableProvisioner::new(store, settings.table_name.clone(), settings.waiter_config());

    let mut stdout = io::stdout().lock();
    let report = demo::run(&provisioner, record, &mut stdout)
        .await
        .with_context(|| format!("Demo run against table '{}' failed", settings.table_name))?;

    tracing::info!(
        table = %settings.table_name,
        state = %report.table_state,
        queried = report.queried_count,
        "Demo run complete"
    );

    Ok(())
}
