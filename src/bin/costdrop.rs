use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use costdrop::{
    AdaptorConfig, CsvFileSource, Env, LineItem, Operation, RecordKind, RecordSource, StreamClient,
    resolve_months, split_line_items, transform_records, write_line_items,
};

#[derive(Parser)]
#[command(name = "costdrop", version, about = "Reshape cloud billing exports into CBF and stream them to an AnyCost connection")]
struct Cli {
    /// Dotenv file with destination credentials.
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform provider CSV exports to CBF and optionally upload them.
    Csv {
        /// Usage data CSV.
        #[arg(long)]
        usage: PathBuf,
        /// Purchase commitments CSV.
        #[arg(long)]
        commitments: Option<PathBuf>,
        /// Discounts CSV.
        #[arg(long)]
        discounts: Option<PathBuf>,
        /// Output path for the CBF side-channel CSV.
        #[arg(long, default_value = "cbf_output.csv")]
        output: PathBuf,
        /// Upload the transformed data to the AnyCost connection.
        #[arg(long)]
        upload: bool,
        /// Billing month(s): `2024-08`, `2024-06:2024-08`, or `2024-06,2024-08`.
        #[arg(long)]
        months: Option<String>,
        #[arg(long, value_enum, default_value_t)]
        operation: Operation,
        /// Prepare upload requests without sending them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate destination configuration without sending any data.
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let env = Env::load(Some(&cli.env_file))?;

    match cli.command {
        Command::Check => check(&env),
        Command::Csv {
            usage,
            commitments,
            discounts,
            output,
            upload,
            months,
            operation,
            dry_run,
        } => {
            let config = AdaptorConfig {
                months,
                operation,
                dry_run,
                output,
            };
            run_csv(usage, commitments, discounts, upload, config, &env).await
        }
    }
}

async fn run_csv(
    usage: PathBuf,
    commitments: Option<PathBuf>,
    discounts: Option<PathBuf>,
    upload: bool,
    config: AdaptorConfig,
    env: &Env,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sources: Vec<Box<dyn RecordSource>> =
        vec![Box::new(CsvFileSource::new(usage, RecordKind::Usage))];
    if let Some(path) = commitments {
        sources.push(Box::new(CsvFileSource::new(path, RecordKind::Commitment)));
    }
    if let Some(path) = discounts {
        sources.push(Box::new(CsvFileSource::new(path, RecordKind::Discount)));
    }

    let mut items: Vec<LineItem> = Vec::new();
    let mut skipped = 0usize;
    for source in &sources {
        let records = source.fetch().await?;
        info!(
            source = %source.describe(),
            kind = %source.kind(),
            records = records.len(),
            "read raw records"
        );
        let outcome = transform_records(&records, source.kind());
        skipped += outcome.failures.len();
        items.extend(outcome.items);
    }

    if items.is_empty() {
        info!("no valid records to process");
        return Ok(());
    }

    let file = std::fs::File::create(&config.output)?;
    write_line_items(file, &items)?;
    info!(
        output = %config.output.display(),
        records = items.len(),
        skipped,
        "wrote CBF output"
    );

    if !upload && !config.dry_run {
        return Ok(());
    }

    let month_spec = config
        .months
        .as_deref()
        .ok_or("--months is required when uploading")?;
    let months = resolve_months(month_spec)?;
    let client = StreamClient::from_env(env)?;

    let outcome = split_line_items(items, client.max_payload_bytes())?;
    for oversized in &outcome.oversized {
        warn!(%oversized, "dropping unsplittable line item");
    }

    let report = client
        .upload_months(&months, config.operation, &outcome.groups, config.dry_run)
        .await;

    println!("Upload summary:");
    for month in &report.months {
        match &month.first_error {
            None => println!(
                "  {}: {}/{} groups uploaded",
                month.month, month.groups_succeeded, month.groups_attempted
            ),
            Some(reason) => println!(
                "  {}: {}/{} groups uploaded, first error: {}",
                month.month, month.groups_succeeded, month.groups_attempted, reason
            ),
        }
    }

    let failed_months = report.failed_months().count();
    if failed_months > 0 {
        return Err(format!("{failed_months} month(s) had failed uploads").into());
    }
    if !outcome.is_clean() {
        return Err(format!("{} line item(s) exceeded the payload limit", outcome.oversized.len()).into());
    }
    Ok(())
}

fn check(env: &Env) -> Result<(), Box<dyn std::error::Error>> {
    let client = StreamClient::from_env(env);
    match client {
        Ok(_) => {
            let api_key = env.get("CLOUDZERO_API_KEY").unwrap_or_default();
            let connection_id = env.get("CLOUDZERO_CONNECTION_ID").unwrap_or_default();
            println!("destination configuration OK");
            println!("  connection id: {connection_id}");
            println!("  api key: {}", mask_key(&api_key));
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn mask_key(key: &str) -> String {
    if key.len() > 4 {
        format!("{}{}", "*".repeat(key.len() - 4), &key[key.len() - 4..])
    } else {
        "****".to_string()
    }
}
