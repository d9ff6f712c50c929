use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vdd_core::config::{data_dir_from_env_value, oracle_config_from_env_values, scope_from_env_value};
use vdd_core::constants::{GATEWAY_API_KEY_VAR, MAX_IMAGE_BYTES};
use vdd_core::{
    AnalysisResult, BodyPart, FileProfileStore, FlowError, FlowState, GatewayOracle,
    HistoryDispatcher, Orchestrator, ProfileStore, UploadFlow, UserId,
};

#[derive(Parser)]
#[command(name = "vdd")]
#[command(about = "Vitamin deficiency detector CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse an image of a body part
    Analyze {
        /// One of: skin, eyes, tongue, nails
        #[arg(long)]
        body_part: BodyPart,
        /// Path to the image file
        #[arg(long)]
        image: PathBuf,
        /// MIME type (guessed from the file extension if omitted)
        #[arg(long)]
        mime: Option<String>,
        /// Record the result in this user's history
        #[arg(long)]
        user: Option<UserId>,
    },
    /// List a user's past analyses, newest first
    History {
        #[arg(long)]
        user: UserId,
    },
    /// List the supported body parts
    BodyParts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("vdd_core=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let data_dir = data_dir_from_env_value(std::env::var("VDD_DATA_DIR").ok());

    match cli.command {
        Some(Commands::Analyze {
            body_part,
            image,
            mime,
            user,
        }) => analyze(body_part, &image, mime, user, &data_dir).await?,
        Some(Commands::History { user }) => {
            let store = FileProfileStore::new(&data_dir);
            let records = store.list_analyses(&user)?;
            if records.is_empty() {
                println!("No analyses found.");
            }
            for record in records {
                println!(
                    "{}  {:<6}  {} finding(s)  {}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.body_part,
                    record.analysis_result.deficiencies.len(),
                    record.analysis_result.overall_health
                );
            }
        }
        Some(Commands::BodyParts) => {
            for part in BodyPart::ALL {
                println!("{:<7} {}", part.as_str(), part.description());
            }
        }
        None => {
            println!("Use --help for more information.");
        }
    }

    Ok(())
}

async fn analyze(
    part: BodyPart,
    image: &Path,
    mime: Option<String>,
    user: Option<UserId>,
    data_dir: &Path,
) -> anyhow::Result<()> {
    let api_key = std::env::var(GATEWAY_API_KEY_VAR).ok();
    if api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        anyhow::bail!("{} is not set", GATEWAY_API_KEY_VAR);
    }
    let oracle_cfg = oracle_config_from_env_values(
        std::env::var("AI_GATEWAY_URL").ok(),
        std::env::var("AI_GATEWAY_MODEL").ok(),
        api_key,
    )?;
    let scope = scope_from_env_value(std::env::var("VDD_SCOPE_FILE").ok())?;
    let orchestrator = Orchestrator::new(Arc::new(GatewayOracle::new(oracle_cfg, scope)));

    let mut flow = match user {
        Some(user) => {
            let store = Arc::new(FileProfileStore::new(data_dir));
            UploadFlow::signed_in(user, HistoryDispatcher::new(store))
        }
        None => UploadFlow::new(),
    };

    let bytes = read_image(image)?;
    let mime = mime.unwrap_or_else(|| guess_mime(image).to_string());

    flow.select_part(part)?;
    flow.stage_image(&bytes, &mime)?;
    let state = flow.submit(&orchestrator).await?;

    match (state, flow.result(), flow.notice()) {
        (FlowState::Results, Some(result), _) => print_report(part, result),
        (_, _, Some(notice)) => eprintln!("{}: {}", notice.title(), notice.description()),
        _ => eprintln!("Analysis did not complete."),
    }

    // The process is about to exit; let the history write land first.
    if let Some(handle) = flow.take_pending_history() {
        handle.await.ok();
    }

    if state != FlowState::Results {
        std::process::exit(1);
    }
    Ok(())
}

/// Read an image file, refusing oversized files before loading them.
fn read_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .len();
    if size > MAX_IMAGE_BYTES as u64 {
        return Err(FlowError::ImageTooLarge {
            size: usize::try_from(size).unwrap_or(usize::MAX),
            limit: MAX_IMAGE_BYTES,
        }
        .into());
    }
    std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

fn print_report(part: BodyPart, result: &AnalysisResult) {
    println!("{} analysis", part.label());
    println!("{}", result.overall_health);
    for finding in &result.deficiencies {
        match finding.severity {
            Some(severity) => println!(
                "\n* {} ({:.0}% confidence, {})",
                finding.vitamin,
                finding.confidence,
                severity.as_str()
            ),
            None => println!("\n* {} ({:.0}% confidence)", finding.vitamin, finding.confidence),
        }
        if let Some(description) = &finding.description {
            println!("  {}", description);
        }
        for sign in &finding.signs {
            println!("  sign: {}", sign);
        }
        for rec in &finding.recommendations {
            println!("  try: {}", rec);
        }
    }
}
