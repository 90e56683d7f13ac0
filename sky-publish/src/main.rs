//! sky-publish - deliver a "content published" event to Bluesky
//!
//! Content comes either from flags or as a JSON object on stdin:
//!
//! ```text
//! {"id": 42, "status": "publish", "type": "post", "categories": [3, 7],
//!  "title": "Hello <em>world</em>", "permalink": "https://example.com/hello"}
//! ```

use std::collections::BTreeSet;
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use libskypost::activity_log::FileActivityLog;
use libskypost::config::ConfigSettings;
use libskypost::logging::LoggingConfig;
use libskypost::platforms::BlueskyClient;
use libskypost::types::{PUBLISHED_STATUS, QUALIFYING_TYPE};
use libskypost::{
    Config, ContentItem, Database, PostPublisher, PublishOutcome, Result, ShareStore, SkypostError,
};

#[derive(Parser, Debug)]
#[command(name = "sky-publish")]
#[command(version)]
#[command(about = "Mirror a published post to Bluesky", long_about = None)]
struct Cli {
    /// Content id (reads a JSON content item from stdin if omitted)
    #[arg(long)]
    id: Option<u64>,

    /// Content title; markup is stripped
    #[arg(long)]
    title: Option<String>,

    /// Public URL of the content
    #[arg(long)]
    permalink: Option<String>,

    /// Category id of the content (repeatable)
    #[arg(short, long = "category")]
    categories: Vec<u64>,

    /// Content status
    #[arg(long, default_value = PUBLISHED_STATUS)]
    status: String,

    /// Content type
    #[arg(long = "type", default_value = QUALIFYING_TYPE)]
    content_type: String,

    /// Only report whether the content id has already been shared
    #[arg(long)]
    check: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let json = match cli.format.as_str() {
        "text" => false,
        "json" => true,
        other => {
            return Err(SkypostError::InvalidInput(format!(
                "Invalid format '{}'. Valid options: text, json",
                other
            )))
        }
    };

    let config = Config::load()?;
    let db = Database::new(&config.database_path()).await?;

    if cli.check {
        let id = cli.id.ok_or_else(|| {
            SkypostError::InvalidInput("--check requires --id".to_string())
        })?;
        let shared = db.is_shared(id).await?;
        if json {
            println!("{}", serde_json::json!({ "content_id": id, "shared": shared }));
        } else {
            println!("{}", if shared { "shared" } else { "not shared" });
        }
        return Ok(0);
    }

    let item = read_content_item(&cli)?;
    tracing::debug!("Received publish event for content {}", item.id);

    let client = BlueskyClient::with_timeout(
        &config.bluesky.service,
        config.bluesky.timeout_secs.map(Duration::from_secs),
    )?;

    let publisher = PostPublisher::new(
        Arc::new(ConfigSettings::new(&config)),
        Arc::new(FileActivityLog::in_dir(&config.log_dir())),
        Arc::new(db),
        client,
    )
    .with_skip_already_shared(config.bluesky.skip_already_shared);

    let outcome = publisher.handle_content_published(&item).await;
    report(&item, &outcome, json);

    Ok(match outcome {
        PublishOutcome::Failed { error, .. } => SkypostError::Platform(error).exit_code(),
        _ => 0,
    })
}

fn read_content_item(cli: &Cli) -> Result<ContentItem> {
    if cli.id.is_none() && cli.title.is_none() && cli.permalink.is_none() {
        return read_content_from_stdin();
    }

    let id = cli
        .id
        .ok_or_else(|| SkypostError::InvalidInput("Missing --id".to_string()))?;
    let title = cli
        .title
        .clone()
        .ok_or_else(|| SkypostError::InvalidInput("Missing --title".to_string()))?;
    let permalink = cli
        .permalink
        .clone()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| SkypostError::InvalidInput("Missing --permalink".to_string()))?;

    Ok(ContentItem {
        id,
        status: cli.status.clone(),
        content_type: cli.content_type.clone(),
        categories: cli.categories.iter().copied().collect::<BTreeSet<u64>>(),
        title,
        permalink,
    })
}

fn read_content_from_stdin() -> Result<ContentItem> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(SkypostError::InvalidInput(
            "No content provided. Pass --id/--title/--permalink or pipe a JSON content item"
                .to_string(),
        ));
    }

    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .map_err(|e| SkypostError::InvalidInput(format!("Failed to read stdin: {}", e)))?;

    if buffer.trim().is_empty() {
        return Err(SkypostError::InvalidInput(
            "No content provided. Pass --id/--title/--permalink or pipe a JSON content item"
                .to_string(),
        ));
    }

    serde_json::from_str(&buffer)
        .map_err(|e| SkypostError::InvalidInput(format!("Invalid content item JSON: {}", e)))
}

fn report(item: &ContentItem, outcome: &PublishOutcome, json: bool) {
    if !json {
        println!("{}", outcome);
        return;
    }

    let mut value = serde_json::json!({
        "content_id": item.id,
        "state": outcome.final_state().to_string(),
    });
    match outcome {
        PublishOutcome::Skipped(reason) => {
            value["outcome"] = "skipped".into();
            value["reason"] = reason.to_string().into();
        }
        PublishOutcome::Shared { record_uri } => {
            value["outcome"] = "shared".into();
            value["record_uri"] = record_uri.clone().into();
        }
        PublishOutcome::Failed { at, error } => {
            value["outcome"] = "failed".into();
            value["failed_at"] = at.to_string().into();
            value["error"] = error.to_string().into();
        }
    }
    println!("{}", value);
}
