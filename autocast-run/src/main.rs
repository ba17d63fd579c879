//! autocast-run - Run one marketing cycle for a project

use clap::Parser;
use libautocast::logging::LoggingConfig;
use libautocast::{AutocastError, AutocastService, CycleResult, Result};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "autocast-run")]
#[command(version)]
#[command(about = "Run one marketing cycle for a project and print the summary")]
#[command(long_about = "\
autocast-run - Run one marketing cycle for a project

DESCRIPTION:
    Runs content generation, image rendering, publishing, lead discovery
    and engagement once for the given project, regardless of its schedule.
    Step failures are listed in the summary; they do not stop the cycle.

OUTPUT:
    text - human-readable summary (default)
    json - the cycle result as a JSON object on stdout

EXIT CODES:
    0 - Cycle ran (individual steps may still have failed)
    1 - Cycle aborted, e.g. unknown project, or runtime error
    3 - Invalid arguments
")]
struct Cli {
    /// Project to run
    project_id: String,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = AutocastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(AutocastError::InvalidInput(format!(
                "Invalid format: '{}'. Valid options: text, json",
                other
            ))),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Cycle run failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let format: OutputFormat = cli.format.parse()?;
    if cli.project_id.trim().is_empty() {
        return Err(AutocastError::InvalidInput("Project id cannot be empty".to_string()));
    }

    let service = AutocastService::new().await?;
    let result = service.trigger_cycle(&cli.project_id).await;
    let aborted = aborted(&result);
    if aborted {
        error!("Cycle for {} aborted: {}", cli.project_id, result.errors.join("; "));
    } else {
        info!(
            "Cycle for {} finished with {} errors",
            cli.project_id,
            result.errors.len()
        );
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| AutocastError::InvalidInput(format!("Cannot encode result: {}", e)))?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", render_text(&result)),
    }

    Ok(if aborted { 1 } else { 0 })
}

/// A cycle that never got past loading its project
fn aborted(result: &CycleResult) -> bool {
    result.errors.iter().any(|e| e.starts_with("Critical:"))
        && result.content_generated == 0
        && result.images_generated == 0
        && result.posts_published == 0
        && result.leads_discovered == 0
        && result.leads_engaged == 0
}

fn render_text(result: &CycleResult) -> String {
    let mut out = format!(
        "Project: {}\n\
         Content generated: {}\n\
         Images generated:  {}\n\
         Posts published:   {}\n\
         Leads discovered:  {}\n\
         Leads engaged:     {}\n",
        result.project_id,
        result.content_generated,
        result.images_generated,
        result.posts_published,
        result.leads_discovered,
        result.leads_engaged,
    );
    if result.errors.is_empty() {
        out.push_str("No errors\n");
    } else {
        out.push_str(&format!("Errors ({}):\n", result.errors.len()));
        for e in &result.errors {
            out.push_str(&format!("  - {}\n", e));
        }
    }
    out
}
