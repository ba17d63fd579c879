//! autocast-admin - Manage projects, connected accounts, leads and content

use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use libautocast::logging::LoggingConfig;
use libautocast::types::{ContentItem, Lead, NewProject};
use libautocast::{
    AccountService, AutocastError, Config, LeadStatus, Platform, Project, RecordStore,
};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "autocast-admin")]
#[command(version)]
#[command(about = "Manage Autocast projects, connected accounts, leads and content")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or list projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Print the authorization URL that connects a platform account
    Connect {
        project_id: String,
        /// twitter, linkedin or instagram
        platform: String,
    },

    /// Finish a connection with the code and state from the OAuth redirect
    Callback {
        platform: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        state: String,
    },

    /// Remove a connected account
    Disconnect { project_id: String, platform: String },

    /// List the accounts connected to a project
    Accounts {
        project_id: String,
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List leads, change their status or reply to them
    #[command(subcommand)]
    Leads(LeadsCommand),

    /// List content or publish an item now
    #[command(subcommand)]
    Content(ContentCommand),
}

#[derive(Subcommand, Debug)]
enum LeadsCommand {
    /// List a project's leads, real ones first
    List {
        project_id: String,
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Set a lead's status (discovered, engaged, interested, customer)
    Status { lead_id: String, status: String },

    /// Reply to a real lead on its platform and mark it engaged
    Reply {
        project_id: String,
        lead_id: String,
        /// Reply text; the drafted reply is sent when omitted
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ContentCommand {
    /// List a project's content items
    List {
        project_id: String,
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Publish an item now and mark it posted
    Post {
        project_id: String,
        content_id: String,
        /// Publish here instead of the item's own platform
        #[arg(long)]
        platform: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    /// Create a project and print its id
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        vision: String,
        #[arg(long, default_value = "")]
        repo_url: String,
        /// Logo as a URL or data: URL
        #[arg(long)]
        logo: Option<String>,
        /// Extra caption language; repeatable
        #[arg(long = "language")]
        languages: Vec<String>,
        /// Hours between cycles (default 24)
        #[arg(long)]
        frequency_hours: Option<u32>,
    },

    /// List all projects
    List {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    LoggingConfig::from_env(cli.verbose).init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<AutocastError>()
                .map(AutocastError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn parse_json_flag(format: &str) -> Result<bool, AutocastError> {
    match format.to_lowercase().as_str() {
        "text" => Ok(false),
        "json" => Ok(true),
        other => Err(AutocastError::InvalidInput(format!(
            "Invalid format: '{}'. Valid options: text, json",
            other
        ))),
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    // Validate arguments before touching config or the database
    let platform = match &command {
        Command::Connect { platform, .. }
        | Command::Callback { platform, .. }
        | Command::Disconnect { platform, .. } => Some(platform.parse::<Platform>()?),
        Command::Content(ContentCommand::Post {
            platform: Some(platform),
            ..
        }) => Some(platform.parse::<Platform>()?),
        _ => None,
    };
    let json = match &command {
        Command::Accounts { format, .. }
        | Command::Project(ProjectCommand::List { format })
        | Command::Leads(LeadsCommand::List { format, .. })
        | Command::Content(ContentCommand::List { format, .. }) => parse_json_flag(format)?,
        _ => false,
    };
    let status = match &command {
        Command::Leads(LeadsCommand::Status { status, .. }) => Some(status.parse::<LeadStatus>()?),
        _ => None,
    };

    let config = Config::load().context("loading configuration")?;
    let service = AccountService::from_config(&config).await?;
    let store = service.store();

    match command {
        Command::Project(ProjectCommand::Add {
            name,
            vision,
            repo_url,
            logo,
            languages,
            frequency_hours,
        }) => {
            if name.trim().is_empty() {
                return Err(AutocastError::InvalidInput("Project name cannot be empty".to_string()).into());
            }
            let project = store
                .create_project(NewProject {
                    name,
                    vision,
                    repo_url,
                    logo,
                    target_languages: languages,
                    agent_frequency_hours: frequency_hours,
                })
                .await?;
            println!("{}", project.id);
        }
        Command::Project(ProjectCommand::List { .. }) => {
            let projects = store.get_projects().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                for project in &projects {
                    println!("{}", project_line(project));
                }
            }
        }
        Command::Connect { project_id, .. } => {
            let platform = platform.context("platform")?;
            if store.get_project(&project_id).await?.is_none() {
                return Err(AutocastError::NotFound(format!("Project {}", project_id)).into());
            }
            let request = service.oauth().authorization_url(platform, &project_id)?;
            println!("{}", request.url);
        }
        Command::Callback { code, state, .. } => {
            let platform = platform.context("platform")?;
            let account = service.oauth().exchange_code(platform, &code, &state).await?;
            let connected = store.connect_social_account(account).await?;
            info!("Stored {} account {}", platform.display_name(), connected.id);
            println!(
                "Connected {} account @{} to project {}",
                platform.display_name(),
                connected.username,
                connected.project_id
            );
        }
        Command::Disconnect { project_id, .. } => {
            let platform = platform.context("platform")?;
            if store.disconnect_social_account(&project_id, platform).await? {
                println!("Disconnected {}", platform.display_name());
            } else {
                println!("No {} account was connected", platform.display_name());
            }
        }
        Command::Accounts { project_id, .. } => {
            let accounts = store.get_social_accounts(&project_id).await?;
            if json {
                let listing: Vec<serde_json::Value> = accounts
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "platform": a.platform,
                            "username": a.username,
                            "expiresAt": a.expires_at,
                            "connectedAt": a.connected_at,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for account in &accounts {
                    let expiry = account
                        .expires_at
                        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                        .map(|at| format!("expires {}", at.to_rfc3339()))
                        .unwrap_or_else(|| "long-lived".to_string());
                    println!(
                        "{:<10} @{:<20} {}",
                        account.platform.as_str(),
                        account.username,
                        expiry
                    );
                }
            }
        }
        Command::Leads(LeadsCommand::List { project_id, .. }) => {
            let leads = store.get_leads(&project_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&leads)?);
            } else {
                for lead in &leads {
                    println!("{}", lead_line(lead));
                }
            }
        }
        Command::Leads(LeadsCommand::Status { lead_id, .. }) => {
            let status = status.context("status")?;
            let lead = service.engagement().set_status(&lead_id, status).await?;
            println!("{} is now {}", lead.name, lead.status.as_str());
        }
        Command::Leads(LeadsCommand::Reply {
            project_id,
            lead_id,
            text,
        }) => {
            let engagement = service.engagement();
            let lead = engagement.find(&project_id, &lead_id).await?;
            let engaged = match text {
                Some(text) if !text.trim().is_empty() => engagement.engage(&lead, &text).await?,
                Some(_) => {
                    return Err(AutocastError::InvalidInput("Reply text cannot be empty".to_string()).into())
                }
                None => engagement.send_draft(&lead).await?,
            };
            info!("Replied to lead {}", engaged.id);
            println!("Replied to {} on {}", engaged.name, engaged.platform);
        }
        Command::Content(ContentCommand::List { project_id, .. }) => {
            let content = store.get_content(&project_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&content)?);
            } else {
                for item in &content {
                    println!("{}", content_line(item));
                }
            }
        }
        Command::Content(ContentCommand::Post {
            project_id,
            content_id,
            ..
        }) => {
            let posted = service.post_content(&project_id, &content_id, platform).await?;
            println!(
                "Posted {}: {}",
                posted.id,
                posted.post_url.as_deref().unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn project_line(project: &Project) -> String {
    let last_run = project
        .last_run_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{}  {}  every {}h  last run {}",
        project.id, project.name, project.agent_frequency_hours, last_run
    )
}

fn lead_line(lead: &Lead) -> String {
    let kind = if lead.metadata.is_simulated { "simulated" } else { "real" };
    format!(
        "{}  {:<20} {:<10} {:<10} {}",
        lead.id,
        lead.name,
        lead.platform,
        lead.status.as_str(),
        kind
    )
}

fn content_line(item: &ContentItem) -> String {
    format!(
        "{}  {:<8} {:<10} {}",
        item.id,
        item.status.as_str(),
        item.platform.as_str(),
        item.post_url.as_deref().unwrap_or("-")
    )
}
