use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth::analytics::{AnalyticsReporter, EventRecorder, RequestContext, SystemClock};
use hearth::config::Config;
use hearth::models::{generate_id, NewAgent, NewProperty, PropertyInquiries};
use hearth::storage::{self, StorageError};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hearth-admin")]
#[command(about = "Hearth agent analytics management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new agent
    CreateAgent {
        /// Display name
        name: String,
        /// Agent id (generated if omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Add a property listing owned by an agent
    AddProperty {
        /// Owning agent id
        owner_id: String,
        title: String,
        location: String,
        /// Listing status (e.g. active, sold, rented)
        status: String,
        price: f64,
        #[arg(long)]
        thumbnail: Option<String>,
        #[arg(long)]
        whatsapp: Option<u64>,
        #[arg(long)]
        email: Option<u64>,
        #[arg(long)]
        calls: Option<u64>,
    },
    /// List all agents with their headline counters
    ListAgents,
    /// Record an interaction for an agent
    Track {
        agent_id: String,
        /// view, whatsapp, email or phone
        interaction_type: String,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        property_id: Option<String>,
    },
    /// Print an agent's analytics report as JSON
    Report { agent_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = storage::connect(&config.database).await?;

    let clock = Arc::new(SystemClock);
    let reporter = AnalyticsReporter::new(Arc::clone(&storage), clock.clone(), &config.analytics);

    match cli.command {
        Commands::CreateAgent {
            name,
            id,
            email,
            phone,
        } => {
            let new_agent = NewAgent {
                id: id.unwrap_or_else(generate_id),
                name,
                email,
                phone,
            };
            match storage.create_agent(&new_agent).await {
                Ok(agent) => println!("✓ Created agent '{}' ({})", agent.name, agent.id),
                Err(StorageError::Conflict) => {
                    println!("⚠ Agent '{}' already exists", new_agent.id)
                }
                Err(e) => return Err(e).context("failed to create agent"),
            }
        }
        Commands::AddProperty {
            owner_id,
            title,
            location,
            status,
            price,
            thumbnail,
            whatsapp,
            email,
            calls,
        } => {
            if storage.get_agent(&owner_id).await?.is_none() {
                anyhow::bail!("agent '{}' not found", owner_id);
            }
            let property = storage
                .create_property(&NewProperty {
                    id: generate_id(),
                    owner_id,
                    title,
                    location,
                    status,
                    price,
                    thumbnail,
                    inquiries: PropertyInquiries {
                        whatsapp,
                        email,
                        calls,
                    },
                })
                .await
                .context("failed to create property")?;
            println!(
                "✓ Added property '{}' ({}) for agent {}",
                property.title, property.id, property.owner_id
            );
        }
        Commands::ListAgents => {
            let agents = storage.list_agents().await?;
            if agents.is_empty() {
                println!("No agents found.");
            } else {
                println!("{:<18} {:<30} {:>8} {:>8}", "ID", "Name", "Views", "Clicks");
                println!("{}", "-".repeat(68));
                for agent in agents {
                    let analytics = agent.analytics.unwrap_or_default();
                    println!(
                        "{:<18} {:<30} {:>8} {:>8}",
                        agent.id,
                        agent.name,
                        analytics.profile_views.total,
                        analytics.interactions.combined().total
                    );
                }
            }
        }
        Commands::Track {
            agent_id,
            interaction_type,
            ip,
            property_id,
        } => {
            let recorder =
                EventRecorder::new(Arc::clone(&storage), reporter, clock, &config.analytics);
            let context = RequestContext {
                ip,
                user_agent: Some("hearth-admin".to_string()),
                referrer: None,
            };
            let report = recorder
                .record(&agent_id, Some(&interaction_type), property_id, context)
                .await?;
            println!(
                "✓ Recorded {} for agent {} (views: {}, interactions: {})",
                interaction_type,
                agent_id,
                report.summary.profile_views.total,
                report.summary.total_interactions.total
            );
        }
        Commands::Report { agent_id } => {
            let report = reporter.report(&agent_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
