/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! outboxctl - command-line interface for the transactional outbox.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outbox::Database;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod commands;
mod config;

use commands::relay::BrokerKind;
use config::{ConfigError, ConfigLoader, OutboxCtlConfig, Validate};

/// outboxctl - run the outbox relay and manage orders and outbox records
#[derive(Parser)]
#[command(name = "outboxctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to OUTBOX_CONFIG, ./outbox.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration file
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the embedded database migrations
    Migrate,

    /// Run the relay worker that publishes pending outbox records
    Relay {
        /// Broker to publish to
        #[arg(long, value_enum, default_value = "memory")]
        broker: BrokerKind,

        /// Process a single batch and exit
        #[arg(long)]
        once: bool,
    },

    /// Create and manage orders
    Orders {
        #[command(subcommand)]
        command: OrderCommands,
    },

    /// Inspect outbox records
    Outbox {
        #[command(subcommand)]
        command: OutboxCommands,
    },

    /// Administrative maintenance
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum OrderCommands {
    /// Create an order
    Create {
        #[arg(long)]
        customer: String,

        /// Item as PRODUCT:QUANTITY:UNIT_PRICE_CENTS (repeatable)
        #[arg(long = "item", required = true)]
        items: Vec<String>,
    },
    /// Show one order
    Get { id: Uuid },
    /// List orders, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Move an order to a new status
    Status { id: Uuid, status: String },
    /// Cancel an order that has not shipped
    Cancel {
        id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum OutboxCommands {
    /// List outbox records, newest first
    List {
        /// Only show records in this status (pending, processed, failed)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Count records per status
    Stats,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Delete processed outbox records older than a retention window
    PurgeProcessed {
        /// Delete records processed longer ago than this (e.g., "7d", "24h")
        #[arg(long, default_value = "7d")]
        older_than: String,

        /// Preview what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_config(cli: &Cli) -> Result<OutboxCtlConfig> {
    let mut config = match ConfigLoader::new().load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(ConfigError::ConfigNotFound) => OutboxCtlConfig::default(),
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }

    config
        .validate()
        .map_err(ConfigError::from)
        .context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config(&cli)?;
    let database_url = config
        .database
        .url
        .as_deref()
        .context("Database URL is required")?;
    let database = Database::try_new(database_url, config.database.pool_size)
        .context("Failed to open database")?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&database).await?,
        Commands::Relay { broker, once } => {
            commands::relay::run(database, &config, broker, once).await?
        }
        Commands::Orders { command } => match command {
            OrderCommands::Create { customer, items } => {
                commands::orders::create(database, &customer, &items).await?
            }
            OrderCommands::Get { id } => commands::orders::get(database, id).await?,
            OrderCommands::List { limit, offset } => {
                commands::orders::list(database, limit, offset).await?
            }
            OrderCommands::Status { id, status } => {
                commands::orders::set_status(database, id, &status).await?
            }
            OrderCommands::Cancel { id, reason } => {
                commands::orders::cancel(database, id, reason).await?
            }
        },
        Commands::Outbox { command } => match command {
            OutboxCommands::List { status, limit } => {
                commands::outbox::list(database, status.as_deref(), limit).await?
            }
            OutboxCommands::Stats => commands::outbox::stats(database).await?,
        },
        Commands::Admin { command } => match command {
            AdminCommands::PurgeProcessed {
                older_than,
                dry_run,
            } => commands::admin::purge_processed(database, &older_than, dry_run).await?,
        },
    }

    Ok(())
}
