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

//! Implementation of the `relay` command.
//!
//! Runs the outbox relay until Ctrl-C (or for a single tick with `--once`),
//! then closes the publisher so buffered sends are flushed.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use outbox::dal::DAL;
use outbox::publisher::InMemoryBroker;
use outbox::{Database, EventPublisher, OutboxRelay};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::OutboxCtlConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BrokerKind {
    /// In-process broker; messages are logged and discarded on exit
    Memory,
    /// Kafka, configured from the `[broker]` section
    Kafka,
}

#[cfg(feature = "kafka")]
fn kafka_publisher(config: &OutboxCtlConfig) -> Result<Arc<dyn EventPublisher>> {
    let publisher = outbox::publisher::KafkaPublisher::new(&config.broker)
        .context("Failed to create Kafka publisher")?;
    Ok(Arc::new(publisher))
}

#[cfg(not(feature = "kafka"))]
fn kafka_publisher(_config: &OutboxCtlConfig) -> Result<Arc<dyn EventPublisher>> {
    anyhow::bail!("outboxctl was built without the `kafka` feature")
}

pub async fn run(
    database: Database,
    config: &OutboxCtlConfig,
    broker: BrokerKind,
    once: bool,
) -> Result<()> {
    let memory = Arc::new(InMemoryBroker::new());
    let publisher: Arc<dyn EventPublisher> = match broker {
        BrokerKind::Memory => memory.clone(),
        BrokerKind::Kafka => kafka_publisher(config)?,
    };

    let relay = OutboxRelay::new(
        Arc::new(DAL::new(database)),
        publisher.clone(),
        config.relay_config(),
    );
    let cancel = CancellationToken::new();

    if once {
        let report = relay
            .process_batch(&cancel)
            .await
            .context("Failed to fetch pending outbox messages")?;
        info!(
            fetched = report.fetched,
            published = report.published,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            skipped = report.skipped,
            errors = report.errors,
            "Single relay pass complete"
        );
    } else {
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, stopping relay"),
            }
            shutdown.cancel();
        });

        relay.start(cancel).await.context("Relay failed to start")?;
    }

    publisher
        .close()
        .await
        .context("Failed to close publisher")?;

    if broker == BrokerKind::Memory {
        info!(
            published = memory.published().len(),
            "In-memory broker discarded its messages"
        );
    }
    Ok(())
}
