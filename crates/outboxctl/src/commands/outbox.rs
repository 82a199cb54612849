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

//! Implementation of the `outbox` inspection subcommands.

use anyhow::{anyhow, Context, Result};
use outbox::dal::DAL;
use outbox::models::outbox::{OutboxRecord, OutboxStatus};
use outbox::Database;

fn parse_status(s: &str) -> Result<OutboxStatus> {
    OutboxStatus::from_str(&s.to_ascii_uppercase())
        .ok_or_else(|| anyhow!("Unknown outbox status '{}'. Use pending, processed or failed", s))
}

fn render(record: &OutboxRecord) -> String {
    let mut line = format!(
        "{}  {:<9}  {:<22}  attempts={}  aggregate={}  created={}",
        record.id,
        record.status.as_str(),
        record.event_type,
        record.attempt_count,
        record.aggregate_id,
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
    if let Some(reason) = &record.fail_reason {
        line.push_str(&format!("  reason={}", reason));
    }
    line
}

pub async fn list(database: Database, status: Option<&str>, limit: usize) -> Result<()> {
    let status = status.map(parse_status).transpose()?;
    let records = DAL::new(database)
        .outbox()
        .list(status, limit)
        .await
        .context("Failed to list outbox messages")?;

    if records.is_empty() {
        println!("No outbox messages");
    }
    for record in &records {
        println!("{}", render(record));
    }
    Ok(())
}

pub async fn stats(database: Database) -> Result<()> {
    let stats = DAL::new(database)
        .outbox()
        .stats()
        .await
        .context("Failed to load outbox statistics")?;

    println!("pending:   {}", stats.pending);
    println!("processed: {}", stats.processed);
    println!("failed:    {}", stats.failed);
    println!("total:     {}", stats.total());
    Ok(())
}
