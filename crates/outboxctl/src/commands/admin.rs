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

//! Implementation of the `admin purge-processed` command.
//!
//! Deletes delivered outbox records past a retention window. `PENDING` and
//! `FAILED` records are never touched.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use outbox::dal::DAL;
use outbox::Database;
use tracing::info;

/// Parse a duration string like "90d", "24h" or "7d12h" into a chrono::Duration.
///
/// Supported units are `d`, `h`, `m` and `s`.
pub(crate) fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let mut total = Duration::zero();
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
            continue;
        }
        if current_num.is_empty() {
            return Err(anyhow!(
                "Invalid duration format: expected number before '{}'",
                c
            ));
        }

        let num: i64 = current_num
            .parse()
            .with_context(|| format!("Invalid number in duration: {}", current_num))?;
        current_num.clear();

        let part = match c {
            'd' => Duration::try_days(num),
            'h' => Duration::try_hours(num),
            'm' => Duration::try_minutes(num),
            's' => Duration::try_seconds(num),
            _ => return Err(anyhow!("Unknown duration unit: '{}'. Use d, h, m, or s", c)),
        }
        .ok_or_else(|| anyhow!("Duration '{}' is out of range", s))?;

        total = total
            .checked_add(&part)
            .ok_or_else(|| anyhow!("Duration '{}' is out of range", s))?;
    }

    if !current_num.is_empty() {
        return Err(anyhow!(
            "Duration '{}' is missing a unit. Use d (days), h (hours), m (minutes), or s (seconds)",
            s
        ));
    }

    if total <= Duration::zero() {
        return Err(anyhow!("Duration must be greater than zero"));
    }

    Ok(total)
}

pub async fn purge_processed(database: Database, older_than: &str, dry_run: bool) -> Result<()> {
    let retention = parse_duration(older_than)
        .with_context(|| format!("Invalid duration: '{}'", older_than))?;
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .ok_or_else(|| anyhow!("Duration '{}' is out of range", older_than))?;
    let dal = DAL::new(database);

    if dry_run {
        let count = dal
            .outbox()
            .count_processed_before(cutoff)
            .await
            .context("Failed to count processed outbox messages")?;
        if count == 0 {
            info!("No processed outbox messages older than {}", cutoff);
        } else {
            info!(
                "[DRY RUN] Would delete {} processed outbox message(s) older than {}",
                count, cutoff
            );
        }
    } else {
        let deleted = dal
            .outbox()
            .delete_processed_before(cutoff)
            .await
            .context("Failed to delete processed outbox messages")?;
        if deleted == 0 {
            info!("No processed outbox messages older than {}", cutoff);
        } else {
            info!(
                "Deleted {} processed outbox message(s) older than {}",
                deleted, cutoff
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_single_units() {
        assert_eq!(parse_duration("90d").unwrap(), Duration::days(90));
        assert_eq!(parse_duration("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_duration("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_duration("60s").unwrap(), Duration::seconds(60));
    }

    #[test]
    fn test_parse_duration_combined() {
        assert_eq!(
            parse_duration("1d2h30m45s").unwrap(),
            Duration::days(1) + Duration::hours(2) + Duration::minutes(30) + Duration::seconds(45)
        );
    }

    #[test]
    fn test_parse_duration_case_and_whitespace() {
        assert_eq!(parse_duration(" 7D ").unwrap(), Duration::days(7));
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("90").is_err());
        assert!(parse_duration("90x").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("0d").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration("99999999999999999d").is_err());
    }
}
