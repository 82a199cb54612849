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

//! Outbox data access.
//!
//! [`OutboxRepository`] is bound to an open [`Transaction`] and is the only
//! way to create outbox records, so a record is always written in the same
//! transaction as the business change it announces. [`OutboxDAL`] exposes
//! the relay-side operations on the pool; each call runs in its own short
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::models::OutboxRow;
use super::DAL;
use crate::database::schema::outbox_messages;
use crate::database::{with_connection, Transaction};
use crate::error::OutboxError;
use crate::models::outbox::{OutboxRecord, OutboxStats, OutboxStatus};
use crate::models::utc_now;
use crate::outbox::OutboxStore;

/// Outbox operations bound to an open transaction.
pub struct OutboxRepository<'t, 'a> {
    tx: &'t mut Transaction<'a>,
}

impl<'t, 'a> OutboxRepository<'t, 'a> {
    pub(crate) fn new(tx: &'t mut Transaction<'a>) -> Self {
        Self { tx }
    }

    /// Inserts a new `PENDING` record with zero attempts.
    pub fn create_message(
        &mut self,
        aggregate_id: &str,
        event_type: &str,
        payload: Vec<u8>,
    ) -> Result<OutboxRecord, OutboxError> {
        if aggregate_id.trim().is_empty() {
            return Err(OutboxError::Validation(
                "aggregate id must not be empty".to_string(),
            ));
        }
        if event_type.trim().is_empty() {
            return Err(OutboxError::Validation(
                "event type must not be empty".to_string(),
            ));
        }

        let record = OutboxRecord {
            id: Uuid::now_v7(),
            aggregate_id: aggregate_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            status: OutboxStatus::Pending,
            attempt_count: 0,
            created_at: utc_now(),
            processed_at: None,
            fail_reason: None,
        };
        let row = OutboxRow::from(&record);

        with_connection!(&mut *self.tx, conn => {
            diesel::insert_into(outbox_messages::table)
                .values(&row)
                .execute(conn)
        })?;

        debug!(
            message_id = %record.id,
            aggregate_id = %record.aggregate_id,
            event_type = %record.event_type,
            "Outbox message created"
        );
        Ok(record)
    }

    /// Looks up a record by id.
    pub fn get(&mut self, id: Uuid) -> Result<Option<OutboxRecord>, OutboxError> {
        let key = id.to_string();
        let row: Option<OutboxRow> = with_connection!(&mut *self.tx, conn => {
            outbox_messages::table
                .find(&key)
                .select(OutboxRow::as_select())
                .first(conn)
                .optional()
        })?;

        Ok(row.map(OutboxRecord::try_from).transpose()?)
    }

    /// Returns up to `limit` `PENDING` records, oldest first.
    pub fn get_pending_messages(&mut self, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<OutboxRow> = with_connection!(&mut *self.tx, conn => {
            outbox_messages::table
                .filter(outbox_messages::status.eq(OutboxStatus::Pending.as_str()))
                // v7 ids sort in creation order, so they break created_at ties.
                .order((outbox_messages::created_at.asc(), outbox_messages::id.asc()))
                .limit(limit)
                .select(OutboxRow::as_select())
                .load(conn)
        })?;

        rows.into_iter()
            .map(|row| OutboxRecord::try_from(row).map_err(OutboxError::from))
            .collect()
    }

    /// Increments the attempt count of a `PENDING` record and returns the new value.
    pub fn increment_attempt(&mut self, id: Uuid) -> Result<i32, OutboxError> {
        let key = id.to_string();
        let updated = with_connection!(&mut *self.tx, conn => {
            diesel::update(
                outbox_messages::table
                    .filter(outbox_messages::id.eq(&key))
                    .filter(outbox_messages::status.eq(OutboxStatus::Pending.as_str())),
            )
            .set(outbox_messages::attempt_count.eq(outbox_messages::attempt_count + 1))
            .execute(conn)
        })?;

        if updated == 0 {
            return Err(self.not_pending(id));
        }

        let attempts: i32 = with_connection!(&mut *self.tx, conn => {
            outbox_messages::table
                .find(&key)
                .select(outbox_messages::attempt_count)
                .first(conn)
        })?;
        Ok(attempts)
    }

    /// Marks a record `PROCESSED`.
    ///
    /// Marking an already processed record again succeeds without touching
    /// `processed_at`. A dead-lettered record cannot be marked processed.
    pub fn mark_message_as_processed(&mut self, id: Uuid) -> Result<(), OutboxError> {
        let record = self.get(id)?.ok_or(OutboxError::NotFound(id))?;
        match record.status {
            OutboxStatus::Processed => {
                debug!(message_id = %id, "Outbox message already processed");
                Ok(())
            }
            OutboxStatus::Failed => Err(OutboxError::AlreadyFinalized {
                id,
                status: record.status,
            }),
            OutboxStatus::Pending => {
                let key = id.to_string();
                let now = utc_now().naive_utc();
                let updated = with_connection!(&mut *self.tx, conn => {
                    diesel::update(
                        outbox_messages::table
                            .filter(outbox_messages::id.eq(&key))
                            .filter(outbox_messages::status.eq(OutboxStatus::Pending.as_str())),
                    )
                    .set((
                        outbox_messages::status.eq(OutboxStatus::Processed.as_str()),
                        outbox_messages::processed_at.eq(Some(now)),
                    ))
                    .execute(conn)
                })?;

                if updated == 0 {
                    return match self.not_pending(id) {
                        OutboxError::AlreadyFinalized {
                            status: OutboxStatus::Processed,
                            ..
                        } => Ok(()),
                        err => Err(err),
                    };
                }
                Ok(())
            }
        }
    }

    /// Dead-letters a `PENDING` record with the given reason.
    pub fn mark_message_as_failed(&mut self, id: Uuid, reason: &str) -> Result<(), OutboxError> {
        let key = id.to_string();
        let updated = with_connection!(&mut *self.tx, conn => {
            diesel::update(
                outbox_messages::table
                    .filter(outbox_messages::id.eq(&key))
                    .filter(outbox_messages::status.eq(OutboxStatus::Pending.as_str())),
            )
            .set((
                outbox_messages::status.eq(OutboxStatus::Failed.as_str()),
                outbox_messages::fail_reason.eq(Some(reason)),
            ))
            .execute(conn)
        })?;

        if updated == 0 {
            return Err(self.not_pending(id));
        }
        Ok(())
    }

    /// Lists records, newest first, optionally filtered by status.
    pub fn list(
        &mut self,
        status: Option<OutboxStatus>,
        limit: usize,
    ) -> Result<Vec<OutboxRecord>, OutboxError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<OutboxRow> = with_connection!(&mut *self.tx, conn => {
            match status {
                Some(status) => outbox_messages::table
                    .filter(outbox_messages::status.eq(status.as_str()))
                    .order(outbox_messages::created_at.desc())
                    .limit(limit)
                    .select(OutboxRow::as_select())
                    .load(conn),
                None => outbox_messages::table
                    .order(outbox_messages::created_at.desc())
                    .limit(limit)
                    .select(OutboxRow::as_select())
                    .load(conn),
            }
        })?;

        rows.into_iter()
            .map(|row| OutboxRecord::try_from(row).map_err(OutboxError::from))
            .collect()
    }

    /// Counts records per status.
    pub fn stats(&mut self) -> Result<OutboxStats, OutboxError> {
        let counts: Vec<(String, i64)> = with_connection!(&mut *self.tx, conn => {
            outbox_messages::table
                .group_by(outbox_messages::status)
                .select((outbox_messages::status, diesel::dsl::count_star()))
                .load(conn)
        })?;

        let mut stats = OutboxStats::default();
        for (status, count) in counts {
            match OutboxStatus::from_str(&status) {
                Some(OutboxStatus::Pending) => stats.pending = count,
                Some(OutboxStatus::Processed) => stats.processed = count,
                Some(OutboxStatus::Failed) => stats.failed = count,
                None => debug!(status = %status, count, "Ignoring unknown outbox status"),
            }
        }
        Ok(stats)
    }

    /// Counts `PROCESSED` records acknowledged before `cutoff`.
    pub fn count_processed_before(&mut self, cutoff: DateTime<Utc>) -> Result<i64, OutboxError> {
        let cutoff = cutoff.naive_utc();
        let count: i64 = with_connection!(&mut *self.tx, conn => {
            outbox_messages::table
                .filter(outbox_messages::status.eq(OutboxStatus::Processed.as_str()))
                .filter(outbox_messages::processed_at.lt(cutoff))
                .count()
                .get_result(conn)
        })?;
        Ok(count)
    }

    /// Deletes `PROCESSED` records acknowledged before `cutoff`.
    ///
    /// `PENDING` and `FAILED` records are never deleted.
    pub fn delete_processed_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, OutboxError> {
        let cutoff = cutoff.naive_utc();
        let deleted = with_connection!(&mut *self.tx, conn => {
            diesel::delete(
                outbox_messages::table
                    .filter(outbox_messages::status.eq(OutboxStatus::Processed.as_str()))
                    .filter(outbox_messages::processed_at.lt(cutoff)),
            )
            .execute(conn)
        })?;
        Ok(deleted)
    }

    /// Explains why a conditional update on a `PENDING` record matched nothing.
    fn not_pending(&mut self, id: Uuid) -> OutboxError {
        match self.get(id) {
            Ok(Some(record)) => OutboxError::AlreadyFinalized {
                id,
                status: record.status,
            },
            Ok(None) => OutboxError::NotFound(id),
            Err(err) => err,
        }
    }
}

/// Pool-level outbox operations used by the relay worker and tooling.
#[derive(Clone)]
pub struct OutboxDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OutboxDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<OutboxRecord>, OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().get(id))
            .await
    }

    pub async fn get_pending_messages(&self, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().get_pending_messages(limit))
            .await
    }

    pub async fn increment_attempt(&self, id: Uuid) -> Result<i32, OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().increment_attempt(id))
            .await
    }

    pub async fn mark_message_as_processed(&self, id: Uuid) -> Result<(), OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().mark_message_as_processed(id))
            .await
    }

    pub async fn mark_message_as_failed(&self, id: Uuid, reason: &str) -> Result<(), OutboxError> {
        let reason = reason.to_string();
        self.dal
            .database
            .transaction(move |tx| tx.outbox().mark_message_as_failed(id, &reason))
            .await
    }

    pub async fn list(
        &self,
        status: Option<OutboxStatus>,
        limit: usize,
    ) -> Result<Vec<OutboxRecord>, OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().list(status, limit))
            .await
    }

    pub async fn stats(&self) -> Result<OutboxStats, OutboxError> {
        self.dal
            .database
            .transaction(|tx| tx.outbox().stats())
            .await
    }

    pub async fn count_processed_before(&self, cutoff: DateTime<Utc>) -> Result<i64, OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().count_processed_before(cutoff))
            .await
    }

    pub async fn delete_processed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, OutboxError> {
        self.dal
            .database
            .transaction(move |tx| tx.outbox().delete_processed_before(cutoff))
            .await
    }
}

#[async_trait]
impl OutboxStore for DAL {
    async fn get_pending_messages(&self, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        self.outbox().get_pending_messages(limit).await
    }

    async fn increment_attempt(&self, id: Uuid) -> Result<i32, OutboxError> {
        self.outbox().increment_attempt(id).await
    }

    async fn mark_message_as_processed(&self, id: Uuid) -> Result<(), OutboxError> {
        self.outbox().mark_message_as_processed(id).await
    }

    async fn mark_message_as_failed(&self, id: Uuid, reason: &str) -> Result<(), OutboxError> {
        self.outbox().mark_message_as_failed(id, reason).await
    }
}
