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

//! Diesel table definitions.
//!
//! Column types are chosen so one definition serves both PostgreSQL and
//! SQLite: identifiers are stored as text and timestamps as naive UTC.

diesel::table! {
    outbox_messages (id) {
        id -> Text,
        aggregate_id -> Text,
        event_type -> Text,
        payload -> Binary,
        status -> Text,
        attempt_count -> Integer,
        created_at -> Timestamp,
        processed_at -> Nullable<Timestamp>,
        fail_reason -> Nullable<Text>,
    }
}

diesel::table! {
    orders (id) {
        id -> Text,
        customer_id -> Text,
        items -> Text,
        total_cents -> BigInt,
        status -> Text,
        saga_id -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(outbox_messages, orders);
