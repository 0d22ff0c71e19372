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

//! Diesel schema definitions for the SQLite backend.

diesel::table! {
    expenses (id) {
        id -> Binary,
        spent_at -> Text,
        amount_cents -> BigInt,
        description -> Text,
        category -> Text,
        subcategory -> Text,
        notes -> Nullable<Text>,
        sync_status -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    recurring_expenses (id) {
        id -> Binary,
        description -> Text,
        amount_cents -> BigInt,
        category -> Text,
        subcategory -> Text,
        notes -> Nullable<Text>,
        frequency -> Text,
        start_date -> Text,
        end_date -> Nullable<Text>,
        active -> Integer,
        last_fired_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    sync_outbox (id) {
        id -> Binary,
        operation -> Text,
        expense_id -> Binary,
        snapshot -> Nullable<Text>,
        status -> Text,
        attempts -> Integer,
        max_attempts -> Integer,
        last_error -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
        processed_at -> Nullable<Text>,
        next_retry_at -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(expenses, recurring_expenses, sync_outbox);
