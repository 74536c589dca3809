// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Waynebot chat server.
//!
//! One writer connection serializes every write; a second connection serves
//! reads concurrently under WAL. Schema changes are refinery migrations
//! embedded in the binary.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::{Database, sqlite_err};
pub use queries::activity::{ActivityTable, NewLlmCall, NewToolExecution};
pub use queries::channels::DmPeer;
pub use queries::credentials::{Invite, Session, User};
pub use queries::memories::{NewMemory, blob_to_vec, cosine_similarity, vec_to_blob};
