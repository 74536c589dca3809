// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs on the
//! reader or the serialized writer as appropriate.

pub mod activity;
pub mod channels;
pub mod credentials;
pub mod cursors;
pub mod memories;
pub mod messages;
pub mod personas;
pub mod projects;
pub mod reactions;
