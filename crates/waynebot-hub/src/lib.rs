// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event fan-out for the Waynebot chat server.
//!
//! [`Hub`] delivers broadcast events to every connected sink in order and
//! wakes agent actors. [`sink`] pumps a sink's queue over a WebSocket.

pub mod hub;
pub mod sink;

pub use hub::{Hub, SinkId, Subscription, WakeReceiver};
pub use sink::serve_socket;
