// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound connectors for the Waynebot chat server.
//!
//! A [`Connector`] polls an external system and posts what it finds into a
//! channel as `connector` messages. The [`ConnectorRegistry`] runs every
//! registered connector under one cancellation scope.

pub mod connector;
pub mod email;
pub mod imap;

pub use connector::{Connector, ConnectorRegistry};
pub use email::{EmailConnector, EmailSettings, InboundEmail, MailSource, format_email};
pub use imap::{ImapConfig, ImapSource};
