// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent runtime for the Waynebot chat server.
//!
//! One long-lived [`Actor`] task per persona scans its subscribed channels
//! whenever the hub signals activity (or a fallback timer fires), decides
//! whether to respond, and runs a bounded LLM/tool loop. The [`Supervisor`]
//! owns the actor tasks; the [`Archiver`] and the cleanup loop keep the store
//! bounded.

pub mod actor;
pub mod archiver;
pub mod budget;
pub mod cleanup;
pub mod cursor;
pub mod decision;
pub mod memory;
pub mod services;
pub mod shutdown;
pub mod status;
pub mod supervisor;

pub use actor::Actor;
pub use archiver::Archiver;
pub use budget::BudgetChecker;
pub use cleanup::{CleanupReport, cleanup_once, run_cleanup_loop};
pub use cursor::CursorStore;
pub use decision::DecisionMaker;
pub use memory::MemoryExtractor;
pub use services::{ActorSettings, AgentServices};
pub use shutdown::install_signal_handler;
pub use status::StatusTracker;
pub use supervisor::Supervisor;
