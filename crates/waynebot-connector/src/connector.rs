// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connector trait and the registry that runs connectors together.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A long-running bridge from an external system into channels.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Poll until `cancel` fires.
    async fn run(&self, cancel: CancellationToken);
}

/// Starts and stops a set of connectors as one unit.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
    scope: Option<CancellationToken>,
    tasks: JoinSet<()>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connector. Connectors registered after [`start_all`](Self::start_all)
    /// are not started until the next call.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.push(connector);
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Spawn every connector under a child scope of `parent`.
    pub fn start_all(&mut self, parent: &CancellationToken) {
        let scope = parent.child_token();
        for connector in &self.connectors {
            let connector = Arc::clone(connector);
            let cancel = scope.clone();
            self.tasks.spawn(async move {
                info!(name = connector.name(), "connector started");
                connector.run(cancel).await;
                info!(name = connector.name(), "connector stopped");
            });
        }
        self.scope = Some(scope);
    }

    /// Cancel every running connector and wait for all to exit.
    pub async fn stop_all(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.cancel();
        }
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "connector task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, cancel: CancellationToken) {
            self.started.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn start_and_stop_all() {
        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectorRegistry::new();
        for _ in 0..3 {
            registry.register(Arc::new(Counting {
                started: Arc::clone(&started),
                stopped: Arc::clone(&stopped),
            }));
        }
        assert_eq!(registry.len(), 3);

        let root = CancellationToken::new();
        registry.start_all(&root);
        while started.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
        registry.stop_all().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_connectors() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(Counting {
            started: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::clone(&stopped),
        }));
        let root = CancellationToken::new();
        registry.start_all(&root);
        root.cancel();
        registry.stop_all().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut registry = ConnectorRegistry::new();
        assert!(registry.is_empty());
        registry.stop_all().await;
    }
}
