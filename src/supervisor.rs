//! C4: consumes the Watcher's `added`/`removed` streams, maintains the
//! registry of live [`Tail`]s, and guarantees at-most-one-per-target and
//! eventual cleanup on removal or cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::color::ColorAssigner;
use crate::sink::Sink;
use crate::tail::{PodLogClient, Tail, TailOptions};
use crate::target::Target;

type Registry = Arc<Mutex<HashMap<String, Arc<Tail>>>>;

/// Read-only handle onto the live registry, independent of the
/// [`Supervisor`] that owns it.
#[derive(Clone)]
pub struct RegistryHandle {
    registry: Registry,
}

impl RegistryHandle {
    pub fn live_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Orchestrates the core: starts a [`Tail`] for every newly-added `Target`,
/// stops and forgets it on removal, and tears everything down on
/// cancellation. A registry entry is observable from the moment it is
/// inserted (state *starting*) until the completion-watcher for its Tail
/// removes it (state *tearing-down* -> *absent*).
pub struct Supervisor {
    registry: Registry,
    colors: ColorAssigner,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            colors: ColorAssigner::new(),
        }
    }

    /// Number of Tails currently registered. Exposed for tests and
    /// introspection; not part of the concurrency contract.
    pub fn live_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// A cheap, cloneable view onto the registry that outlives `run`'s
    /// consumption of `self`, so tests can observe registry size across a
    /// run without racing the move into a spawned task.
    pub fn registry_handle(&self) -> RegistryHandle {
        RegistryHandle {
            registry: self.registry.clone(),
        }
    }

    /// Runs the core to completion. Returns once `cancel` has fired (or both
    /// `added` and `removed` have closed) and every live Tail's completion
    /// signal has been observed.
    pub async fn run<C, W>(
        self,
        cancel: CancellationToken,
        client: Arc<C>,
        sink: Sink<W>,
        mut added: mpsc::Receiver<Target>,
        mut removed: mpsc::Receiver<Target>,
        options: TailOptions,
    ) where
        C: PodLogClient,
        W: std::io::Write + Send + 'static,
    {
        let mut watchers: JoinSet<()> = JoinSet::new();
        let mut added_open = true;
        let mut removed_open = true;

        loop {
            if !added_open && !removed_open {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                maybe = added.recv(), if added_open => {
                    match maybe {
                        Some(target) => self.handle_added(target, &client, &sink, &options, &mut watchers),
                        None => added_open = false,
                    }
                }
                maybe = removed.recv(), if removed_open => {
                    match maybe {
                        Some(target) => self.handle_removed(&target),
                        None => removed_open = false,
                    }
                }
            }
        }

        self.shutdown(watchers).await;
    }

    fn handle_added<C, W>(
        &self,
        target: Target,
        client: &Arc<C>,
        sink: &Sink<W>,
        options: &TailOptions,
        watchers: &mut JoinSet<()>,
    ) where
        C: PodLogClient,
        W: std::io::Write + Send + 'static,
    {
        let key = target.key();
        let mut guard = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        if guard.contains_key(&key) {
            debug!(target = %target, "duplicate add, discarding");
            return;
        }

        let colors = self.colors.assign();
        let tail = Arc::new(Tail::new(target.clone(), options.clone(), colors));
        let done = tail.start(client.clone(), sink.clone());
        guard.insert(key.clone(), tail.clone());
        drop(guard);

        debug!(target = %target, "tail registered");

        let registry = self.registry.clone();
        watchers.spawn(async move {
            let _ = done.await;
            let mut guard = registry.lock().unwrap_or_else(|p| p.into_inner());
            // Only remove the entry if it is still *this* tail: a remove
            // followed by a re-add for the same key may already have
            // installed a newer tail by the time this completion fires.
            if let Some(current) = guard.get(&key)
                && Arc::ptr_eq(current, &tail)
            {
                guard.remove(&key);
            }
        });
    }

    fn handle_removed(&self, target: &Target) {
        let key = target.key();
        let removed = {
            let mut guard = self.registry.lock().unwrap_or_else(|p| p.into_inner());
            guard.remove(&key)
        };
        if let Some(tail) = removed {
            debug!(target = %target, "tail removed");
            tail.close();
        }
    }

    async fn shutdown(self, mut watchers: JoinSet<()>) {
        let tails: Vec<Arc<Tail>> = {
            let guard = self.registry.lock().unwrap_or_else(|p| p.into_inner());
            guard.values().cloned().collect()
        };
        for tail in tails {
            tail.close();
        }
        while watchers.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Sink;
    use async_trait::async_trait;
    use futures::io::{AsyncBufRead, Cursor};
    use std::pin::Pin;
    use std::time::Duration;

    struct HangingClient;

    #[async_trait]
    impl PodLogClient for HangingClient {
        async fn log_stream(
            &self,
            _target: &Target,
            _options: &TailOptions,
        ) -> anyhow::Result<Pin<Box<dyn AsyncBufRead + Send>>> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    struct ScriptedClient {
        body: Vec<u8>,
    }

    #[async_trait]
    impl PodLogClient for ScriptedClient {
        async fn log_stream(
            &self,
            _target: &Target,
            _options: &TailOptions,
        ) -> anyhow::Result<Pin<Box<dyn AsyncBufRead + Send>>> {
            Ok(Box::pin(Cursor::new(self.body.clone())))
        }
    }

    fn options() -> TailOptions {
        TailOptions {
            timestamps: false,
            since_seconds: 10,
            grep: None,
            use_color: false,
        }
    }

    async fn run_with_timeout<F: std::future::Future>(fut: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(5), fut)
            .await
            .expect("supervisor did not finish in time")
    }

    #[tokio::test]
    async fn duplicate_add_starts_exactly_one_tail() {
        let supervisor = Supervisor::new();
        let registry = supervisor.registry_handle();
        let client = Arc::new(HangingClient);
        let sink = Sink::new(Vec::new());
        let cancel = CancellationToken::new();

        let (added_tx, added_rx) = mpsc::channel(8);
        let (removed_tx, removed_rx) = mpsc::channel(8);

        let target = Target::new("web-0", "app");
        added_tx.send(target.clone()).await.unwrap();
        added_tx.send(target.clone()).await.unwrap();

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(supervisor.run(cancel, client, sink, added_rx, removed_rx, options()));

        // Give the add-dispatch loop a chance to process both sends before
        // asserting, then cancel to force a deterministic shutdown.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.live_count(), 1);

        drop(added_tx);
        drop(removed_tx);
        cancel_clone.cancel();
        run_with_timeout(handle).await.unwrap();
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn remove_of_unknown_target_is_a_no_op() {
        let supervisor = Supervisor::new();
        let client = Arc::new(HangingClient);
        let sink = Sink::new(Vec::new());
        let cancel = CancellationToken::new();

        let (added_tx, added_rx) = mpsc::channel::<Target>(8);
        let (removed_tx, removed_rx) = mpsc::channel(8);

        removed_tx.send(Target::new("ghost", "app")).await.unwrap();
        drop(added_tx);
        drop(removed_tx);

        let handle = tokio::spawn(supervisor.run(cancel, client, sink, added_rx, removed_rx, options()));
        run_with_timeout(handle).await.unwrap();
    }

    #[tokio::test]
    async fn removal_closes_the_running_tail_and_forgets_it() {
        let supervisor = Supervisor::new();
        let registry = supervisor.registry_handle();
        let client = Arc::new(HangingClient);
        let sink = Sink::new(Vec::new());
        let cancel = CancellationToken::new();

        let (added_tx, added_rx) = mpsc::channel(8);
        let (removed_tx, removed_rx) = mpsc::channel(8);

        let target = Target::new("web-0", "app");
        added_tx.send(target.clone()).await.unwrap();

        let handle = tokio::spawn(supervisor.run(cancel, client, sink, added_rx, removed_rx, options()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.live_count(), 1);

        removed_tx.send(target).await.unwrap();
        drop(added_tx);
        drop(removed_tx);

        run_with_timeout(handle).await.unwrap();
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_drains_registry_and_returns() {
        let supervisor = Supervisor::new();
        let registry = supervisor.registry_handle();
        let client = Arc::new(HangingClient);
        let sink = Sink::new(Vec::new());
        let cancel = CancellationToken::new();

        let (added_tx, added_rx) = mpsc::channel(8);
        let (_removed_tx, removed_rx) = mpsc::channel(8);

        added_tx.send(Target::new("web-0", "app")).await.unwrap();
        added_tx.send(Target::new("web-0", "sidecar")).await.unwrap();

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(supervisor.run(cancel, client, sink, added_rx, removed_rx, options()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.live_count(), 2);

        cancel_clone.cancel();
        run_with_timeout(handle).await.unwrap();
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn eof_completion_forgets_the_target_without_a_remove_event() {
        let supervisor = Supervisor::new();
        let client = Arc::new(ScriptedClient { body: b"hi\n".to_vec() });
        let sink = Sink::new(Vec::new());
        let cancel = CancellationToken::new();

        let (added_tx, added_rx) = mpsc::channel(8);
        let (removed_tx, removed_rx) = mpsc::channel::<Target>(8);

        added_tx.send(Target::new("web-0", "app")).await.unwrap();
        drop(added_tx);
        drop(removed_tx);

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(supervisor.run(cancel, client, sink, added_rx, removed_rx, options()));
        // The scripted client's stream EOFs almost immediately; once that
        // completion is observed the registry empties on its own, well
        // before any cancellation.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_clone.cancel();
        run_with_timeout(handle).await.unwrap();
    }
}
