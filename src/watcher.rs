//! C3: derives `added`/`removed` target streams from a pod lifecycle watch.

use futures::{Stream, StreamExt};
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::target::Target;

/// The state of one container as reported by a pod lifecycle event.
#[derive(Debug, Clone)]
pub struct ContainerState {
    pub name: String,
    pub ready: bool,
}

/// A pod lifecycle notification, already reduced to the shape the core
/// cares about. Production code adapts `kube::runtime::watcher::Event<Pod>`
/// into this type at the boundary; tests construct it directly.
#[derive(Debug, Clone)]
pub enum PodEvent {
    /// The pod was created or changed. Carries the currently-known
    /// container readiness, as reported by `status.containerStatuses`.
    Applied {
        pod: String,
        containers: Vec<ContainerState>,
    },
    /// The pod was deleted. Carries the declared container set from
    /// `spec.containers`, since a deleted pod's status may already be
    /// stripped of `containerStatuses`.
    Deleted { pod: String, containers: Vec<String> },
}

/// Subscribes to `events` and produces two channels of [`Target`]s: one for
/// containers that became eligible to tail, one for containers that must
/// stop being tailed. Both channels close exactly once, when `events` ends
/// or `cancel` fires.
pub fn watch<S>(
    events: S,
    cancel: CancellationToken,
    pod_query: Regex,
    container_query: Regex,
) -> (mpsc::Receiver<Target>, mpsc::Receiver<Target>)
where
    S: Stream<Item = PodEvent> + Send + Unpin + 'static,
{
    let (added_tx, added_rx) = mpsc::channel(64);
    let (removed_tx, removed_rx) = mpsc::channel(64);

    tokio::spawn(async move {
        run(events, cancel, pod_query, container_query, added_tx, removed_tx).await;
    });

    (added_rx, removed_rx)
}

async fn run<S>(
    mut events: S,
    cancel: CancellationToken,
    pod_query: Regex,
    container_query: Regex,
    added_tx: mpsc::Sender<Target>,
    removed_tx: mpsc::Sender<Target>,
) where
    S: Stream<Item = PodEvent> + Send + Unpin + 'static,
{
    info!("pod watch started");
    'outer: loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.next() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            PodEvent::Applied { pod, containers } => {
                if !pod_query.is_match(&pod) {
                    continue;
                }
                for container in containers {
                    if container.ready && container_query.is_match(&container.name) {
                        debug!(pod = %pod, container = %container.name, "target added");
                        match send_or_cancel(&added_tx, Target::new(pod.clone(), container.name), &cancel).await {
                            SendOutcome::Sent => {}
                            SendOutcome::ReceiverClosed => break,
                            SendOutcome::Cancelled => break 'outer,
                        }
                    }
                }
            }
            PodEvent::Deleted { pod, containers } => {
                if !pod_query.is_match(&pod) {
                    continue;
                }
                for container in containers {
                    if container_query.is_match(&container) {
                        debug!(pod = %pod, container = %container, "target removed");
                        match send_or_cancel(&removed_tx, Target::new(pod.clone(), container), &cancel).await {
                            SendOutcome::Sent => {}
                            SendOutcome::ReceiverClosed => break,
                            SendOutcome::Cancelled => break 'outer,
                        }
                    }
                }
            }
        }
    }

    info!("pod watch stopped");
    // Dropping the senders closes both channels exactly once, regardless of
    // whether we stopped because of cancellation or because `events` ended.
}

enum SendOutcome {
    Sent,
    ReceiverClosed,
    Cancelled,
}

/// Sends `target` on `tx`, racing the blocking `.send().await` against
/// `cancel` so a full channel can never keep this worker alive past
/// cancellation.
async fn send_or_cancel(tx: &mpsc::Sender<Target>, target: Target, cancel: &CancellationToken) -> SendOutcome {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => SendOutcome::Cancelled,
        result = tx.send(target) => match result {
            Ok(()) => SendOutcome::Sent,
            Err(_) => SendOutcome::ReceiverClosed,
        },
    }
}
