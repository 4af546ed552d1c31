//! Ambient stack: the `kube`/`k8s-openapi` boundary the core depends on.
//!
//! Everything in this module is a thin adapter — it exists to turn `kube`'s
//! types into the small, test-fakeable shapes the core (`tail`, `watcher`,
//! `supervisor`) actually consumes. None of this module's logic is part of
//! the concurrency core itself.

use std::pin::Pin;

use async_trait::async_trait;
use futures::io::AsyncBufRead;
use futures::stream::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::runtime::watcher::{self, Config as WatcherConfig, Event};
use kube::{Api, Client};

use crate::config::Config;
use crate::error::Error;
use crate::tail::{PodLogClient, TailOptions};
use crate::target::Target;
use crate::watcher::{ContainerState, PodEvent};

/// Builds a `kube::Client` from the resolved kubeconfig path and optional
/// named context, mirroring the reference CLI's client construction but
/// honoring an explicit `--kube-config` path rather than only `$KUBECONFIG`.
pub async fn build_client(config: &Config) -> Result<Client, Error> {
    let kubeconfig = kube::config::Kubeconfig::read_from(&config.kube_config)
        .map_err(Error::client_construction)?;

    let options = kube::config::KubeConfigOptions {
        context: config.context.clone(),
        ..Default::default()
    };

    let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(Error::client_construction)?;

    Client::try_from(client_config).map_err(Error::client_construction)
}

/// Confirms the namespace is reachable before handing control to the
/// long-lived watch. `kube::runtime::watcher` never fails synchronously (it
/// lazily starts on first poll), so this stands in for the "subscription
/// fails synchronously" contract in the specification: a single bounded
/// `list` call surfaces a dead cluster/bad namespace immediately rather than
/// inside the watch's internal relist-and-retry loop.
pub async fn probe_namespace(api: &Api<Pod>) -> Result<(), Error> {
    api.list(&ListParams::default().limit(1))
        .await
        .map(|_| ())
        .map_err(Error::watch_subscription)
}

/// Adapts `kube::runtime::watcher`'s event stream into the [`PodEvent`]
/// shape the Watcher (C3) consumes. `Init`/`InitDone` bookkeeping events and
/// watch errors (the underlying watcher retries those on its own) are
/// dropped here; everything else maps onto `Applied`/`Deleted`.
pub fn pod_events(api: Api<Pod>, config: WatcherConfig) -> impl Stream<Item = PodEvent> + Send + Unpin + 'static {
    Box::pin(watcher::watcher(api, config).filter_map(|event| async move {
        match event {
            Ok(Event::Apply(pod)) | Ok(Event::InitApply(pod)) => Some(applied_event(pod)),
            Ok(Event::Delete(pod)) => Some(deleted_event(pod)),
            Ok(Event::Init) | Ok(Event::InitDone) => None,
            Err(_) => None,
        }
    }))
}

fn applied_event(pod: Pod) -> PodEvent {
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let containers = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|cs| ContainerState {
                    name: cs.name.clone(),
                    ready: cs.ready,
                })
                .collect()
        })
        .unwrap_or_default();
    PodEvent::Applied {
        pod: pod_name,
        containers,
    }
}

fn deleted_event(pod: Pod) -> PodEvent {
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    PodEvent::Deleted {
        pod: pod_name,
        containers,
    }
}

/// Production [`PodLogClient`]: opens a follow-mode log stream for one
/// container through `kube::Api<Pod>::log_stream`.
pub struct KubePodLogClient {
    api: Api<Pod>,
}

impl KubePodLogClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl PodLogClient for KubePodLogClient {
    async fn log_stream(
        &self,
        target: &Target,
        options: &TailOptions,
    ) -> anyhow::Result<Pin<Box<dyn AsyncBufRead + Send>>> {
        let params = LogParams {
            follow: true,
            container: Some(target.container().to_string()),
            timestamps: options.timestamps,
            since_seconds: Some(options.since_seconds),
            ..Default::default()
        };
        let stream = self.api.log_stream(target.pod(), &params).await?;
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ContainerStatus, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_named(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn applied_event_reads_readiness_from_container_statuses() {
        let mut pod = pod_named("web-0");
        pod.status = Some(PodStatus {
            container_statuses: Some(vec![ContainerStatus {
                name: "app".to_string(),
                ready: true,
                ..Default::default()
            }]),
            ..Default::default()
        });

        match applied_event(pod) {
            PodEvent::Applied { pod, containers } => {
                assert_eq!(pod, "web-0");
                assert_eq!(containers.len(), 1);
                assert_eq!(containers[0].name, "app");
                assert!(containers[0].ready);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn applied_event_with_no_status_has_no_containers() {
        let pod = pod_named("web-0");
        match applied_event(pod) {
            PodEvent::Applied { containers, .. } => assert!(containers.is_empty()),
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn deleted_event_reads_declared_containers_from_spec() {
        let mut pod = pod_named("web-0");
        pod.spec = Some(PodSpec {
            containers: vec![
                k8s_openapi::api::core::v1::Container {
                    name: "app".to_string(),
                    ..Default::default()
                },
                k8s_openapi::api::core::v1::Container {
                    name: "sidecar".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        match deleted_event(pod) {
            PodEvent::Deleted { pod, containers } => {
                assert_eq!(pod, "web-0");
                assert_eq!(containers, vec!["app".to_string(), "sidecar".to_string()]);
            }
            other => panic!("expected Deleted, got {other:?}"),
        }
    }
}
