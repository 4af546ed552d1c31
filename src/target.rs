//! C1: the immutable identity of a single log source.

/// A `(pod, container)` pair identifying one follow-mode log stream.
///
/// Targets are cheap, `Clone`, and compared field-wise. The canonical key
/// returned by [`Target::key`] is what the supervisor's registry is keyed
/// on, so two `Target`s with the same pod and container name always collide
/// in the registry regardless of where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pod: String,
    container: String,
}

impl Target {
    pub fn new(pod: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            container: container.into(),
        }
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Canonical registry key: `"<pod>-<container>"`.
    ///
    /// The separator is an implementation detail, not a parseable format;
    /// nothing downstream splits this string back into its parts.
    pub fn key(&self) -> String {
        format!("{}-{}", self.pod, self.container)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pod, self.container)
    }
}
