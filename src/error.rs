use thiserror::Error;

/// Error taxonomy for the tailing engine and its ambient CLI plumbing.
///
/// Variants map directly onto the exit codes documented in the CLI help:
/// [`Error::Configuration`] exits 1, everything else that reaches `main`
/// unhandled exits 2.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to construct kubernetes client: {0}")]
    ClientConstruction(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to start pod watch: {0}")]
    WatchSubscription(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn client_construction(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::ClientConstruction(Box::new(err))
    }

    pub fn watch_subscription(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::WatchSubscription(Box::new(err))
    }

    /// Process exit code this error should surface as, per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_) => 1,
            Error::ClientConstruction(_) | Error::WatchSubscription(_) => 2,
        }
    }
}
