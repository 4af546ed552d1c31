//! A2: validated, compiled configuration assembled from [`crate::cli::Cli`].

use std::path::PathBuf;

use regex::Regex;

use crate::cli::{Cli, ColorMode};
use crate::error::Error;
use crate::tail::TailOptions;

/// Immutable configuration for one run of the engine, built once from the
/// parsed command line. Compiling both regexes up front means a bad pattern
/// surfaces as a single [`Error::Configuration`] before any worker starts,
/// rather than as a panic deep inside the watcher.
#[derive(Debug, Clone)]
pub struct Config {
    pub kube_config: PathBuf,
    pub context: Option<String>,
    pub namespace: String,
    pub pod_query: Regex,
    pub container_query: Regex,
    pub timestamps: bool,
    pub since_seconds: i64,
    pub grep: Option<Regex>,
    pub color: ColorMode,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, Error> {
        let pod_query = Regex::new(&cli.query)
            .map_err(|e| Error::configuration(format!("invalid pod query regex '{}': {e}", cli.query)))?;
        let container_query = Regex::new(&cli.container)
            .map_err(|e| Error::configuration(format!("invalid container regex '{}': {e}", cli.container)))?;
        let grep = cli
            .grep
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::configuration(format!("invalid grep regex: {e}")))?;

        let kube_config = match cli.kube_config {
            Some(path) => PathBuf::from(path),
            None => default_kube_config_path()?,
        };

        Ok(Self {
            kube_config,
            context: cli.context,
            namespace: cli.namespace,
            pod_query,
            container_query,
            timestamps: cli.timestamps,
            since_seconds: cli.since,
            grep,
            color: cli.color,
            verbose: cli.verbose,
        })
    }

    pub fn tail_options(&self, use_color: bool) -> TailOptions {
        TailOptions {
            timestamps: self.timestamps,
            since_seconds: self.since_seconds,
            grep: self.grep.clone(),
            use_color,
        }
    }
}

/// `$HOME/.kube/config`, matching the reference CLI's default.
fn default_kube_config_path() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::configuration("could not determine home directory; set $HOME or pass --kube-config"))?;
    Ok(PathBuf::from(home).join(".kube").join("config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli(query: &str) -> Cli {
        Cli {
            query: query.to_string(),
            kube_config: None,
            context: None,
            namespace: "default".to_string(),
            container: ".*".to_string(),
            timestamps: false,
            since: 10,
            grep: None,
            color: ColorMode::Auto,
            verbose: false,
        }
    }

    #[test]
    fn bad_pod_regex_is_configuration_error() {
        let cli = base_cli("(unterminated");
        let err = Config::from_cli(cli).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn bad_container_regex_is_configuration_error() {
        let mut cli = base_cli("web");
        cli.container = "(unterminated".to_string();
        let err = Config::from_cli(cli).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn defaults_kube_config_under_home() {
        // SAFETY: test runs single-threaded within this process's env mutation scope.
        unsafe {
            std::env::set_var("HOME", "/home/example");
        }
        let cli = base_cli("web");
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.kube_config, PathBuf::from("/home/example/.kube/config"));
    }

    #[test]
    fn explicit_kube_config_is_honored() {
        let mut cli = base_cli("web");
        cli.kube_config = Some("/etc/kube/custom".to_string());
        let config = Config::from_cli(cli).unwrap();
        assert_eq!(config.kube_config, PathBuf::from("/etc/kube/custom"));
    }
}
