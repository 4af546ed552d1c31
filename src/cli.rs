use clap::Parser;

/// When to colorize per-target output prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Tail logs from a dynamic set of Kubernetes pods and containers,
/// multiplexed onto one terminal.
#[derive(Parser, Debug)]
#[command(name = "kubectl-tail")]
#[command(about = "Tail logs from a dynamic set of Kubernetes pods/containers")]
pub struct Cli {
    /// Regular expression matched against pod names.
    pub query: String,

    /// Path to the kubeconfig file. Defaults to `$HOME/.kube/config`.
    #[arg(long = "kube-config")]
    pub kube_config: Option<String>,

    /// Kubeconfig context to use. Defaults to the current context.
    #[arg(long)]
    pub context: Option<String>,

    /// Namespace to watch.
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Regular expression matched against container names.
    #[arg(short = 'c', long, default_value = ".*")]
    pub container: String,

    /// Include upstream-provided timestamps in each line.
    #[arg(short = 't', long)]
    pub timestamps: bool,

    /// Time window, in seconds, of logs to fetch on initial attach to a container.
    #[arg(short = 's', long, default_value_t = 10)]
    pub since: i64,

    /// Only print lines matching this regular expression.
    #[arg(long)]
    pub grep: Option<String>,

    /// When to colorize the pod/container prefixes.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Raise the log filter from `info` to `debug`.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}


impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ColorMode::Auto => "auto",
            ColorMode::Always => "always",
            ColorMode::Never => "never",
        };
        f.write_str(s)
    }
}
