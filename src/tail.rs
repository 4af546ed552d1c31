//! C2: a single live log stream for one [`Target`].

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::style::Stylize;
use futures::io::{AsyncBufRead, AsyncBufReadExt};
use regex::Regex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::color::ColorPair;
use crate::sink::Sink;
use crate::target::Target;

/// Options forwarded verbatim to the upstream log request, plus an optional
/// output-side content filter.
#[derive(Debug, Clone)]
pub struct TailOptions {
    pub timestamps: bool,
    pub since_seconds: i64,
    /// Passthrough filter applied to each line before it reaches the sink.
    /// This is an output convenience, not a Watcher-level filter: it never
    /// changes which targets are tailed, only which of their lines print.
    pub grep: Option<Regex>,
    /// Whether pod/container prefixes carry ANSI color. Resolved once from
    /// `--color`/terminal detection before any Tail starts.
    pub use_color: bool,
}

/// The upstream collaborator boundary for opening a follow-mode log stream.
///
/// Implemented for `kube::Api<Pod>` in production; fakeable in tests so C2's
/// read loop, formatting, and close semantics can be exercised without a
/// live cluster.
#[async_trait]
pub trait PodLogClient: Send + Sync + 'static {
    async fn log_stream(
        &self,
        target: &Target,
        options: &TailOptions,
    ) -> anyhow::Result<Pin<Box<dyn AsyncBufRead + Send>>>;
}

/// Owns a single follow-mode log stream for one [`Target`].
///
/// A `Tail` is pure data until [`Tail::start`] is called; `start` spawns the
/// read loop on its own task and returns a one-shot receiver that fires
/// exactly once, when the loop has exited and every resource it held has
/// been released.
pub struct Tail {
    target: Target,
    options: TailOptions,
    colors: ColorPair,
    close_requested: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Tail {
    pub fn new(target: Target, options: TailOptions, colors: ColorPair) -> Self {
        Self {
            target,
            options,
            colors,
            close_requested: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Idempotent request to terminate the read loop. Safe to call any
    /// number of times, from any number of callers.
    pub fn close(&self) {
        if !self.close_requested.swap(true, Ordering::SeqCst) {
            self.cancel.cancel();
        }
    }

    /// Begins the read loop on an independent task against `sink`, using
    /// `client` to open the upstream stream. Returns a receiver that
    /// resolves once, when the loop has fully exited.
    pub fn start<C, W>(&self, client: Arc<C>, sink: Sink<W>) -> oneshot::Receiver<()>
    where
        C: PodLogClient,
        W: std::io::Write + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let target = self.target.clone();
        let options = self.options.clone();
        let colors = self.colors;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            run_read_loop(target, options, colors, client, sink, cancel).await;
            let _ = done_tx.send(());
        });

        done_rx
    }
}

async fn run_read_loop<C, W>(
    target: Target,
    options: TailOptions,
    colors: ColorPair,
    client: Arc<C>,
    sink: Sink<W>,
    cancel: CancellationToken,
) where
    C: PodLogClient,
    W: std::io::Write + Send + 'static,
{
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = client.log_stream(&target, &options) => result,
    };

    let mut reader = match stream {
        Ok(reader) => reader,
        Err(err) => {
            write_diagnostic(&sink, &target, &format!("could not open log stream: {err}"), options.use_color);
            warn!(target = %target, error = %err, "failed to open log stream");
            return;
        }
    };

    debug!(target = %target, "tail started");

    loop {
        let mut line = String::new();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = reader.read_line(&mut line) => result,
        };

        match read {
            Ok(0) => {
                // EOF: emit any trailing partial line, then the terminated notice.
                if !line.is_empty() {
                    write_line(&sink, &target, colors, options.use_color, &ensure_newline(&line), options.grep.as_ref());
                }
                write_terminated_notice(&sink, &target, options.use_color);
                break;
            }
            Ok(_) => {
                write_line(&sink, &target, colors, options.use_color, &ensure_newline(&line), options.grep.as_ref());
            }
            Err(err) => {
                write_diagnostic(&sink, &target, &format!("read error: {err}"), options.use_color);
                warn!(target = %target, error = %err, "log stream read error");
                break;
            }
        }
    }

    debug!(target = %target, "tail closed");
}

fn ensure_newline(line: &str) -> std::borrow::Cow<'_, str> {
    if line.ends_with('\n') {
        std::borrow::Cow::Borrowed(line)
    } else {
        std::borrow::Cow::Owned(format!("{line}\n"))
    }
}

fn write_line<W: std::io::Write>(
    sink: &Sink<W>,
    target: &Target,
    colors: ColorPair,
    use_color: bool,
    payload: &str,
    grep: Option<&Regex>,
) {
    if let Some(grep) = grep
        && !grep.is_match(payload.strip_suffix('\n').unwrap_or(payload))
    {
        return;
    }
    let prefix = if use_color {
        format!("{} {} ", target.pod().with(colors.pod), target.container().with(colors.container))
    } else {
        format!("{} {} ", target.pod(), target.container())
    };
    let mut out = String::with_capacity(prefix.len() + payload.len());
    out.push_str(&prefix);
    out.push_str(payload);
    if sink.write_line(&out).is_err() {
        // The sink is gone (e.g. a closed pipe); nothing more to do here,
        // the read loop will exit on its next iteration's cancellation check.
    }
}

fn write_diagnostic<W: std::io::Write>(sink: &Sink<W>, target: &Target, message: &str, use_color: bool) {
    let header = format!("[{target}]");
    let header = if use_color { header.red().bold().to_string() } else { header };
    let line = format!("{header} {message}\n");
    let _ = sink.write_line(&line);
}

fn write_terminated_notice<W: std::io::Write>(sink: &Sink<W>, target: &Target, use_color: bool) {
    let header = format!("[{target}] terminated");
    let header = if use_color { header.red().bold().to_string() } else { header };
    let line = format!("{header}\n");
    let _ = sink.write_line(&line);
}
