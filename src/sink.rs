//! Shared output sink: serializes line-granular writes from many Tails.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Wraps any `Write` so that writes to it are atomic at line granularity.
///
/// Every Tail holds a clone of the same `Sink`; the inner mutex is only ever
/// held for the duration of a single write, so it is never contended across
/// an `.await` point.
#[derive(Clone)]
pub struct Sink<W> {
    inner: Arc<Mutex<W>>,
}

impl<W: Write> Sink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Writes `line` (which must already include its trailing newline) in a
    /// single critical section, then flushes so output appears promptly.
    pub fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());
        guard.write_all(line.as_bytes())?;
        guard.flush()
    }
}

impl<W: Write + Clone> Sink<W> {
    /// Returns a copy of the current writer state. Test-only convenience for
    /// asserting on an in-memory sink's accumulated bytes.
    pub fn snapshot(&self) -> W {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner()).clone()
    }
}
