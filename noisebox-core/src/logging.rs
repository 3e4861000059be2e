//! Tracing setup for embedding hosts.
//!
//! Mobile hosts have no stdout, so besides the usual `fmt` layer we keep the
//! most recent log lines in a shared ring buffer that a debug screen can read.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Maximum number of lines kept in a [`LogBuffer`].
pub const LOG_BUFFER_CAPACITY: usize = 500;

/// Thread-safe log buffer for capturing tracing output.
pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

/// Creates an empty log buffer.
pub fn new_log_buffer() -> LogBuffer {
    Arc::new(Mutex::new(VecDeque::new()))
}

/// A tracing layer that captures log events into a shared in-memory ring buffer.
pub struct BufferLayer {
    buffer: LogBuffer,
}

impl BufferLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S: tracing::Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);

        // Format: [HH:MM:SS] LEVEL message
        let line = format!("[{}] {:>5} {}", clock_now(), event.metadata().level(), visitor.0);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push_back(line);
            while buf.len() > LOG_BUFFER_CAPACITY {
                buf.pop_front();
            }
        }
    }
}

/// Visitor that extracts the `message` field from a tracing event.
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}

/// Returns current UTC time as HH:MM:SS.
fn clock_now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Installs the global subscriber: an `fmt` layer filtered by `RUST_LOG`
/// (falling back to `info`) plus a [`BufferLayer`] feeding `buffer`.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(buffer: LogBuffer) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    );

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BufferLayer::new(buffer))
        .try_init()
        .is_ok()
}

/// Copies the buffered lines, oldest first.
pub fn snapshot(buffer: &LogBuffer) -> Vec<String> {
    buffer
        .lock()
        .map(|buf| buf.iter().cloned().collect())
        .unwrap_or_default()
}

/// Empties the buffer.
pub fn clear(buffer: &LogBuffer) {
    if let Ok(mut buf) = buffer.lock() {
        buf.clear();
    }
}
