//! Process-wide installable logger sink (spec.md §6).
//!
//! The default is a null sink: nothing is forwarded until a caller installs
//! one with [`set_logger`]. Internally, every log call in this crate still
//! goes through `tracing::trace!`/`debug!`/`warn!` at the instrumented call
//! sites (see [`crate::sys::txn_manager`], [`crate::env`]); [`install`]
//! attaches a thin [`tracing_subscriber::Layer`] that forwards those same
//! events into the installed sink, so existing instrumentation lights it up
//! for free instead of requiring a second, parallel logging call everywhere.

use parking_lot::RwLock;
use std::{fmt::Write as _, sync::Arc};

/// Severity of a forwarded log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Fine-grained diagnostic detail (cursor steps, per-entry bulk-op
    /// progress).
    Trace,
    /// Diagnostic detail useful during development (span enter/exit).
    Debug,
    /// Noteworthy events that are part of normal operation.
    Info,
    /// Recoverable anomalies (e.g. registry reuse with mismatched options).
    Warn,
    /// Errors surfaced as part of normal failure handling.
    Error,
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// A process-wide sink for `(level, message)` log events.
pub trait LogSink: Send + Sync + 'static {
    /// Receives one forwarded log event.
    fn log(&self, level: Level, message: &str);
}

static SINK: RwLock<Option<Arc<dyn LogSink>>> = RwLock::new(None);

/// Installs `sink` as the process-wide logger, replacing any previously
/// installed one.
pub fn set_logger(sink: impl LogSink) {
    *SINK.write() = Some(Arc::new(sink));
}

/// Removes any installed logger, reverting to the null sink.
pub fn clear_logger() {
    *SINK.write() = None;
}

pub(crate) fn emit(level: Level, message: &str) {
    if let Some(sink) = SINK.read().as_ref() {
        sink.log(level, message);
    }
}

/// A `tracing_subscriber` layer that forwards this crate's own `tracing`
/// events into whatever [`LogSink`] is currently installed.
///
/// Install alongside any other subscriber layers, e.g.:
/// ```ignore
/// use tracing_subscriber::layer::SubscriberExt;
/// tracing::subscriber::set_global_default(
///     tracing_subscriber::registry().with(mdbx_containers::logger::ForwardingLayer),
/// ).ok();
/// ```
pub struct ForwardingLayer;

impl<S> tracing_subscriber::Layer<S> for ForwardingLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        struct MessageVisitor<'a>(&'a mut String);
        impl tracing::field::Visit for MessageVisitor<'_> {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    let _ = write!(self.0, "{value:?}");
                }
            }
        }

        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        emit(Level::from(event.metadata().level()), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSink(Arc<Mutex<Vec<(Level, String)>>>);
    impl LogSink for RecordingSink {
        fn log(&self, level: Level, message: &str) {
            self.0.lock().push((level, message.to_string()));
        }
    }

    #[test]
    fn null_sink_by_default_is_silent() {
        clear_logger();
        // emitting with no sink installed must not panic.
        emit(Level::Warn, "no sink installed");
    }

    #[test]
    fn installed_sink_receives_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        set_logger(RecordingSink(Arc::clone(&log)));
        emit(Level::Info, "hello");
        assert_eq!(log.lock().as_slice(), &[(Level::Info, "hello".to_string())]);
        clear_logger();
    }
}
