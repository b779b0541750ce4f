//! Logging setup and server log forwarding.
//!
//! Each level is routed to the console, the server, or both, according to the
//! `logging` bitmask in [`ClientConfig`]. Console output goes through a
//! `tracing_subscriber` fmt layer; server-bound records are captured by
//! [`ServerLogLayer`] and queued for the application loop, which sends them as
//! `log` packets.

use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter, Layer};

use crate::config::ClientConfig;

/// Target used for records that must stay on the console.
pub const CONSOLE_TARGET: &str = "statewire::console";

const LEVELS: [Level; 5] = [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR];

// ---------------------------------------------------------------------------
// LogTargets
// ---------------------------------------------------------------------------

/// Where records of one level go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LogTargets(u8);

impl LogTargets {
    pub const NONE: LogTargets = LogTargets(0);
    pub const CONSOLE: LogTargets = LogTargets(1);
    pub const SERVER: LogTargets = LogTargets(2);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 3)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: LogTargets) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl BitOr for LogTargets {
    type Output = LogTargets;
    fn bitor(self, rhs: Self) -> Self::Output {
        LogTargets(self.0 | rhs.0)
    }
}

/// Level routing table resolved from the configuration.
fn routes(config: &ClientConfig) -> HashMap<Level, LogTargets> {
    LEVELS
        .iter()
        .map(|level| (*level, config.log_targets(level.as_str())))
        .collect()
}

// ---------------------------------------------------------------------------
// ServerLogLayer
// ---------------------------------------------------------------------------

/// A record bound for the server.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Captures records at server-routed levels and queues them.
pub struct ServerLogLayer {
    routes: HashMap<Level, LogTargets>,
    queue: UnboundedSender<LogRecord>,
}

impl ServerLogLayer {
    /// A layer and the receiving end of its queue.
    pub fn new(config: &ClientConfig) -> (Self, UnboundedReceiver<LogRecord>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let layer = Self {
            routes: routes(config),
            queue,
        };
        (layer, rx)
    }

    fn wants(&self, level: &Level, target: &str) -> bool {
        target != CONSOLE_TARGET
            && self
                .routes
                .get(level)
                .is_some_and(|t| t.contains(LogTargets::SERVER))
    }
}

impl<S> Layer<S> for ServerLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let meta = event.metadata();
        if !self.wants(meta.level(), meta.target()) {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let _ = self.queue.send(LogRecord {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: visitor.finish(),
        });
    }
}

/// Collects the `message` field followed by any other fields as `k=v`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Install the global subscriber. Returns the server log queue, or `None` if
/// a subscriber was already installed.
pub fn init(config: &ClientConfig) -> Option<UnboundedReceiver<LogRecord>> {
    let (server, rx) = ServerLogLayer::new(config);
    let console_routes = routes(config);
    let console = tfmt::layer()
        .with_target(true)
        .with_filter(filter_fn(move |meta| {
            meta.target() == CONSOLE_TARGET
                || console_routes
                    .get(meta.level())
                    .is_some_and(|t| t.contains(LogTargets::CONSOLE))
        }));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(server)
        .try_init()
        .ok()
        .map(|()| rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn target_bits() {
        let both = LogTargets::CONSOLE | LogTargets::SERVER;
        assert_eq!(both.bits(), 3);
        assert!(both.contains(LogTargets::SERVER));
        assert!(!LogTargets::CONSOLE.contains(LogTargets::SERVER));
        assert_eq!(LogTargets::from_bits(7), both);
    }

    #[test]
    fn server_layer_captures_routed_levels() {
        let config = ClientConfig::default().with_logging("warn", LogTargets::SERVER);
        let (layer, mut rx) = ServerLogLayer::new(&config);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("stays local");
            tracing::warn!(widget = "w1", "disk nearly full");
            tracing::warn!(target: CONSOLE_TARGET, "console only");
        });
        let record = rx.try_recv().unwrap();
        assert_eq!(record.level, Level::WARN);
        assert_eq!(record.message, "disk nearly full widget=w1");
        assert!(rx.try_recv().is_err());
    }
}
