use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::error::CatalogError;

/// Environment variable selecting the diagnostic verbosity (0, 1 or 2)
pub const ENV_DEBUG_LEVEL: &str = "LFCDEBUG";

/// Map an `LFCDEBUG` value to a log filter: 0 (or unset) is info,
/// 1 is debug, 2 and above is trace.
pub fn level_filter(debug_level: Option<&str>) -> log::LevelFilter {
    match debug_level.and_then(|v| v.trim().parse::<u32>().ok()) {
        None | Some(0) => log::LevelFilter::Info,
        Some(1) => log::LevelFilter::Debug,
        Some(_) => log::LevelFilter::Trace,
    }
}

/// A catalog call that failed for a reason other than "no such entry".
///
/// `client` is the identifier of the request that triggered the call, so
/// an operator can tie an outage back to the redirects it caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEvent {
    pub timestamp: DateTime<Utc>,
    pub client: String,
    pub op: String,
    pub target: String,
    pub code: Option<i32>,
    pub message: String,
}

impl CatalogEvent {
    pub fn from_error(client: &str, error: &CatalogError) -> Self {
        let (op, target, code, message) = match error {
            CatalogError::Call {
                op,
                target,
                code,
                message,
            } => (op.to_string(), target.clone(), Some(*code), message.clone()),
            CatalogError::Session(message) => {
                ("session".to_string(), String::new(), None, message.clone())
            }
        };

        CatalogEvent {
            timestamp: Utc::now(),
            client: client.to_string(),
            op,
            target,
            code,
            message,
        }
    }

    /// One-line rendering for terminal output
    pub fn to_text(&self) -> String {
        let code = self
            .code
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        format!(
            "[{}] {} {} {} failed (code {}): {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.client,
            self.op,
            self.target,
            code,
            self.message
        )
    }
}

/// Bounded record of catalog failures; the oldest event is dropped once full
pub struct EventLog {
    events: VecDeque<CatalogEvent>,
    max_size: usize,
}

impl EventLog {
    pub fn new(max_size: usize) -> Self {
        EventLog {
            events: VecDeque::new(),
            max_size,
        }
    }

    pub fn record(&mut self, event: CatalogEvent) {
        self.events.push_back(event);
        while self.events.len() > self.max_size {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Up to `n` most recent events, oldest first
    pub fn recent(&self, n: usize) -> Vec<CatalogEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// All events as JSON lines, oldest first
    pub fn export_jsonl(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
