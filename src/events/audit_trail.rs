//! Append-only event log with an operator query interface.
//!
//! - Immutable append-only log (no deletion)
//! - Sequence numbers assigned on append
//! - Queries return newest first

use super::{EventKind, TreasuryEvent};
use crate::types::{Principal, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<TreasuryEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning its sequence number.
    pub fn append(&mut self, mut event: TreasuryEvent) -> &TreasuryEvent {
        event.seq = self.events.len() as u64;
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[TreasuryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn query(&self, query: &EventQuery) -> Vec<TreasuryEvent> {
        query_events(&self.events, query)
    }
}

/// Query options for the event log.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub kind: Option<EventKind>,
    pub actor: Option<Principal>,
    /// Exact entity match ("P-3", policy name, ...).
    pub entity: Option<String>,
    /// Only events strictly after this timestamp.
    pub after: Option<Timestamp>,
    /// Limit number of results (most recent first).
    pub limit: Option<usize>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            kind: None,
            actor: None,
            entity: None,
            after: None,
            limit: Some(50),
        }
    }
}

/// Filter events, newest first.
pub fn query_events(events: &[TreasuryEvent], query: &EventQuery) -> Vec<TreasuryEvent> {
    let mut filtered: Vec<TreasuryEvent> = events
        .iter()
        .filter(|event| {
            if query.kind.is_some_and(|kind| event.kind != kind) {
                return false;
            }
            if let Some(ref actor) = query.actor {
                if &event.actor != actor {
                    return false;
                }
            }
            if let Some(ref entity) = query.entity {
                if &event.entity != entity {
                    return false;
                }
            }
            if let Some(after) = query.after {
                if event.timestamp <= after {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();

    filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.seq.cmp(&a.seq)));

    if let Some(limit) = query.limit {
        filtered.truncate(limit);
    }

    filtered
}

/// Relative age of `timestamp` as seen at `now`.
fn describe_age(timestamp: Timestamp, now: Timestamp) -> String {
    if now < timestamp {
        return format!("Unix: {}", timestamp);
    }
    let elapsed = now - timestamp;
    match elapsed {
        0..=60 => "Just now".to_string(),
        61..=3600 => format!("{} min ago", elapsed / 60),
        3601..=86400 => format!("{} hours ago", elapsed / 3600),
        86401..=604800 => format!("{} days ago", elapsed / 86400),
        _ => format!("Unix: {}", timestamp),
    }
}

/// Format events for operator display.
pub fn format_events(events: &[TreasuryEvent], now: Timestamp) -> String {
    if events.is_empty() {
        return "No events found.".to_string();
    }

    let mut output = String::from("Treasury Event Log\n\n");

    for event in events {
        let mut line = format!(
            "#{} {} - {} {} by {}",
            event.seq,
            describe_age(event.timestamp, now),
            event.kind,
            event.entity,
            event.actor
        );
        if let Some(amount) = event.amount {
            line.push_str(&format!(" amount={}", amount));
        }
        if let Some(count) = event.count {
            line.push_str(&format!(" count={}", count));
        }
        output.push_str(&line);
        output.push('\n');
        if !event.details.is_empty() {
            output.push_str(&format!("  {}\n", event.details));
        }
        output.push('\n');
    }

    output.trim_end().to_string()
}
