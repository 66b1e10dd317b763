//! Structured run events
//!
//! The engine reports what happened during a run (budget exhaustion,
//! arrangement passes, list cleaning) to a caller-provided collector.
//! Events carry an offset from run start rather than absolute times so
//! re-runs on identical input produce comparable traces.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// EVENT TYPES
// ============================================================================

/// Kinds of events a run can emit
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The traversal budget was exhausted; the run returned partial results
    LimitReached,
    /// One arrangement invocation completed
    Arrangement,
    /// Semantic cleaning removed outliers from a leaf list
    Cleaning,
}

impl EventKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LimitReached => "limit_reached",
            EventKind::Arrangement => "arrangement",
            EventKind::Cleaning => "cleaning",
        }
    }
}

/// A single recorded event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// Seconds since the collector was created
    pub offset_secs: f64,
    /// Where it happened (a node name or similar), if known
    pub context: Option<String>,
    /// Human-readable description
    pub message: String,
    /// Structured details
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Collects structured events during a generation run
#[derive(Debug)]
pub struct EventCollector {
    started_at: DateTime<Utc>,
    start: Instant,
    events: Vec<Event>,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCollector {
    /// Create a collector; the creation instant is the zero offset
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
            events: Vec::new(),
        }
    }

    /// Record an event
    pub fn record(
        &mut self,
        kind: EventKind,
        message: impl Into<String>,
        context: Option<&str>,
        data: Option<Map<String, Value>>,
    ) {
        self.events.push(Event {
            kind,
            offset_secs: self.start.elapsed().as_secs_f64(),
            context: context.map(str::to_string),
            message: message.into(),
            data: data.unwrap_or_default(),
        });
    }

    /// When the collector was created (wall clock)
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// All recorded events, in order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of one kind, in order
    pub fn events_of(&self, kind: EventKind) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    /// Count of events of one kind
    pub fn count_of(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
