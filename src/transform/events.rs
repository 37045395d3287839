//! Change tracking for the transform pipeline.
//!
//! Passes never report what they did through return values alone: every line they rewrite,
//! disable, move or declare is recorded as an [`Event`] in the run's [`EventLog`]. The report
//! counts are derived from that log, and the log itself is what `--verbose` runs print.
//!
//! The log is append-only and backed by [`boxcar::Vec`], so passes record through the shared
//! [`crate::transform::TransformContext`] without locking.
//!
//! # Example
//!
//! ```rust
//! use spvgroup::transform::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::BroadcastInserted)
//!     .at(62)
//!     .pass("broadcast")
//!     .message("%29 = OpGroupNonUniformBroadcast %uint %uint_3 %uint_7 %uint_0");
//! log.record(EventKind::InstructionDisabled).at(56);
//!
//! assert_eq!(log.count_kind(EventKind::BroadcastInserted), 1);
//! assert_eq!(log.summary(), "1 broadcast inserted, 1 instruction disabled");
//! ```

use std::fmt;

use rustc_hash::FxHashMap;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// What an [`Event`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum EventKind {
    /// A shared-memory read became `OpGroupNonUniformBroadcast`.
    #[strum(serialize = "broadcast inserted")]
    BroadcastInserted,
    /// An `OpGroupNonUniform<Op> ... Reduce` was inserted.
    #[strum(serialize = "reduce inserted")]
    ReduceInserted,
    /// A line became `; NOP`.
    #[strum(serialize = "instruction disabled")]
    InstructionDisabled,
    /// A line moved so its definition precedes a new use.
    #[strum(serialize = "instruction relocated")]
    InstructionRelocated,
    /// A capability, type or constant was declared.
    #[strum(serialize = "declaration appended")]
    DeclarationAppended,
    /// A pass began.
    #[strum(serialize = "pass started")]
    PassStarted,
    /// A pass finished.
    #[strum(serialize = "pass completed")]
    PassCompleted,
    /// Informational note.
    #[strum(serialize = "info")]
    Info,
    /// A candidate was left untouched.
    #[strum(serialize = "warning")]
    Warning,
}

impl EventKind {
    /// Human-readable name, as printed in summaries.
    #[must_use]
    pub fn description(self) -> &'static str {
        self.into()
    }

    /// True for kinds that describe an edit of the program text.
    #[must_use]
    pub fn is_transformation(self) -> bool {
        matches!(
            self,
            Self::BroadcastInserted
                | Self::ReduceInserted
                | Self::InstructionDisabled
                | Self::InstructionRelocated
                | Self::DeclarationAppended
        )
    }
}

/// One recorded event.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Line position, valid for the program as it was when the event was recorded.
    pub location: Option<usize>,
    /// Name of the pass that recorded the event.
    pub pass: Option<&'static str>,
    /// Details, usually the affected instruction.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(location) = self.location {
            write!(f, " {location:3} |")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Pending event returned by [`EventLog::record`]; pushed to the log when dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    fn update(mut self, apply: impl FnOnce(&mut Event)) -> Self {
        if let Some(event) = self.event.as_mut() {
            apply(event);
        }
        self
    }

    /// Sets the line position.
    pub fn at(self, location: usize) -> Self {
        self.update(|event| event.location = Some(location))
    }

    /// Attributes the event to a pass.
    pub fn pass(self, name: &'static str) -> Self {
        self.update(|event| event.pass = Some(name))
    }

    /// Replaces the default message, which is the kind's description.
    pub fn message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.update(|event| event.message = message)
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.events.push(event);
        }
    }
}

/// Append-only log of the events of one run.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let copy = Self::new();
        for event in self.iter() {
            copy.events.push(event.clone());
        }
        copy
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts an event of `kind`. Chain [`EventBuilder`] setters to fill it in.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event {
                kind,
                location: None,
                pass: None,
                message: kind.description().to_string(),
            }),
        }
    }

    /// Events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().map(|(_, event)| event)
    }

    /// Events of one kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |event| event.kind == kind)
    }

    /// Events recorded by the named pass.
    pub fn filter_pass<'a>(&'a self, pass: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |event| event.pass == Some(pass))
    }

    /// Events that edited the program.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|event| event.kind.is_transformation())
    }

    /// Candidates that were skipped.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// True if at least one event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.filter_kind(kind).next().is_some()
    }

    /// Per-kind counts of the transformation events, e.g. `"2 broadcast inserted"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: FxHashMap<EventKind, usize> = FxHashMap::default();
        for event in self.transformations() {
            *counts.entry(event.kind).or_default() += 1;
        }

        let parts: Vec<String> = EventKind::iter()
            .filter_map(|kind| counts.get(&kind).map(|count| format!("{count} {kind}")))
            .collect();
        if parts.is_empty() {
            format!("{} events", self.len())
        } else {
            parts.join(", ")
        }
    }
}

/// Counts derived from an [`EventLog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedStats {
    /// Broadcasts inserted.
    pub broadcasts: usize,
    /// Reductions inserted.
    pub reductions: usize,
    /// Lines disabled, including the old slots of relocated lines.
    pub disabled: usize,
    /// Lines relocated.
    pub relocated: usize,
    /// Declarations appended.
    pub declarations: usize,
    /// Candidates skipped.
    pub warnings: usize,
}

impl DerivedStats {
    /// Tallies the events of `log`.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let mut stats = Self::default();
        for event in log.iter() {
            let counter = match event.kind {
                EventKind::BroadcastInserted => &mut stats.broadcasts,
                EventKind::ReduceInserted => &mut stats.reductions,
                EventKind::InstructionDisabled => &mut stats.disabled,
                EventKind::InstructionRelocated => &mut stats.relocated,
                EventKind::DeclarationAppended => &mut stats.declarations,
                EventKind::Warning => &mut stats.warnings,
                EventKind::PassStarted | EventKind::PassCompleted | EventKind::Info => continue,
            };
            *counter += 1;
        }
        stats
    }

    /// One-line summary such as `"1 broadcasts, 3 declarations"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            (self.broadcasts, "broadcasts"),
            (self.reductions, "reductions"),
            (self.disabled, "disabled"),
            (self.relocated, "relocated"),
            (self.declarations, "declarations"),
            (self.warnings, "warnings"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect();

        if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.summary(), "0 events");
        assert_eq!(DerivedStats::from_log(&log), DerivedStats::default());
    }

    #[test]
    fn builder_fills_in_event() {
        let log = EventLog::new();
        log.record(EventKind::ReduceInserted)
            .at(90)
            .pass("reduce")
            .message("%41 = OpGroupNonUniformIAdd %uint %uint_3 Reduce %31");
        log.record(EventKind::InstructionDisabled);

        let events: Vec<&Event> = log.iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].pass, Some("reduce"));
        assert_eq!(
            events[0].to_string(),
            "[reduce inserted]  90 | %41 = OpGroupNonUniformIAdd %uint %uint_3 Reduce %31"
        );
        assert_eq!(events[1].to_string(), "[instruction disabled] instruction disabled");
    }

    #[test]
    fn queries_and_counts() {
        let log = EventLog::new();
        log.record(EventKind::PassStarted).pass("broadcast");
        log.record(EventKind::InstructionDisabled).pass("broadcast");
        log.record(EventKind::BroadcastInserted).pass("broadcast");
        log.record(EventKind::BroadcastInserted).pass("broadcast");
        log.record(EventKind::DeclarationAppended).pass("broadcast");
        log.record(EventKind::Warning).pass("reduce").message("%41 left as is");

        assert_eq!(log.filter_pass("broadcast").count(), 5);
        assert_eq!(log.transformations().count(), 4);
        assert_eq!(log.warnings().count(), 1);
        assert!(!log.has(EventKind::ReduceInserted));
        assert_eq!(
            log.summary(),
            "2 broadcast inserted, 1 instruction disabled, 1 declaration appended"
        );

        let stats = DerivedStats::from_log(&log);
        assert_eq!(
            stats.to_string(),
            "2 broadcasts, 1 disabled, 1 declarations, 1 warnings"
        );
        assert_eq!(log.clone().len(), log.len());
    }

    #[test]
    fn concurrent_recording() {
        let log = EventLog::new();
        std::thread::scope(|scope| {
            for thread in 0..4 {
                let log = &log;
                scope.spawn(move || {
                    for index in 0..25 {
                        log.record(EventKind::Warning)
                            .message(format!("{thread}/{index}"));
                    }
                });
            }
        });
        assert_eq!(log.count_kind(EventKind::Warning), 100);
    }
}
