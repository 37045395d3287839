//! Shared state threaded through every pass of a run.

use crate::transform::{config::TransformConfig, events::EventLog};

/// State shared by all passes of one [`crate::Transformer::run`].
///
/// Passes receive the context by shared reference: they read the configuration and append to
/// the event log, and never mutate anything else through it.
#[derive(Debug, Default)]
pub struct TransformContext {
    /// Configuration for this run.
    pub config: TransformConfig,

    /// Accumulated events from all passes.
    pub events: EventLog,
}

impl TransformContext {
    /// Creates a context with an empty event log.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            events: EventLog::new(),
        }
    }

    /// The subgroup scope operand every inserted collective uses, e.g. `%uint_3`.
    #[must_use]
    pub fn scope_operand(&self) -> String {
        self.config.scope_operand()
    }

    /// Consumes the context, returning its event log.
    #[must_use]
    pub fn into_events(self) -> EventLog {
        self.events
    }
}
