//! The transform pipeline.
//!
//! [`Transformer`] owns the configured passes and drives them over a [`Program`]. Passes run
//! strictly in sequence (broadcast, then reduce); each one detects candidates afresh on the
//! program left by its predecessor, so no position captured before an edit is ever reused.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{
    file,
    program::Program,
    transform::{
        broadcast::BroadcastPass,
        config::TransformConfig,
        context::TransformContext,
        events::{DerivedStats, EventKind, EventLog},
        pass::TransformPass,
        reduce::ReducePass,
    },
    Result,
};

/// Outcome of one [`Transformer::run`].
///
/// Counts are derived from the event log; the log itself is kept for detailed inspection.
#[derive(Debug, Clone)]
pub struct TransformReport {
    /// Number of broadcasts inserted.
    pub broadcasts: usize,
    /// Number of reductions inserted.
    pub reductions: usize,
    /// Number of declarations appended.
    pub declarations: usize,
    /// All events from the run.
    pub events: EventLog,
    /// Total processing time.
    pub total_time: Duration,
}

impl TransformReport {
    /// Builds a report from the events of a finished run.
    #[must_use]
    pub fn new(events: EventLog, total_time: Duration) -> Self {
        let stats = DerivedStats::from_log(&events);
        Self {
            broadcasts: stats.broadcasts,
            reductions: stats.reductions,
            declarations: stats.declarations,
            events,
            total_time,
        }
    }

    /// True if any rewrite fired.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.broadcasts > 0 || self.reductions > 0
    }

    /// Computes statistics derived from the event log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events)
    }

    /// Generates a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        self.stats().summary()
    }
}

/// Runs the subgroup rewrites over SPIR-V assembly.
///
/// # Example
///
/// ```rust
/// use spvgroup::{TransformConfig, Transformer};
///
/// let transformer = Transformer::new(TransformConfig::default());
/// let (output, report) = transformer.transform_str("OpCapability Shader\n")?;
///
/// assert_eq!(output, "OpCapability Shader\n");
/// assert!(!report.changed());
/// # Ok::<(), spvgroup::Error>(())
/// ```
pub struct Transformer {
    /// Configuration.
    config: TransformConfig,
    /// Passes in execution order.
    passes: Vec<Box<dyn TransformPass>>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(TransformConfig::default())
    }
}

impl Transformer {
    /// Creates a transformer running the passes `config` enables.
    ///
    /// # Arguments
    ///
    /// * `config` - Selects the rewrites and the detection mode.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        let candidates: Vec<Box<dyn TransformPass>> =
            vec![Box::new(BroadcastPass::new()), Box::new(ReducePass::new())];
        let passes = candidates
            .into_iter()
            .filter(|pass| pass.is_enabled(&config))
            .collect();

        Self { config, passes }
    }

    /// The configuration this transformer was built with.
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Names of the enabled passes, in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Rewrites `program` in place.
    ///
    /// # Errors
    ///
    /// The first error reported by a pass. The program may be partially rewritten when this
    /// happens and should be discarded.
    pub fn run(&self, program: &mut Program) -> Result<TransformReport> {
        let start = Instant::now();
        let ctx = TransformContext::new(self.config.clone());

        debug!("leaders: {:?}", program.leaders());
        debug!("input program:\n{}", program.listing());

        let mut changed_any = false;
        for pass in &self.passes {
            ctx.events
                .record(EventKind::PassStarted)
                .pass(pass.name())
                .message(pass.description());

            let changed = pass.run(program, &ctx)?;
            changed_any |= changed;

            ctx.events
                .record(EventKind::PassCompleted)
                .pass(pass.name())
                .message(if changed { "changed" } else { "unchanged" });
            debug!("{}: {}", pass.name(), if changed { "changed" } else { "unchanged" });
        }

        if !changed_any && !self.passes.is_empty() {
            ctx.events
                .record(EventKind::Info)
                .message("no broadcast or reduce idiom found");
        }

        let report = TransformReport::new(ctx.into_events(), start.elapsed());
        if report.changed() {
            debug!("output program:\n{}", program.listing());
        }
        info!("Transform complete: {}", report.summary());
        Ok(report)
    }

    /// Parses `text`, rewrites it and serializes the result.
    ///
    /// # Errors
    ///
    /// Parse errors, and the errors of [`Transformer::run`].
    pub fn transform_str(&self, text: &str) -> Result<(String, TransformReport)> {
        let mut program = Program::parse(text)?;
        let report = self.run(&mut program)?;
        Ok((program.to_string(), report))
    }

    /// Reads `input`, rewrites it, and atomically writes the result to `output`.
    ///
    /// Nothing is written unless the whole pipeline succeeds.
    ///
    /// # Errors
    ///
    /// [`crate::Error::FileError`] for I/O failures, and the errors of
    /// [`Transformer::transform_str`].
    pub fn process_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<TransformReport> {
        let source = file::read_source(input.as_ref())?;
        let (text, report) = self.transform_str(&source)?;
        file::write_atomic(output.as_ref(), &text)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{BROADCAST_SAMPLE, NO_IDIOM_SAMPLE, REDUCE_SAMPLE},
        Error,
    };

    #[test]
    fn passes_follow_config() {
        let all: Vec<_> = Transformer::default().pass_names().collect();
        assert_eq!(all, ["broadcast", "reduce"]);

        let reduce_only = Transformer::new(TransformConfig::new().with_broadcast(false));
        assert_eq!(reduce_only.pass_names().collect::<Vec<_>>(), ["reduce"]);

        assert_eq!(
            Transformer::new(TransformConfig::disabled())
                .pass_names()
                .count(),
            0
        );
    }

    #[test]
    fn report_counts_rewrites() {
        let transformer = Transformer::default();

        let (_, report) = transformer.transform_str(BROADCAST_SAMPLE).unwrap();
        assert!(report.changed());
        assert_eq!((report.broadcasts, report.reductions), (1, 0));
        assert_eq!(report.declarations, 3);

        let (_, report) = transformer.transform_str(REDUCE_SAMPLE).unwrap();
        assert_eq!((report.broadcasts, report.reductions), (0, 1));
        assert_eq!(report.events.count_kind(EventKind::PassStarted), 2);
        assert_eq!(report.events.count_kind(EventKind::PassCompleted), 2);
    }

    #[test]
    fn unchanged_program_reports_nothing() {
        let (output, report) = Transformer::default()
            .transform_str(NO_IDIOM_SAMPLE)
            .unwrap();
        assert_eq!(output, NO_IDIOM_SAMPLE);
        assert!(!report.changed());
        assert_eq!(report.summary(), "no transformations");
        assert!(report.events.has(EventKind::Info));
    }

    #[test]
    fn disabled_config_keeps_idioms() {
        let (output, report) = Transformer::new(TransformConfig::disabled())
            .transform_str(BROADCAST_SAMPLE)
            .unwrap();
        assert_eq!(output, BROADCAST_SAMPLE);
        assert!(report.events.is_empty());
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(
            Transformer::default().transform_str(""),
            Err(Error::Empty)
        ));
    }
}
