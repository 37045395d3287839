//! Pass trait for the transform pipeline.
//!
//! Every rewrite implements [`TransformPass`]. The [`crate::Transformer`] runs its passes in a
//! fixed order (broadcast, then reduce), each one re-detecting candidates on the program state
//! left by the previous pass.

use crate::{
    program::Program,
    transform::{config::TransformConfig, context::TransformContext},
    Result,
};

/// A rewrite over a whole [`Program`].
///
/// Passes must be thread-safe (Send + Sync) so a configured [`crate::Transformer`] can be
/// shared. They receive mutable access to the program and shared access to the context.
pub trait TransformPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Should this pass run under the given configuration?
    fn is_enabled(&self, _config: &TransformConfig) -> bool {
        true
    }

    /// Runs the pass.
    ///
    /// Returns `true` if the program was changed. Events are recorded directly to
    /// `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program violates an invariant the pass relies on, such as a
    /// dangling identifier. The program may be partially rewritten when this happens.
    fn run(&self, program: &mut Program, ctx: &TransformContext) -> Result<bool>;
}
