//! Configuration for the transform pipeline.

/// Default name of the subgroup scope constant, without the leading `%`.
pub const DEFAULT_SCOPE_CONSTANT: &str = "uint_3";

/// Value of the `Subgroup` execution scope.
pub const SUBGROUP_SCOPE: u32 = 3;

/// Configuration for the [`crate::Transformer`].
///
/// Controls which rewrites run and how candidates are detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Run the broadcast rewrite (default: true).
    pub broadcast: bool,

    /// Run the reduce rewrite (default: true).
    pub reduce: bool,

    /// Run the pattern detectors concurrently on the rayon pool (default: true).
    pub parallel_detection: bool,

    /// Name of the `OpConstant` used as the subgroup scope operand, without the `%`
    /// (default: `uint_3`).
    pub scope_constant: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            broadcast: true,
            reduce: true,
            parallel_detection: true,
            scope_constant: DEFAULT_SCOPE_CONSTANT.to_string(),
        }
    }
}

impl TransformConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that runs no rewrite at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            broadcast: false,
            reduce: false,
            ..Self::default()
        }
    }

    /// Enables or disables the broadcast rewrite.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_broadcast(mut self, enable: bool) -> Self {
        self.broadcast = enable;
        self
    }

    /// Enables or disables the reduce rewrite.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_reduce(mut self, enable: bool) -> Self {
        self.reduce = enable;
        self
    }

    /// Selects concurrent or sequential pattern detection.
    #[must_use]
    pub fn with_parallel_detection(mut self, enable: bool) -> Self {
        self.parallel_detection = enable;
        self
    }

    /// Overrides the name of the subgroup scope constant.
    ///
    /// # Arguments
    ///
    /// * `name` - Constant name without the leading `%`, e.g. `uint_3`.
    #[must_use]
    pub fn with_scope_constant(mut self, name: impl Into<String>) -> Self {
        self.scope_constant = name.into();
        self
    }

    /// The scope constant as an operand, e.g. `%uint_3`.
    #[must_use]
    pub fn scope_operand(&self) -> String {
        format!("%{}", self.scope_constant)
    }

    /// True if at least one rewrite is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.broadcast || self.reduce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransformConfig::default();
        assert!(config.broadcast);
        assert!(config.reduce);
        assert!(config.parallel_detection);
        assert_eq!(config.scope_operand(), "%uint_3");
        assert!(config.any_enabled());
    }

    #[test]
    fn builder_pattern() {
        let config = TransformConfig::new()
            .with_reduce(false)
            .with_parallel_detection(false)
            .with_scope_constant("scope_subgroup");

        assert!(config.broadcast);
        assert!(!config.reduce);
        assert!(!config.parallel_detection);
        assert_eq!(config.scope_operand(), "%scope_subgroup");
    }

    #[test]
    fn disabled_config() {
        assert!(!TransformConfig::disabled().any_enabled());
        assert!(TransformConfig::disabled().with_broadcast(true).any_enabled());
    }
}
