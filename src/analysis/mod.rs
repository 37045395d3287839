//! Static analyses over a [`crate::Program`].
//!
//! The transform passes only need a small slice of classic compiler analysis, and each piece is
//! kept in its own sub-module:
//!
//! - [`cfg`] - basic-block leader computation and block lookup
//! - [`defuse`] - whole-program definition resolution and operand-matching scans
//! - [`divergence`] - detection of blocks guarded for a single invocation
//!
//! All analyses are read-only and take the program by shared reference, so independent queries
//! can run concurrently.

pub mod cfg;
pub mod defuse;
pub mod divergence;

pub use divergence::SingleThread;
