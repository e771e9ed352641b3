//! Workspace root crate.
//!
//! Re-exports the plant model, alarm rules and scenario engine so integration
//! tests can depend on a single crate.

pub use controller::*;
pub use safety::*;
pub use sim::*;
