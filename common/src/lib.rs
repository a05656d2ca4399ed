//! Workspace-wide helpers shared by the stretch engine and its tools.

pub mod float_ext;
pub mod log_setup;

pub use float_ext::FloatExt;

pub const EPSILON: f64 = 1e-6;
