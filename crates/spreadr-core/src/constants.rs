//! Package-level constants.

/// Current version of the spreadr platform (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Platform name.
pub const NAME: &str = "spreadr";
