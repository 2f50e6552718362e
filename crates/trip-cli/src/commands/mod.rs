//! CLI command implementations.

pub mod errors;
pub mod list;
pub mod run;
pub mod scan;
pub mod version;
