//! Shared domain types for the Methu forecast timelapse.

pub mod config;
pub mod naming;
pub mod report;

mod errors;

pub use errors::{AssemblyError, ConvertError, FetchError, MethuError, Result};
