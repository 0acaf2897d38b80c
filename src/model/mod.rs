//! Core data types for libraries, vulnerabilities, and analysis results.
//!
//! - [`Library`] - One declared/resolved dependency occurrence
//! - [`Ecosystem`] - The package manager a library was declared through
//! - [`CveData`] - A vulnerability record with its affected version ranges
//! - [`VulnerableUse`] - A (library, vulnerability) pair produced by matching
//! - [`FileLocation`] - A source location referencing a vulnerable library

mod library;
mod vulnerability;

pub use library::*;
pub use vulnerability::*;
