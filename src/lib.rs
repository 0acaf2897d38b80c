pub mod checker;
pub mod config;
pub mod cpe;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod manifest;
pub mod matcher;
pub mod model;
pub mod output;
pub mod store;
pub mod translator;
pub mod version;

pub use checker::{DependencyChecker, NvdChecker, VulnerabilitySource};
pub use config::Settings;
pub use error::{Error, Result};
pub use model::{CveData, Ecosystem, FileLocation, Library, VulnerableUse};
