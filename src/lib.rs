//! Profile-driven adaptation of quantum IR modules.
//!
//! The rewriting engine lives in `qat-rules`; this crate assembles it into
//! [`Profile`]s from TOML configuration and provides the `qat` command line.

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod profile;
pub mod validator;

pub use config::{ConfigSection, ConfigurationManager};
pub use error::QatError;
pub use generator::{AllocationConfig, ProfileGenerator};
pub use profile::{Profile, ProfileBuilder, ProfileKind};
pub use validator::{ProfileValidator, ValidationConfig, Violation};
