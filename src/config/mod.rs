//! Configuration module for the stackplan deployment system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `stackplan.yaml`
//! - Validation of stack names and dependency references
//! - Fingerprinting stack inputs and template resources for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    DEFAULT_STATE_DIR, ProjectConfig, ProjectSettings, RunSettings, StackConfig, StateConfig,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::ConfigHasher;
