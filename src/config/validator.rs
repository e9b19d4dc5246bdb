//! Configuration validation for project files.
//!
//! This module checks names, duplicates and dependency references before a
//! project configuration is turned into a stack graph. Cycles are left to
//! the dependency resolver, which reports them per target.

use crate::error::{ConfigError, Result, StackplanError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{ProjectConfig, StackConfig};

/// Validator for project configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Whether template files must exist on disk.
    check_templates: bool,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
    /// Structured error, when one applies.
    kind: Option<ConfigError>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            check_templates: false,
        }
    }

    /// Also requires every template file to exist.
    #[must_use]
    pub const fn with_template_check(mut self, check: bool) -> Self {
        self.check_templates = check;
        self
    }

    /// Runs every check and collects all errors and warnings.
    #[must_use]
    pub fn check(&self, config: &ProjectConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_project(config, &mut result);
        self.validate_stacks(config, &mut result);
        Self::validate_dependencies(&config.stacks, &mut result);
        Self::validate_settings(config, &mut result);

        debug!(
            "Configuration check found {} errors, {} warnings",
            result.errors.len(),
            result.warnings.len()
        );
        result
    }

    /// Validates a project configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &ProjectConfig) -> Result<ValidationResult> {
        let mut result = self.check(config);

        if result.errors.is_empty() {
            Ok(result)
        } else {
            let first = result.errors.remove(0);
            Err(StackplanError::Config(first.into_config_error()))
        }
    }

    /// Validates project settings.
    fn validate_project(config: &ProjectConfig, result: &mut ValidationResult) {
        if config.project.name.trim().is_empty() {
            result.errors.push(ValidationError::new(
                "project.name",
                "Project name cannot be empty",
            ));
        }

        if config.stacks.is_empty() {
            result
                .warnings
                .push(String::from("No stacks are defined in this project"));
        }
    }

    /// Validates stack names and templates.
    fn validate_stacks(&self, config: &ProjectConfig, result: &mut ValidationResult) {
        let mut names = HashSet::new();

        for (i, stack) in config.stacks.iter().enumerate() {
            let field = format!("stacks[{i}]");

            if !is_valid_stack_name(&stack.name) {
                result.errors.push(ValidationError::new(
                    format!("{field}.name"),
                    format!(
                        "Invalid stack name '{}': use lowercase segments of letters, digits, '-' or '_' separated by '/'",
                        stack.name
                    ),
                ));
            }

            if !names.insert(stack.name.as_str()) {
                result.errors.push(ValidationError::with_kind(
                    format!("{field}.name"),
                    ConfigError::DuplicateStack {
                        name: stack.name.clone(),
                    },
                ));
            }

            if stack.template.trim().is_empty() {
                result.errors.push(ValidationError::new(
                    format!("{field}.template"),
                    format!("Stack '{}' has no template", stack.name),
                ));
            } else if self.check_templates && !config.resolve_path(&stack.template).exists() {
                result.errors.push(ValidationError::new(
                    format!("{field}.template"),
                    format!("Template not found: {}", stack.template),
                ));
            }
        }

        // A stack name that is also a group prefix makes targets ambiguous
        for stack in &config.stacks {
            let prefix = format!("{}/", stack.name);
            if config.stacks.iter().any(|other| other.name.starts_with(&prefix)) {
                result.warnings.push(format!(
                    "Stack '{}' shares its name with a stack group; the path will target the stack only",
                    stack.name
                ));
            }
        }
    }

    /// Validates that every dependency names a configured stack.
    fn validate_dependencies(stacks: &[StackConfig], result: &mut ValidationResult) {
        let known: HashSet<&str> = stacks.iter().map(|s| s.name.as_str()).collect();

        for (i, stack) in stacks.iter().enumerate() {
            for dependency in &stack.dependencies {
                if !known.contains(dependency.as_str()) {
                    result.errors.push(ValidationError::with_kind(
                        format!("stacks[{i}].dependencies"),
                        ConfigError::UnknownDependency {
                            stack: stack.name.clone(),
                            dependency: dependency.clone(),
                        },
                    ));
                }
            }

            let mut seen = HashSet::new();
            for dependency in &stack.dependencies {
                if !seen.insert(dependency.as_str()) {
                    result.warnings.push(format!(
                        "Stack '{}' lists dependency '{dependency}' more than once",
                        stack.name
                    ));
                }
            }
        }
    }

    /// Validates orchestration settings.
    fn validate_settings(config: &ProjectConfig, result: &mut ValidationResult) {
        if config.settings.change_set_timeout_secs == Some(0) {
            result.errors.push(ValidationError::new(
                "settings.change_set_timeout_secs",
                "Change set timeout must be greater than zero",
            ));
        }
    }
}

/// Validates a path-like stack name.
fn is_valid_stack_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
        return false;
    }

    name.split('/').all(|segment| {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        (first.is_ascii_lowercase() || first.is_ascii_digit())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    })
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: None,
        }
    }

    fn with_kind(field: impl Into<String>, kind: ConfigError) -> Self {
        Self {
            field: field.into(),
            message: kind.to_string(),
            kind: Some(kind),
        }
    }

    fn into_config_error(self) -> ConfigError {
        match self.kind {
            Some(kind) => kind,
            None => ConfigError::validation(self.message, self.field),
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> ProjectConfig {
        ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("test config parses")
    }

    #[test]
    fn test_valid_stack_name() {
        assert!(is_valid_stack_name("vpc"));
        assert!(is_valid_stack_name("dev/vpc"));
        assert!(is_valid_stack_name("dev/app/web_1"));
        assert!(is_valid_stack_name("eu-west-1/dns"));
    }

    #[test]
    fn test_invalid_stack_name() {
        assert!(!is_valid_stack_name(""));
        assert!(!is_valid_stack_name("/dev"));
        assert!(!is_valid_stack_name("dev/"));
        assert!(!is_valid_stack_name("dev//vpc"));
        assert!(!is_valid_stack_name("Dev/vpc"));
        assert!(!is_valid_stack_name("dev/-vpc"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let config = parse(
            r"
project:
  name: infra
stacks:
  - name: dev/app
    template: app.yaml
    dependencies: [dev/vpc]
",
        );
        let result = ConfigValidator::new().validate(&config);
        assert!(matches!(
            result,
            Err(StackplanError::Config(ConfigError::UnknownDependency { ref dependency, .. }))
                if dependency == "dev/vpc"
        ));
    }

    #[test]
    fn test_duplicate_stack_rejected() {
        let config = parse(
            r"
project:
  name: infra
stacks:
  - name: dev/vpc
    template: a.yaml
  - name: dev/vpc
    template: b.yaml
",
        );
        let result = ConfigValidator::new().validate(&config);
        assert!(matches!(
            result,
            Err(StackplanError::Config(ConfigError::DuplicateStack { .. }))
        ));
    }

    #[test]
    fn test_check_collects_every_error() {
        let config = parse(
            r"
project:
  name: ''
settings:
  change_set_timeout_secs: 0
stacks:
  - name: Dev/vpc
    template: vpc.yaml
  - name: dev/app
    template: app.yaml
    dependencies: [dev/db]
",
        );
        let result = ConfigValidator::new().check(&config);
        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 4);

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"project.name"));

        // validate still stops at the first one
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let config = parse(
            r"
project:
  name: infra
stacks:
  - name: dev
    template: root.yaml
  - name: dev/vpc
    template: vpc.yaml
    dependencies: [dev, dev]
",
        );
        let result = ConfigValidator::new()
            .validate(&config)
            .expect("config is valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = parse(
            r"
project:
  name: infra
settings:
  change_set_timeout_secs: 0
",
        );
        assert!(ConfigValidator::new().validate(&config).is_err());
    }
}
