//! Outcome records returned across the engine's public contract
//!
//! The orchestrator and resolver never let an error escape as `Err`; the
//! host consumes these records to decide logging, alerting, and whether
//! startup proceeds.

use crate::errors::MigrationError;

/// Outcome of a migration run.
///
/// `success == true` implies `error_message` is empty and `source` is `None`.
#[derive(Debug)]
pub struct MigrationResult {
    pub success: bool,
    pub message: String,
    pub error_message: String,
    /// The underlying failure, preserved for diagnostics
    pub source: Option<MigrationError>,
    /// Whether the run found no database and had to (attempt to) create one
    pub requires_database_creation: bool,
}

impl MigrationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_message: String::new(),
            source: None,
            requires_database_creation: false,
        }
    }

    pub fn failed(error_message: impl Into<String>, source: MigrationError) -> Self {
        Self {
            success: false,
            message: String::new(),
            error_message: error_message.into(),
            source: Some(source),
            requires_database_creation: false,
        }
    }

    pub fn with_database_creation(mut self) -> Self {
        self.requires_database_creation = true;
        self
    }
}

/// Outcome of the startup validation pass.
///
/// Validation only reports; it never repairs. `action_required` carries the
/// operator remediation steps verbatim, ready to paste into a shell.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error_message: String,
    pub action_required: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: String::new(),
            action_required: String::new(),
        }
    }

    pub fn invalid(error_message: impl Into<String>, action_required: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: error_message.into(),
            action_required: action_required.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DbErr;

    #[test]
    fn test_success_leaves_error_fields_empty() {
        let result = MigrationResult::ok("Applied 3 migration(s)");
        assert!(result.success);
        assert!(result.error_message.is_empty());
        assert!(result.source.is_none());
        assert!(!result.requires_database_creation);
    }

    #[test]
    fn test_failure_preserves_source() {
        let source = MigrationError::Database(DbErr::Custom("boom".to_string()));
        let result = MigrationResult::failed("migration failed", source);
        assert!(!result.success);
        assert_eq!(result.error_message, "migration failed");
        assert!(result.source.is_some());
    }

    #[test]
    fn test_database_creation_flag() {
        let result = MigrationResult::ok("created").with_database_creation();
        assert!(result.requires_database_creation);
    }

    #[test]
    fn test_validation_constructors() {
        assert!(ValidationResult::valid().is_valid);

        let invalid = ValidationResult::invalid("missing tables", "run migrations");
        assert!(!invalid.is_valid);
        assert_eq!(invalid.action_required, "run migrations");
    }
}
