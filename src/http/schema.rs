//! The JSON-schema seam: validation outcome, the `SchemaValidator` trait,
//! and the default `jsonschema`-backed implementation.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::StepError;

/// Outcome of validating a document against a schema. `violations` holds
/// one human-readable entry per individual schema violation.
#[derive(Debug, Clone)]
pub struct Validation {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Validates a JSON document against a JSON schema, both given as text.
///
/// An `Err` from `validate` is a validator failure (malformed schema,
/// unparsable document), distinct from a validation mismatch, which is
/// reported through [`Validation`].
pub trait SchemaValidator {
    fn validate(&self, schema: &str, document: &str) -> Result<Validation, StepError>;
}

/// Default validator backed by the `jsonschema` crate. The schema is
/// compiled on every call; these are test-sized documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValidator;

impl SchemaValidator for DefaultValidator {
    fn validate(&self, schema: &str, document: &str) -> Result<Validation, StepError> {
        let schema: Value = serde_json::from_str(schema)
            .map_err(|e| StepError::Validator(format!("malformed schema: {e}")))?;
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| StepError::Validator(format!("malformed schema: {e}")))?;
        let document: Value = serde_json::from_str(document)
            .map_err(|e| StepError::Validator(format!("document is not JSON: {e}")))?;
        let violations = match compiled.validate(&document) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        };
        Ok(Validation {
            valid: violations.is_empty(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "Foo": { "type": "integer" }
        },
        "required": ["Foo"]
    }"#;

    #[test]
    fn valid_document_passes() {
        let validation = DefaultValidator
            .validate(SCHEMA, r#"{"Foo": 42}"#)
            .unwrap();
        assert!(validation.valid);
        assert!(validation.violations.is_empty());
    }

    #[test]
    fn violations_are_collected_individually() {
        let validation = DefaultValidator
            .validate(SCHEMA, r#"{"Foo": "not a number"}"#)
            .unwrap();
        assert!(!validation.valid);
        assert!(!validation.violations.is_empty());
    }

    #[test]
    fn malformed_schema_is_a_validator_error() {
        let error = DefaultValidator
            .validate("{not json", r#"{"Foo": 42}"#)
            .unwrap_err();
        assert!(matches!(error, StepError::Validator(_)));
    }

    #[test]
    fn non_json_document_is_a_validator_error() {
        let error = DefaultValidator.validate(SCHEMA, "not json").unwrap_err();
        assert!(matches!(error, StepError::Validator(_)));
    }
}
