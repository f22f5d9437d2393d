//! Parsing error types for catalog markup
//!
//! None of these abort a cycle: a missing container degrades a page to
//! empty, a failed field or validation drops a single listing.

use std::fmt;
use thiserror::Error;

/// One field-level validation diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Expected container '{selector}' not found ({context})")]
    StructureMissing {
        selector: String,
        context: &'static str,
    },

    #[error("Field extraction failed: {field} - {reason}")]
    FieldExtractionFailed {
        field: &'static str,
        reason: String,
        listing_index: usize,
    },

    #[error("Product validation failed for listing {}: {}", describe_listing(.external_id, .listing_index), join_fields(.field_errors))]
    ProductValidationFailed {
        external_id: Option<i64>,
        listing_index: usize,
        field_errors: Vec<FieldError>,
    },

    #[error("Invalid selector pattern: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid base URL: {url} - {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::ref_option)]
fn describe_listing(external_id: &Option<i64>, index: &usize) -> String {
    external_id.map_or_else(|| format!("#{index}"), |id| format!("{id} (#{index})"))
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ParsingError {
    pub fn structure_missing(selector: &str, context: &'static str) -> Self {
        Self::StructureMissing {
            selector: selector.to_string(),
            context,
        }
    }

    pub fn field_extraction_failed(field: &'static str, reason: impl Into<String>, listing_index: usize) -> Self {
        Self::FieldExtractionFailed {
            field,
            reason: reason.into(),
            listing_index,
        }
    }

    /// Field names this diagnostic is about
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::FieldExtractionFailed { field, .. } => vec![field],
            Self::ProductValidationFailed { field_errors, .. } => {
                field_errors.iter().map(|e| e.field).collect()
            }
            Self::StructureMissing { .. } | Self::InvalidSelector { .. } | Self::InvalidBaseUrl { .. } => {
                Vec::new()
            }
        }
    }

    pub fn invalid_base_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidBaseUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_field() {
        let error = ParsingError::ProductValidationFailed {
            external_id: Some(77),
            listing_index: 3,
            field_errors: vec![
                FieldError::new("name", "field required"),
                FieldError::new("image_url", "field required"),
            ],
        };
        let message = error.to_string();
        assert!(message.contains("77 (#3)"));
        assert!(message.contains("name: field required"));
        assert!(message.contains("image_url: field required"));
        assert_eq!(error.fields(), vec!["name", "image_url"]);
    }
}
