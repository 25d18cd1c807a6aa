//! Field-level validation errors
//!
//! Forms re-render these next to their inputs; the API returns them as the
//! `details` object of a 400 response.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Messages keyed by the name of the offending field.
///
/// Errors that do not belong to a single field use [`NON_FIELD_ERRORS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    messages: BTreeMap<String, Vec<String>>,
    /// Machine-readable codes, in the order they were added
    #[serde(skip)]
    codes: Vec<String>,
}

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field shorthand
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.messages
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record a message together with its error code
    pub fn add_with_code(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.add(field, message);
        self.codes.push(code.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.messages.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.messages.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Code of the first coded error, if any was recorded with one
    pub fn first_code(&self) -> Option<&str> {
        self.codes.first().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.messages {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_per_field() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("text", "This field is required.");
        errors.add("text", "Too short.");
        errors.add("group", "Select a valid choice.");

        assert_eq!(errors.get("text").len(), 2);
        assert!(errors.contains("group"));
        assert!(errors.get("image").is_empty());
        assert_eq!(
            errors.to_string(),
            "group: Select a valid choice.; text: This field is required.; text: Too short."
        );
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let errors = FieldErrors::single("following", "Already following.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"following": ["Already following."]}));
    }

    #[test]
    fn test_codes() {
        let mut errors = FieldErrors::single("text", "This field is required.");
        assert_eq!(errors.first_code(), None);

        errors.add_with_code("image", "invalid_image", "Upload a valid image.");
        assert_eq!(errors.first_code(), Some("invalid_image"));
        assert_eq!(errors.get("image"), ["Upload a valid image.".to_string()]);
    }
}
