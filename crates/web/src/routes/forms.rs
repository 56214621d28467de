//! Form validation helpers.

use std::collections::BTreeMap;

pub const BLANK: &str = "This field cannot be blank";

/// Validation errors collected while checking a submitted form.
///
/// Only the first error recorded for a field is kept.
#[derive(Debug, Clone, Default)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, String>,
    non_field: Vec<String>,
}

impl FormErrors {
    /// Record `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.add_field(field, message);
        }
    }

    pub fn add_field(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    /// Record an error not tied to one field, e.g. bad credentials.
    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    /// The error recorded for `field`, if any.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }
}

/// Whether the value contains something other than whitespace.
#[must_use]
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

#[must_use]
pub fn max_chars(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

#[must_use]
pub fn min_chars(value: &str, min: usize) -> bool {
    value.chars().count() >= min
}
