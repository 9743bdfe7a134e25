//! Field-level request validation.
//!
//! Requests implement [`Validate`]; implementations push every problem into
//! an [`Issues`] collector so the caller sees all of them at once instead of
//! fixing one field per round-trip.

use std::fmt::Display;
use std::ops::RangeInclusive;

use crate::error::{FieldIssue, FocusError, Result};
use crate::media::{DataUri, MediaKind};

/// Implemented by every inbound request type.
pub trait Validate {
    /// Checks every field, returning `FocusError::InvalidRequest` listing all
    /// problems found.
    fn validate(&self) -> Result<()>;
}

/// Accumulates [`FieldIssue`]s for one request.
#[derive(Debug, Default)]
pub struct Issues {
    issues: Vec<FieldIssue>,
}

impl Issues {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a problem with `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, message));
    }

    /// Requires `value` to contain 1..=`max_chars` characters after trimming.
    pub fn text(&mut self, field: impl Into<String>, value: &str, max_chars: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.push(field, "must not be empty");
        } else if trimmed.chars().count() > max_chars {
            self.push(field, format!("must be at most {max_chars} characters"));
        }
    }

    /// Like [`Issues::text`], but an absent value is accepted.
    pub fn optional_text(
        &mut self,
        field: impl Into<String>,
        value: Option<&str>,
        max_chars: usize,
    ) {
        if let Some(value) = value {
            if value.trim().chars().count() > max_chars {
                self.push(field, format!("must be at most {max_chars} characters"));
            }
        }
    }

    /// Requires `value` to lie within `range`.
    pub fn within<T>(&mut self, field: impl Into<String>, value: T, range: &RangeInclusive<T>)
    where
        T: PartialOrd + Display,
    {
        if !range.contains(&value) {
            self.push(
                field,
                format!("must be between {} and {}", range.start(), range.end()),
            );
        }
    }

    /// Requires `value` to be a base64 data URI of the given media kind.
    pub fn data_uri(&mut self, field: impl Into<String>, value: &str, kind: MediaKind) {
        if let Err(e) = DataUri::parse(value, kind) {
            self.push(field, e.to_string());
        }
    }

    /// Returns `true` if no issue has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Converts the collected issues into a result.
    pub fn finish(self) -> Result<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(FocusError::InvalidRequest {
                issues: self.issues,
            })
        }
    }
}
