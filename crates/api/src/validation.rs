//! Request validation.
//!
//! Limits come from [`ValidationRules`], built once from [`Config`] at start-up
//! and carried in the router state.

use crate::config::Config;
use crate::error::ApiError;

/// Field-level limits applied to incoming requests before any storage access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_line_quantity: u32,
    pub max_notes_length: usize,
}

impl ValidationRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_line_quantity: config.max_line_quantity,
            max_notes_length: config.max_notes_length,
        }
    }

    /// A cart line quantity: at least one and at most the configured maximum.
    pub fn quantity(&self, raw: i64) -> Result<u32, ApiError> {
        if raw < 1 {
            return Err(ApiError::BadRequest(format!(
                "quantity must be at least 1, got {raw}"
            )));
        }
        u32::try_from(raw)
            .ok()
            .filter(|q| *q <= self.max_line_quantity)
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "quantity must be at most {}, got {raw}",
                    self.max_line_quantity
                ))
            })
    }

    /// A required text field, trimmed.
    pub fn required(&self, field: &str, value: &str) -> Result<String, ApiError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ApiError::BadRequest(format!("{field} is required")));
        }
        Ok(value.to_string())
    }

    /// Optional free-form notes. Blank notes are dropped.
    pub fn notes(&self, notes: Option<String>) -> Result<Option<String>, ApiError> {
        let Some(notes) = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        if notes.chars().count() > self.max_notes_length {
            return Err(ApiError::BadRequest(format!(
                "notes must be at most {} characters",
                self.max_notes_length
            )));
        }
        Ok(Some(notes))
    }

    /// An optional short text value such as a tracking number.
    pub fn optional(&self, value: Option<String>) -> Option<String> {
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
