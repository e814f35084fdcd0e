//! Privacy sanitization seam.
//!
//! Sanitization runs before anything else in the router and is the only
//! stage whose failure is fatal to a request. The default implementation
//! redacts obvious personal identifiers with fixed placeholder tags; a
//! real deployment can inject its own `Sanitizer`.

use regex::Regex;

use crate::error::PrivacyError;

/// Sanitizes raw user text before classification, storage, or any
/// responder sees it. Must be deterministic and side-effect-free.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, text: &str) -> Result<String, PrivacyError>;
}

/// Regex-based anonymizer: emails become `[EMAIL]`, ten-digit phone
/// numbers become `[PHONE]`.
pub struct RegexSanitizer {
    email: Regex,
    phone: Regex,
}

impl RegexSanitizer {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"\b\w+@\w+\.\w+\b").unwrap(),
            phone: Regex::new(r"\b\d{10}\b").unwrap(),
        }
    }
}

impl Default for RegexSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for RegexSanitizer {
    fn sanitize(&self, text: &str) -> Result<String, PrivacyError> {
        let text = self.phone.replace_all(text, "[PHONE]");
        let text = self.email.replace_all(&text, "[EMAIL]");
        Ok(text.into_owned())
    }
}
