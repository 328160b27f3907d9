//! Collects every problem with a request body before rejecting it, so the
//! client gets the full list in one response.

use crate::error::ApiError;

#[derive(Default)]
pub struct Checks {
    errors: Vec<String>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn not_empty(&mut self, value: &str, message: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), message)
    }

    pub fn email(&mut self, value: &str, message: &str) -> &mut Self {
        self.check(is_email(value), message)
    }

    /// Length in characters, inclusive bounds.
    pub fn length(&mut self, value: &str, min: usize, max: usize, message: &str) -> &mut Self {
        let len = value.chars().count();
        self.check((min..=max).contains(&len), message)
    }

    pub fn digits(&mut self, value: &str, min: usize, max: usize, message: &str) -> &mut Self {
        let ok = value.chars().all(|c| c.is_ascii_digit()) && (min..=max).contains(&value.len());
        self.check(ok, message)
    }

    pub fn equals(&mut self, value: &str, other: &str, message: &str) -> &mut Self {
        self.check(value == other, message)
    }

    pub fn check(&mut self, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(message.to_string());
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Deliberately loose: one `@`, something on each side, a dot in the domain.
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}
