//! The `CallerId` value type.
//!
//! `CallerId` is an external collaborator in the original design: the core
//! only ever constructs it and reads it back, never mutates it in place.
//! `replace` returns a modified copy, taking an overrides struct of
//! `Option<T>` fields since Rust has no keyword arguments — the same shape
//! as the `ConditionUpdates` / `apply_condition_updates` pattern used for
//! partial updates elsewhere in the retrieved telephony stack.

use std::fmt;

/// An immutable caller identity: account code, display name, number, and
/// whether it may be shown to the far end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallerId {
    pub code: i64,
    pub name: String,
    pub number: String,
    pub is_public: bool,
}

/// Only the fields set to `Some` are applied by [`CallerId::replace`].
#[derive(Debug, Clone, Default)]
pub struct CallerIdOverrides {
    pub code: Option<i64>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub is_public: Option<bool>,
}

impl CallerIdOverrides {
    pub fn code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }
}

impl CallerId {
    pub fn new(code: i64, name: impl Into<String>, number: impl Into<String>, is_public: bool) -> Self {
        CallerId { code, name: name.into(), number: number.into(), is_public }
    }

    /// Return a copy with the given overrides applied, leaving unset fields
    /// untouched.
    pub fn replace(&self, overrides: CallerIdOverrides) -> CallerId {
        CallerId {
            code: overrides.code.unwrap_or(self.code),
            name: overrides.name.unwrap_or_else(|| self.name.clone()),
            number: overrides.number.unwrap_or_else(|| self.number.clone()),
            is_public: overrides.is_public.unwrap_or(self.is_public),
        }
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" <{}> (code={}, public={})", self.name, self.number, self.code, self.is_public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_only_overrides_present_fields() {
        let original = CallerId::new(0, "Foo Bar", "+31501234567", true);
        let replaced = original.replace(CallerIdOverrides::default().code(12668));

        assert_eq!(replaced.code, 12668);
        assert_eq!(replaced.name, original.name);
        assert_eq!(replaced.number, original.number);
        assert_eq!(replaced.is_public, original.is_public);
    }

    #[test]
    fn replace_can_override_several_fields_at_once() {
        let original = CallerId::new(5, "", "", false);
        let replaced = original.replace(
            CallerIdOverrides::default()
                .name("Dest Name")
                .number("200")
                .is_public(true),
        );

        assert_eq!(replaced.code, 5);
        assert_eq!(replaced.name, "Dest Name");
        assert_eq!(replaced.number, "200");
        assert!(replaced.is_public);
    }

    #[test]
    fn original_is_unchanged_by_replace() {
        let original = CallerId::new(1, "A", "B", true);
        let _ = original.replace(CallerIdOverrides::default().code(2));
        assert_eq!(original.code, 1);
    }
}
