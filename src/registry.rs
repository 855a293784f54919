use std::collections::HashMap;

use crate::error::{Result, SalesError};

/// Maps a format name (a file extension or output type) to the strategy that
/// handles it.
///
/// Keys are case-insensitive and a leading `.` is ignored, so `".CSV"` and
/// `"csv"` name the same entry.
pub struct Registry<T: ?Sized> {
    entries: HashMap<String, Box<T>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `format`, replacing any previous entry.
    pub fn register(&mut self, format: &str, handler: Box<T>) {
        self.entries.insert(normalize(format), handler);
    }

    /// Returns the handler for `format`.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::UnsupportedFormat`] if nothing is registered for
    /// `format`.
    pub fn get(&self, format: &str) -> Result<&T> {
        self.entries
            .get(&normalize(format))
            .map(|handler| &**handler)
            .ok_or_else(|| SalesError::UnsupportedFormat(format.to_string()))
    }

    #[must_use]
    pub fn supports(&self, format: &str) -> bool {
        self.entries.contains_key(&normalize(format))
    }
}

fn normalize(format: &str) -> String {
    format.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named {
        fn name(&self) -> &'static str;
    }

    struct Foo;

    impl Named for Foo {
        fn name(&self) -> &'static str {
            "foo"
        }
    }

    #[test]
    fn get_fn_ignores_case_and_leading_dot() {
        let mut registry: Registry<dyn Named> = Registry::new();
        registry.register("foo", Box::new(Foo));
        assert_eq!(registry.get(".FOO").unwrap().name(), "foo");
        assert!(registry.supports("Foo"));
        assert!(!registry.supports("bar"));
    }

    #[test]
    fn get_fn_returns_unsupported_format_for_unknown_key() {
        let registry: Registry<dyn Named> = Registry::new();
        assert!(matches!(
            registry.get("xml"),
            Err(SalesError::UnsupportedFormat(f)) if f == "xml"
        ));
    }
}
