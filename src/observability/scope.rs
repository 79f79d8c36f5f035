//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// A scope that logs begin, complete and failure events for one operation
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope; `fields` are repeated on every line
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        let event = format!("{}_BEGIN", name);
        Logger::info(&event, fields);

        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
        }
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    /// Mark the scope as successfully completed with additional fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let event = format!("{}_COMPLETE", self.name);
        let elapsed = self.started.elapsed().as_millis().to_string();

        let mut all_fields = self.field_refs();
        all_fields.extend(extra_fields.iter().copied());
        all_fields.push(("elapsed_ms", &elapsed));

        Logger::info(&event, &all_fields);
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as failed with a reason
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        let event = format!("{}_FAILED", self.name);
        let mut all_fields = self.field_refs();
        all_fields.push(("reason", reason));
        Logger::error(&event, &all_fields);
    }

    /// Check if the scope has been closed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            let event = format!("{}_INCOMPLETE", self.name);
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_creation() {
        let scope = ObservationScope::new("TEST");
        assert!(!scope.is_completed());
        scope.complete();
    }

    #[test]
    fn test_scope_with_fields() {
        let scope = ObservationScope::with_fields("TEST", &[("op_id", "abc")]);
        scope.complete_with_fields(&[("vehicles", "3")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("TEST");
        scope.fail("something went wrong");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }
}
