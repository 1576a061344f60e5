//! Scoped lexical symbol table. A single flat vector of optional
//! names plus a vector of frame-start offsets; no per-frame
//! allocation.

use crate::text::types::BindVar;
use crate::types::Index;

#[derive(Debug, Default, Clone)]
pub struct NameMap {
    names: Vec<Option<BindVar>>,
    frames: Vec<usize>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.names.clear();
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Reserve an anonymous slot.
    pub fn new_unbound(&mut self) {
        self.names.push(None);
    }

    /// Reserve a named slot; false if the name is already bound in
    /// the current frame.
    pub fn new_bound(&mut self, var: BindVar) -> bool {
        if self.has_since_last_push(&var) {
            return false;
        }
        self.names.push(Some(var));
        true
    }

    pub fn declare(&mut self, var: Option<BindVar>) -> bool {
        match var {
            Some(var) => self.new_bound(var),
            None => {
                self.new_unbound();
                true
            }
        }
    }

    /// Open a scope frame.
    pub fn push(&mut self) {
        self.frames.push(self.names.len());
    }

    /// Close the innermost frame, dropping its bindings.
    pub fn pop(&mut self) {
        if let Some(start) = self.frames.pop() {
            self.names.truncate(start);
        }
    }

    fn frame_start(&self) -> usize {
        self.frames.last().copied().unwrap_or(0)
    }

    pub fn has(&self, var: &str) -> bool {
        self.names
            .iter()
            .any(|name| name.as_deref() == Some(var))
    }

    pub fn has_since_last_push(&self, var: &str) -> bool {
        self.names[self.frame_start()..]
            .iter()
            .any(|name| name.as_deref() == Some(var))
    }

    /// Label-style lookup: the number of slots defined strictly after
    /// the innermost binding of `var`, summed across open frames.
    pub fn get(&self, var: &str) -> Option<Index> {
        let found = self
            .names
            .iter()
            .rposition(|name| name.as_deref() == Some(var))?;
        Some((self.names.len() - 1 - found) as Index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(map: &mut NameMap, name: &str) {
        assert!(map.new_bound(name.to_string()));
    }

    #[test]
    fn label_style_indices() {
        let mut map = NameMap::new();
        bind(&mut map, "$a");
        map.new_unbound();
        bind(&mut map, "$b");
        // $b is the most recent slot, $a has two slots after it.
        assert_eq!(map.get("$b"), Some(0));
        assert_eq!(map.get("$a"), Some(2));
        assert_eq!(map.get("$missing"), None);
    }

    #[test]
    fn frames_count_across_scopes() {
        let mut map = NameMap::new();
        bind(&mut map, "$outer");
        map.push();
        bind(&mut map, "$inner");
        map.push();
        map.new_unbound();
        // $inner: one unbound slot after it; $outer: two.
        assert_eq!(map.get("$inner"), Some(1));
        assert_eq!(map.get("$outer"), Some(2));
        map.pop();
        assert_eq!(map.get("$inner"), Some(0));
        map.pop();
        assert_eq!(map.get("$inner"), None);
        assert_eq!(map.get("$outer"), Some(0));
    }

    #[test]
    fn shadowing_resolves_to_innermost() {
        let mut map = NameMap::new();
        bind(&mut map, "$x");
        map.push();
        bind(&mut map, "$x");
        assert_eq!(map.get("$x"), Some(0));
        map.pop();
        assert_eq!(map.get("$x"), Some(0));
    }

    #[test]
    fn duplicates_only_conflict_within_a_frame() {
        let mut map = NameMap::new();
        bind(&mut map, "$x");
        assert!(!map.new_bound("$x".to_string()));
        map.push();
        assert!(map.new_bound("$x".to_string()));
        assert!(map.has_since_last_push("$x"));
        map.pop();
        assert!(map.has("$x"));
    }
}
