use itertools::Itertools;
use rpn42_core::{CalcError, Ident, Value};

// VARIABLE STORE
// ================================================================================================

/// One named slot. `level` is the subroutine nesting depth that owns the entry, or −1 for a
/// global; `hidden` excludes the entry from ordinary recall and catalogs (locals the engine
/// parks for its own bookkeeping).
#[derive(Clone, Debug, PartialEq)]
pub struct VarEntry {
    pub name: Ident,
    pub level: i32,
    pub value: Value,
    pub hidden: bool,
}

/// Ordered variable store with call-frame shadowing.
///
/// Lookups walk from the most recently created entry backwards, so a local created at a
/// deeper level shadows a global of the same name until the frame is purged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VarStore {
    entries: Vec<VarEntry>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent visible entry with the given name.
    pub fn recall(&self, name: &Ident) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.hidden && &e.name == name)
            .map(|e| &e.value)
    }

    pub fn recall_mut(&mut self, name: &Ident) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .rev()
            .find(|e| !e.hidden && &e.name == name)
            .map(|e| &mut e.value)
    }

    /// Writes a variable: updates the most recent visible entry of the same name and level, or
    /// appends a new one at that level.
    pub fn store(&mut self, name: &Ident, level: i32, value: Value) {
        match self
            .entries
            .iter_mut()
            .rev()
            .find(|e| !e.hidden && &e.name == name && e.level == level)
        {
            Some(entry) => entry.value = value,
            None => self.entries.push(VarEntry {
                name: name.clone(),
                level,
                value,
                hidden: false,
            }),
        }
    }

    /// Convenience for global writes.
    pub fn store_global(&mut self, name: &Ident, value: Value) {
        self.store(name, -1, value)
    }

    /// Removes the most recent visible entry of the given name.
    ///
    /// # Errors
    /// `Nonexistent` when no such variable is visible.
    pub fn purge(&mut self, name: &Ident) -> Result<Value, CalcError> {
        let idx = self
            .entries
            .iter()
            .rposition(|e| !e.hidden && &e.name == name)
            .ok_or(CalcError::Nonexistent)?;
        Ok(self.entries.remove(idx).value)
    }

    /// Drops every entry at or deeper than the given level (subroutine return).
    pub fn pop_frames(&mut self, level: i32) {
        self.entries.retain(|e| e.level < level || e.level == -1);
    }

    /// Visible variable names, most recent first, without shadowed duplicates; the catalog
    /// view.
    pub fn catalog(&self) -> Vec<&Ident> {
        self.entries
            .iter()
            .rev()
            .filter(|e| !e.hidden)
            .map(|e| &e.name)
            .unique()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VarEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push_entry(&mut self, entry: VarEntry) {
        self.entries.push(entry);
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn name(s: &str) -> Ident {
        Ident::try_from(s).unwrap()
    }

    #[test]
    fn store_and_recall() {
        let mut vars = VarStore::new();
        vars.store_global(&name("X"), Value::Real(3.0));
        assert_eq!(vars.recall(&name("X")), Some(&Value::Real(3.0)));
        vars.store_global(&name("X"), Value::Real(4.0));
        assert_eq!(vars.recall(&name("X")), Some(&Value::Real(4.0)));
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.recall(&name("Y")), None);
    }

    #[test]
    fn locals_shadow_globals_until_frame_pops() {
        let mut vars = VarStore::new();
        vars.store_global(&name("A"), Value::Real(1.0));
        vars.store(&name("A"), 2, Value::Real(99.0));
        assert_eq!(vars.recall(&name("A")), Some(&Value::Real(99.0)));
        vars.pop_frames(2);
        assert_eq!(vars.recall(&name("A")), Some(&Value::Real(1.0)));
    }

    #[test]
    fn purge_removes_most_recent() {
        let mut vars = VarStore::new();
        vars.store_global(&name("A"), Value::Real(1.0));
        vars.store(&name("A"), 1, Value::Real(2.0));
        assert_eq!(vars.purge(&name("A")), Ok(Value::Real(2.0)));
        assert_eq!(vars.recall(&name("A")), Some(&Value::Real(1.0)));
        assert_eq!(vars.purge(&name("B")), Err(CalcError::Nonexistent));
    }

    #[test]
    fn catalog_deduplicates_shadowed_names() {
        let mut vars = VarStore::new();
        vars.store_global(&name("A"), Value::Real(1.0));
        vars.store_global(&name("B"), Value::Real(2.0));
        vars.store(&name("A"), 3, Value::Real(3.0));
        let cat = vars.catalog();
        assert_eq!(cat, vec![&name("A"), &name("B")]);
    }

    #[test]
    fn hidden_entries_are_invisible() {
        let mut vars = VarStore::new();
        vars.push_entry(VarEntry {
            name: name("S"),
            level: -1,
            value: Value::Real(0.0),
            hidden: true,
        });
        assert_eq!(vars.recall(&name("S")), None);
        assert!(vars.catalog().is_empty());
    }
}
