//! absMid alias store.
//!
//! Every module (and every pending resolution request, before a module exists)
//! owns an ordered list of candidate absolute module ids. The list keeps two
//! partitions: non-provisional entries first, provisional entries after them.
//! Within a partition the most recently added entry comes first.
//!
//! The primary absMid is simply the name of entry 0.

use crate::error::{Error, Result};

/// One candidate absMid for a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// The module id.
    pub name: String,
    /// Whether the id was inferred heuristically and may be pruned at seal time.
    pub is_provisional: bool,
}

impl AliasEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, is_provisional: bool) -> Self {
        Self {
            name: name.into(),
            is_provisional,
        }
    }
}

/// Ordered absMid alias list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsMids {
    entries: Vec<AliasEntry>,
}

impl AbsMids {
    /// Create an empty alias list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a list from a single plain module id.
    pub fn from_primary(name: &str) -> Result<Self> {
        let mut absmids = Self::new();
        absmids.set_primary(name)?;
        Ok(absmids)
    }

    /// The primary absMid (name of the first entry).
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.name.as_str())
    }

    /// Insert a non-provisional entry at the very front of the list.
    ///
    /// Unlike [`AbsMids::add`], this does not remove an existing entry with the
    /// same name.
    pub fn set_primary(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        self.entries.insert(0, AliasEntry::new(name, false));
        Ok(())
    }

    /// The live alias list, front to back.
    #[must_use]
    pub fn aliases(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Replace the list with a copy of `entries`.
    pub fn init_from(&mut self, entries: &[AliasEntry]) {
        self.entries = entries.to_vec();
    }

    /// Add an alias, keeping non-provisional entries ahead of provisional ones.
    ///
    /// An existing entry with the same name is removed first. A non-provisional
    /// entry is never downgraded: adding the same name as provisional is a no-op.
    pub fn add(&mut self, name: &str, is_provisional: bool) -> Result<()> {
        check_name(name)?;
        self.insert(AliasEntry::new(name, is_provisional));
        Ok(())
    }

    /// Insert an entry whose name is already known to be valid.
    fn insert(&mut self, entry: AliasEntry) {
        if let Some(idx) = self.entries.iter().position(|e| e.name == entry.name) {
            if entry.is_provisional && !self.entries[idx].is_provisional {
                return;
            }
            self.entries.remove(idx);
        }
        let insert_idx = if entry.is_provisional {
            self.entries
                .iter()
                .position(|e| e.is_provisional)
                .unwrap_or(self.entries.len())
        } else {
            0
        };
        self.entries.insert(insert_idx, entry);
    }

    /// Keep only entries for which `keep(name, is_provisional)` holds.
    ///
    /// The predicate sees every entry front to back. Survivors are replayed
    /// through the same insertion as [`AbsMids::add`] in reverse so their relative order is preserved
    /// while the partition order is re-derived.
    pub fn filter<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, bool) -> bool,
    {
        let kept: Vec<AliasEntry> = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|entry| keep(&entry.name, entry.is_provisional))
            .collect();
        for entry in kept.into_iter().rev() {
            self.insert(entry);
        }
    }

    /// Make the current primary absMid non-provisional.
    pub fn promote_primary(&mut self) -> Result<()> {
        match self.primary().map(str::to_string) {
            Some(name) => self.add(&name, false),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> {
        self.entries.iter()
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::illegal_alias(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(absmids: &AbsMids) -> Vec<(&str, bool)> {
        absmids
            .iter()
            .map(|entry| (entry.name.as_str(), entry.is_provisional))
            .collect()
    }

    #[test]
    fn test_primary_of_single_add() {
        for name in ["dojo/foo", "a", "dijit/form/Button"] {
            let mut absmids = AbsMids::new();
            absmids.add(name, true).unwrap();
            assert_eq!(absmids.primary(), Some(name));
        }
        assert_eq!(AbsMids::new().primary(), None);
    }

    #[test]
    fn test_non_provisional_precedes_provisional() {
        let mut a = AbsMids::new();
        a.add("prov", true).unwrap();
        a.add("real", false).unwrap();

        let mut b = AbsMids::new();
        b.add("real", false).unwrap();
        b.add("prov", true).unwrap();

        assert_eq!(names(&a), vec![("real", false), ("prov", true)]);
        assert_eq!(names(&a), names(&b));
    }

    #[test]
    fn test_most_recent_first_within_partition() {
        let mut absmids = AbsMids::new();
        absmids.add("p1", true).unwrap();
        absmids.add("n1", false).unwrap();
        absmids.add("p2", true).unwrap();
        absmids.add("n2", false).unwrap();
        assert_eq!(
            names(&absmids),
            vec![("n2", false), ("n1", false), ("p2", true), ("p1", true)]
        );
    }

    #[test]
    fn test_duplicate_collapses_and_never_downgrades() {
        let mut absmids = AbsMids::new();
        absmids.add("x", true).unwrap();
        absmids.add("x", false).unwrap();
        assert_eq!(names(&absmids), vec![("x", false)]);

        absmids.add("y", false).unwrap();
        absmids.add("x", true).unwrap();
        assert_eq!(names(&absmids), vec![("y", false), ("x", false)]);
    }

    #[test]
    fn test_re_add_moves_to_partition_front() {
        let mut absmids = AbsMids::new();
        absmids.add("a", false).unwrap();
        absmids.add("b", false).unwrap();
        absmids.add("a", false).unwrap();
        assert_eq!(names(&absmids), vec![("a", false), ("b", false)]);
    }

    #[test]
    fn test_set_primary_inserts_at_front() {
        let mut absmids = AbsMids::new();
        absmids.add("p", true).unwrap();
        absmids.add("n", false).unwrap();
        absmids.set_primary("direct").unwrap();
        assert_eq!(absmids.primary(), Some("direct"));
        assert_eq!(
            names(&absmids),
            vec![("direct", false), ("n", false), ("p", true)]
        );
    }

    #[test]
    fn test_empty_name_is_illegal() {
        let mut absmids = AbsMids::new();
        assert!(matches!(
            absmids.set_primary(""),
            Err(Error::IllegalAlias { .. })
        ));
        assert!(matches!(absmids.add("", true), Err(Error::IllegalAlias { .. })));
        assert!(absmids.is_empty());
    }

    #[test]
    fn test_aliases_accessor_does_not_mutate() {
        let mut absmids = AbsMids::new();
        absmids.add("b", true).unwrap();
        absmids.add("a", false).unwrap();
        let before = absmids.clone();
        assert_eq!(absmids.aliases().len(), 2);
        assert_eq!(absmids, before);
    }

    #[test]
    fn test_init_from_is_a_copy() {
        let mut source = AbsMids::new();
        source.add("a", false).unwrap();

        let mut target = AbsMids::from_primary("old").unwrap();
        target.init_from(source.aliases());
        source.add("b", false).unwrap();

        assert_eq!(names(&target), vec![("a", false)]);
    }

    #[test]
    fn test_filter_always_true_preserves_order() {
        let mut absmids = AbsMids::new();
        absmids.add("p1", true).unwrap();
        absmids.add("p2", true).unwrap();
        absmids.add("n1", false).unwrap();
        absmids.add("n2", false).unwrap();
        let before = names(&absmids)
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect::<Vec<_>>();

        absmids.filter(|_, _| true);

        let after = names(&absmids)
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect::<Vec<_>>();
        assert_eq!(before, after);
    }

    #[test]
    fn test_filter_sees_entries_front_to_back() {
        let mut absmids = AbsMids::new();
        absmids.add("c", true).unwrap();
        absmids.add("b", false).unwrap();
        absmids.add("a", false).unwrap();

        let mut seen = Vec::new();
        absmids.filter(|name, _| {
            seen.push(name.to_string());
            name != "b"
        });

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(names(&absmids), vec![("a", false), ("c", true)]);
    }

    #[test]
    fn test_filter_replay_collapses_duplicates() {
        let mut absmids = AbsMids::new();
        absmids.add("x", true).unwrap();
        // set_primary does not dedup, so the list holds "x" twice
        absmids.set_primary("x").unwrap();
        assert_eq!(absmids.len(), 2);

        absmids.filter(|_, _| true);
        assert_eq!(names(&absmids), vec![("x", false)]);
    }

    #[test]
    fn test_promote_primary() {
        let mut absmids = AbsMids::new();
        absmids.add("guess", true).unwrap();
        absmids.promote_primary().unwrap();
        assert_eq!(names(&absmids), vec![("guess", false)]);

        let mut empty = AbsMids::new();
        empty.promote_primary().unwrap();
        assert!(empty.is_empty());
    }
}
