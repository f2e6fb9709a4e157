//! Output identifiers for user-supplied field labels.
//!
//! Survey authors name questions freely, so labels can contain spaces,
//! punctuation or differ from each other only by case. Each output format
//! has its own tolerance for that:
//!
//! - [`NamingRule::Verbatim`] (CSV, KML): labels pass through unchanged
//! - [`NamingRule::Identifier`] (GeoJSON properties, layer names): safe
//!   characters, unique under exact comparison
//! - [`NamingRule::SqliteColumn`]: safe characters, unique under
//!   case-insensitive comparison
//!
//! Collisions are resolved by appending `_` until the name is free. The
//! outcome depends on the order in which labels are first named.

use std::collections::{HashMap, HashSet};

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Per-format naming rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingRule {
    Verbatim,
    Identifier,
    SqliteColumn,
}

/// Stateful namer for one export.
///
/// Remembers every label it has named, so asking twice for the same label
/// returns the same identifier.
#[derive(Debug)]
pub struct FieldNamer {
    rule: NamingRule,
    assigned: HashMap<String, String>,
    taken: HashSet<String>,
}

impl FieldNamer {
    pub fn new(rule: NamingRule) -> Self {
        Self {
            rule,
            assigned: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    /// Output identifier for `label`.
    pub fn name(&mut self, label: &str) -> String {
        if self.rule == NamingRule::Verbatim {
            return label.to_string();
        }
        if let Some(existing) = self.assigned.get(label) {
            return existing.clone();
        }

        let mut candidate = safe(label);
        while self.taken.contains(&self.comparison_key(&candidate)) {
            candidate.push('_');
        }

        self.taken.insert(self.comparison_key(&candidate));
        self.assigned.insert(label.to_string(), candidate.clone());
        candidate
    }

    fn comparison_key(&self, name: &str) -> String {
        match self.rule {
            NamingRule::SqliteColumn => name.to_ascii_lowercase(),
            _ => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe() {
        assert_eq!(safe("Q1. Use?"), "Q1__Use_");
        assert_eq!(safe("already_safe_9"), "already_safe_9");
        assert_eq!(safe("naïve"), "na_ve");
        assert_eq!(safe(""), "");
    }

    #[test]
    fn test_verbatim_passes_through() {
        let mut namer = FieldNamer::new(NamingRule::Verbatim);
        assert_eq!(namer.name("Q1, part 2"), "Q1, part 2");
        assert_eq!(namer.name("Q1, part 2"), "Q1, part 2");
    }

    #[test]
    fn test_sqlite_columns_collide_case_insensitively() {
        let mut namer = FieldNamer::new(NamingRule::SqliteColumn);
        assert_eq!(namer.name("Q1"), "Q1");
        assert_eq!(namer.name("q1"), "q1_");
        // Repeated lookups are stable
        assert_eq!(namer.name("Q1"), "Q1");
        assert_eq!(namer.name("q1"), "q1_");
    }

    #[test]
    fn test_sqlite_collision_order_dependent() {
        let mut namer = FieldNamer::new(NamingRule::SqliteColumn);
        assert_eq!(namer.name("q1"), "q1");
        assert_eq!(namer.name("Q1"), "Q1_");
    }

    #[test]
    fn test_identifier_is_case_sensitive() {
        let mut namer = FieldNamer::new(NamingRule::Identifier);
        assert_eq!(namer.name("Q1"), "Q1");
        assert_eq!(namer.name("q1"), "q1");
    }

    #[test]
    fn test_sanitized_labels_collide() {
        let mut namer = FieldNamer::new(NamingRule::Identifier);
        assert_eq!(namer.name("a b"), "a_b");
        assert_eq!(namer.name("a-b"), "a_b_");
        assert_eq!(namer.name("a_b"), "a_b__");
    }
}
