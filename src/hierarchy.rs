//! Progressive disclosure of host rows under their cluster row.

use std::collections::HashSet;

use crate::models::{DataRow, EntityKind};

/// Set of expanded cluster entities.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalRowModel {
    expanded: HashSet<String>,
}

impl HierarchicalRowModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the expansion state of `entity_name`. Returns the new state.
    pub fn toggle_expansion(&mut self, entity_name: &str) -> bool {
        if self.expanded.remove(entity_name) {
            false
        } else {
            self.expanded.insert(entity_name.to_string());
            true
        }
    }

    pub fn is_expanded(&self, entity_name: &str) -> bool {
        self.expanded.contains(entity_name)
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Filters `rows` (already sorted) down to what is on screen.
    ///
    /// Cluster rows and rows outside the hierarchy are always visible; host
    /// rows only when their parent is expanded. Input order is preserved.
    pub fn visible_rows<'a, I>(&self, rows: I) -> Vec<&'a DataRow>
    where
        I: IntoIterator<Item = &'a DataRow>,
    {
        rows.into_iter().filter(|row| self.is_visible(row)).collect()
    }

    fn is_visible(&self, row: &DataRow) -> bool {
        match row.hierarchy() {
            Some(h) if h.kind == EntityKind::Host => h
                .parent
                .as_deref()
                .is_some_and(|parent| self.expanded.contains(parent)),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Hierarchy};

    fn sample() -> Vec<DataRow> {
        vec![
            DataRow::performance(Hierarchy::cluster("C1")).with("entityName", "C1"),
            DataRow::performance(Hierarchy::host("h1", "C1")).with("entityName", "h1"),
            DataRow::performance(Hierarchy::cluster("C2")).with("entityName", "C2"),
            DataRow::performance(Hierarchy::host("h2", "C2")).with("entityName", "h2"),
            DataRow::empty(Category::Performance).with("entityName", "loose"),
        ]
    }

    fn names(rows: &[&DataRow]) -> Vec<String> {
        rows.iter()
            .map(|r| r.get("entityName").map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_host_visible_only_after_expansion() {
        let rows = sample();
        let mut model = HierarchicalRowModel::new();
        assert_eq!(names(&model.visible_rows(&rows)), vec!["C1", "C2", "loose"]);

        assert!(model.toggle_expansion("C1"));
        assert_eq!(names(&model.visible_rows(&rows)), vec!["C1", "h1", "C2", "loose"]);

        assert!(!model.toggle_expansion("C1"));
        assert_eq!(names(&model.visible_rows(&rows)), vec!["C1", "C2", "loose"]);
    }

    #[test]
    fn test_order_preserved_from_input() {
        let rows = sample();
        let mut model = HierarchicalRowModel::new();
        model.toggle_expansion("C1");
        model.toggle_expansion("C2");
        let reversed: Vec<&DataRow> = rows.iter().rev().collect();
        assert_eq!(
            names(&model.visible_rows(reversed)),
            vec!["loose", "h2", "C2", "h1", "C1"]
        );
    }

    #[test]
    fn test_orphan_host_hidden() {
        let rows = vec![DataRow::Performance {
            hierarchy: Some(Hierarchy {
                kind: EntityKind::Host,
                name: "h9".into(),
                parent: None,
            }),
            fields: Default::default(),
        }];
        let model = HierarchicalRowModel::new();
        assert!(model.visible_rows(&rows).is_empty());
    }
}
