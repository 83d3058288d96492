//! Generic table sorting: value comparison and click-to-sort state.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions, Strength};

use crate::models::{DataRow, Value};

thread_local! {
    // Root locale, secondary strength: accents matter, case does not.
    static COLLATOR: Option<Collator> = {
        let mut options = CollatorOptions::new();
        options.strength = Some(Strength::Secondary);
        Collator::try_new(&Default::default(), options).ok()
    };
}

/// Locale-aware, case-insensitive text ordering.
fn collate(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Comparable form of a cell value.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(value: &Value) -> SortKey {
        match value.as_f64() {
            Some(n) => SortKey::Number(n),
            None => SortKey::Text(value.to_string()),
        }
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    match (SortKey::of(a), SortKey::of(b)) {
        (SortKey::Number(x), SortKey::Number(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        // Mixed numeric/text: compare both as text.
        (SortKey::Number(_), SortKey::Text(y)) => collate(&a.to_string(), &y),
        (SortKey::Text(x), SortKey::Number(_)) => collate(&x, &b.to_string()),
        (SortKey::Text(x), SortKey::Text(y)) => collate(&x, &y),
    }
}

/// Compares two rows on `field`.
///
/// Rows without the field (or with a null value) always sort after rows
/// that have it, in both directions.
pub fn compare(a: &DataRow, b: &DataRow, field: &str, direction: SortDirection) -> Ordering {
    match (a.get(field), b.get(field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let cmp = compare_present(x, y);
            match direction {
                SortDirection::Ascending => cmp,
                SortDirection::Descending => cmp.reverse(),
            }
        }
    }
}

/// Active sort column and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub field: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Header click: same field toggles direction, a new field starts ascending.
    pub fn click(current: Option<SortState>, field: &str) -> SortState {
        match current {
            Some(state) if state.field == field => SortState {
                field: state.field,
                direction: state.direction.toggled(),
            },
            _ => SortState::new(field),
        }
    }

    /// Stable sort of `rows` in place.
    pub fn apply<R: AsRef<DataRow>>(&self, rows: &mut [R]) {
        rows.sort_by(|a, b| compare(a.as_ref(), b.as_ref(), &self.field, self.direction));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn row(name: &str) -> DataRow {
        DataRow::empty(Category::Inventory).with("name", name)
    }

    fn names(rows: &[&DataRow]) -> Vec<String> {
        rows.iter()
            .map(|r| r.get("name").map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_missing_field_sorts_last_in_both_directions() {
        let with = row("a").with("memoryMb", 512i64);
        let without = row("b");
        for dir in [SortDirection::Ascending, SortDirection::Descending] {
            assert_eq!(compare(&without, &with, "memoryMb", dir), Ordering::Greater);
            assert_eq!(compare(&with, &without, "memoryMb", dir), Ordering::Less);
        }
    }

    #[test]
    fn test_null_treated_as_missing() {
        let null = row("a").with("memoryMb", Value::Null);
        let with = row("b").with("memoryMb", 1i64);
        assert_eq!(
            compare(&null, &with, "memoryMb", SortDirection::Descending),
            Ordering::Greater
        );
    }

    #[test]
    fn test_numeric_comparison_not_lexicographic() {
        let nine = row("a").with("iops", "9");
        let ten = row("b").with("iops", "1,000");
        assert_eq!(compare(&nine, &ten, "iops", SortDirection::Ascending), Ordering::Less);
        let n2 = row("c").with("iops", 2i64);
        let n10 = row("d").with("iops", 10i64);
        assert_eq!(compare(&n2, &n10, "iops", SortDirection::Ascending), Ordering::Less);
        assert_eq!(compare(&n2, &n10, "iops", SortDirection::Descending), Ordering::Greater);
    }

    #[test]
    fn test_text_comparison_case_insensitive() {
        let a = row("alpha");
        let b = row("Beta");
        assert_eq!(compare(&a, &b, "name", SortDirection::Ascending), Ordering::Less);
        assert_eq!(compare(&row("X"), &row("x"), "name", SortDirection::Ascending), Ordering::Equal);
    }

    #[test]
    fn test_text_comparison_locale_aware() {
        let asc = SortDirection::Ascending;
        assert_eq!(compare(&row("éclair"), &row("fig"), "name", asc), Ordering::Less);
        assert_eq!(compare(&row("éclair"), &row("zulu"), "name", asc), Ordering::Less);
        assert_eq!(compare(&row("Émile"), &row("emma"), "name", asc), Ordering::Less);
        assert_eq!(compare(&row("Éclair"), &row("éclair"), "name", asc), Ordering::Equal);
        // Accents still break ties between otherwise equal names.
        assert_eq!(compare(&row("eclair"), &row("éclair"), "name", asc), Ordering::Less);

        let hosts = [
            row("Ωmega-host"),
            row("zeta-host"),
            row("Ångström-host"),
            row("beta-host"),
            row("Дельта-host"),
        ];
        let mut rows: Vec<&DataRow> = hosts.iter().collect();
        SortState::new("name").apply(&mut rows);
        assert_eq!(
            names(&rows),
            vec![
                "Ångström-host",
                "beta-host",
                "zeta-host",
                "Ωmega-host",
                "Дельта-host"
            ]
        );
    }

    #[test]
    fn test_click_toggles_and_resets() {
        let s = SortState::click(None, "name");
        assert_eq!(s.direction, SortDirection::Ascending);
        let s = SortState::click(Some(s), "name");
        assert_eq!(s.direction, SortDirection::Descending);
        let s = SortState::click(Some(s), "name");
        assert_eq!(s.direction, SortDirection::Ascending);

        let desc = SortState {
            field: "name".into(),
            direction: SortDirection::Descending,
        };
        let s = SortState::click(Some(desc), "uuid");
        assert_eq!(s, SortState::new("uuid"));
    }

    #[test]
    fn test_apply_is_stable() {
        let r1 = row("b").with("powerState", "on");
        let r2 = row("a").with("powerState", "off");
        let r3 = row("c").with("powerState", "on");
        let r4 = row("d");
        let mut rows = vec![&r4, &r1, &r2, &r3];
        SortState::new("powerState").apply(&mut rows);
        assert_eq!(names(&rows), vec!["a", "b", "c", "d"]);

        let mut rows = vec![&r4, &r1, &r2, &r3];
        SortState {
            field: "powerState".into(),
            direction: SortDirection::Descending,
        }
        .apply(&mut rows);
        assert_eq!(names(&rows), vec!["b", "c", "a", "d"]);
    }
}
