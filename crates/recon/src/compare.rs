//! Field-by-field record comparison.

use std::collections::BTreeSet;

use crate::model::{FieldChange, FieldDiff, FieldStatus, Record};

const FLOAT_EPSILON: f64 = 1e-6;

/// Compare two present field values.
///
/// Unequal strings get a second chance as numbers: floating point when either
/// side contains a decimal point, integers otherwise.
pub fn compare_fields(old: &str, new: &str) -> FieldStatus {
    if old == new {
        return FieldStatus::Equal;
    }
    if equal_with_coercion(old, new) {
        FieldStatus::EqualWithCoercion
    } else {
        FieldStatus::Unequal
    }
}

fn equal_with_coercion(old: &str, new: &str) -> bool {
    if old.contains('.') || new.contains('.') {
        match (old.trim().parse::<f64>(), new.trim().parse::<f64>()) {
            (Ok(a), Ok(b)) => (a - b).abs() < FLOAT_EPSILON,
            _ => false,
        }
    } else {
        match (old.trim().parse::<i64>(), new.trim().parse::<i64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Compare every field in the union of both records, skipping `ignored` fields.
pub fn compare_records(old: &Record, new: &Record, ignored: &[String]) -> FieldDiff {
    let names: BTreeSet<&str> = old.fields().chain(new.fields()).collect();

    names
        .into_iter()
        .filter(|name| !ignored.iter().any(|i| i.as_str() == *name))
        .map(|name| {
            let status = match (old.get(name), new.get(name)) {
                (Some(a), Some(b)) => compare_fields(a, b),
                (Some(_), None) => FieldStatus::OnlyInOld,
                (None, Some(_)) => FieldStatus::OnlyInNew,
                (None, None) => FieldStatus::Unknown,
            };
            (name.to_string(), status)
        })
        .collect()
}

/// Collapse a diff into a yes/no answer.
///
/// Strict accepts only `Equal`; loose also accepts `EqualWithCoercion`.
pub fn is_equal(diff: &FieldDiff, strict: bool) -> bool {
    let floor = if strict {
        FieldStatus::Equal
    } else {
        FieldStatus::EqualWithCoercion
    };
    diff.values().all(|status| *status >= floor)
}

/// True when the identity-defining field compares weaker than `EqualWithCoercion`.
pub fn key_field_differs(diff: &FieldDiff, key_field: &str) -> bool {
    diff.get(key_field)
        .is_some_and(|status| *status < FieldStatus::EqualWithCoercion)
}

/// Fields that failed comparison, with the values a reviewer needs to see.
pub fn change_report(old: &Record, new: &Record, diff: &FieldDiff) -> Vec<FieldChange> {
    diff.iter()
        .filter(|(_, status)| **status < FieldStatus::EqualWithCoercion)
        .map(|(name, status)| {
            let show_old = matches!(status, FieldStatus::Unequal | FieldStatus::OnlyInOld);
            let show_new = matches!(status, FieldStatus::Unequal | FieldStatus::OnlyInNew);
            FieldChange {
                field: name.clone(),
                status: *status,
                old: show_old.then(|| old.value(name).to_string()),
                new: show_new.then(|| new.value(name).to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field;

    fn rec(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    #[test]
    fn coercion_cases() {
        assert_eq!(compare_fields("abc", "abc"), FieldStatus::Equal);
        assert_eq!(compare_fields("1.0", "1"), FieldStatus::EqualWithCoercion);
        assert_eq!(compare_fields("10", "10.00"), FieldStatus::EqualWithCoercion);
        assert_eq!(compare_fields("007", "7"), FieldStatus::EqualWithCoercion);
        assert_eq!(compare_fields("1", "2"), FieldStatus::Unequal);
        assert_eq!(compare_fields("1.5", "abc"), FieldStatus::Unequal);
        assert_eq!(compare_fields("", "0"), FieldStatus::Unequal);
    }

    #[test]
    fn float_epsilon() {
        assert_eq!(compare_fields("0.1000001", "0.1"), FieldStatus::EqualWithCoercion);
        assert_eq!(compare_fields("0.11", "0.1"), FieldStatus::Unequal);
    }

    #[test]
    fn union_of_fields() {
        let old = rec(&[("id", "s1"), ("price1", "10"), ("cat1", "A")]);
        let new = rec(&[("id", "s1"), ("price1", "10.0"), ("cat2", "B")]);
        let diff = compare_records(&old, &new, &[]);
        assert_eq!(diff["id"], FieldStatus::Equal);
        assert_eq!(diff["price1"], FieldStatus::EqualWithCoercion);
        assert_eq!(diff["cat1"], FieldStatus::OnlyInOld);
        assert_eq!(diff["cat2"], FieldStatus::OnlyInNew);
        assert_eq!(diff.len(), 4);
    }

    #[test]
    fn ignored_fields_skipped() {
        let old = rec(&[("id", "s1"), (field::ROWNUM, "3")]);
        let new = rec(&[("id", "s1"), (field::ROWNUM, "9")]);
        let diff = compare_records(&old, &new, &[field::ROWNUM.to_string()]);
        assert!(!diff.contains_key(field::ROWNUM));
        assert!(is_equal(&diff, true));
    }

    #[test]
    fn strict_vs_loose() {
        let old = rec(&[("price1", "1.0")]);
        let new = rec(&[("price1", "1")]);
        let diff = compare_records(&old, &new, &[]);
        assert!(!is_equal(&diff, true));
        assert!(is_equal(&diff, false));

        let diff = compare_records(&rec(&[("a", "x")]), &rec(&[("a", "y")]), &[]);
        assert!(!is_equal(&diff, true));
        assert!(!is_equal(&diff, false));
    }

    #[test]
    fn key_field_gate() {
        let old = rec(&[(field::DESCRIPTION, "Foo"), ("price1", "1")]);
        let changed_price = rec(&[(field::DESCRIPTION, "Foo"), ("price1", "2")]);
        let changed_desc = rec(&[(field::DESCRIPTION, "Bar"), ("price1", "1")]);
        let no_desc = rec(&[("price1", "1")]);

        let d = compare_records(&old, &changed_price, &[]);
        assert!(!key_field_differs(&d, field::DESCRIPTION));
        let d = compare_records(&old, &changed_desc, &[]);
        assert!(key_field_differs(&d, field::DESCRIPTION));
        let d = compare_records(&old, &no_desc, &[]);
        assert!(key_field_differs(&d, field::DESCRIPTION));
        let d = compare_records(&no_desc, &no_desc, &[]);
        assert!(!key_field_differs(&d, field::DESCRIPTION));
    }

    #[test]
    fn report_lists_only_failures() {
        let old = rec(&[("id", "s1"), ("price1", "10"), ("status", "sold"), ("cat1", "A")]);
        let new = rec(&[("id", "s1"), ("price1", "10.0"), ("status", "avail"), ("cat2", "B")]);
        let diff = compare_records(&old, &new, &[]);
        let report = change_report(&old, &new, &diff);

        let fields: Vec<_> = report.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["cat1", "cat2", "status"]);
        assert_eq!(report[0].old.as_deref(), Some("A"));
        assert_eq!(report[0].new, None);
        assert_eq!(report[1].old, None);
        assert_eq!(report[1].new.as_deref(), Some("B"));
        assert_eq!(report[2].old.as_deref(), Some("sold"));
        assert_eq!(report[2].new.as_deref(), Some("avail"));
    }
}
