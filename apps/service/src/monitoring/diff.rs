//! Line-oriented change detection between two registration snapshots.
//!
//! Both sides are rendered as `key: value` lines sorted by key, so insertion
//! order of the input never shows up as a change. Removed lines are prefixed
//! with `-`, added lines with `+`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Render a mapping as its stable line form
pub fn render<K, V>(fields: &BTreeMap<K, V>) -> Vec<String>
where
    K: AsRef<str> + Ord,
    V: AsRef<str>,
{
    fields.iter().map(|(key, value)| format!("{}: {}", key.as_ref(), value.as_ref())).collect()
}

/// Diff `previous` against `current`. Empty when they are equal.
pub fn diff<K, V>(previous: &BTreeMap<K, V>, current: &BTreeMap<K, V>) -> Vec<String>
where
    K: AsRef<str> + Ord,
    V: AsRef<str>,
{
    let mut lines = Vec::new();
    let mut old = previous.iter().peekable();
    let mut new = current.iter().peekable();

    loop {
        let order = match (old.peek(), new.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((old_key, _)), Some((new_key, _))) => old_key.cmp(new_key),
        };

        match order {
            Ordering::Less => {
                if let Some((key, value)) = old.next() {
                    lines.push(removed(key.as_ref(), value.as_ref()));
                }
            }
            Ordering::Greater => {
                if let Some((key, value)) = new.next() {
                    lines.push(added(key.as_ref(), value.as_ref()));
                }
            }
            Ordering::Equal => {
                if let (Some((key, old_value)), Some((_, new_value))) = (old.next(), new.next()) {
                    if old_value.as_ref() != new_value.as_ref() {
                        lines.push(removed(key.as_ref(), old_value.as_ref()));
                        lines.push(added(key.as_ref(), new_value.as_ref()));
                    }
                }
            }
        }
    }

    lines
}

fn removed(key: &str, value: &str) -> String {
    format!("-{key}: {value}")
}

fn added(key: &str, value: &str) -> String {
    format!("+{key}: {value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn invert(line: &str) -> String {
        match line.split_at(1) {
            ("-", rest) => format!("+{rest}"),
            ("+", rest) => format!("-{rest}"),
            _ => line.to_string(),
        }
    }

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let forward = snapshot(&[("registrar", "A"), ("expiration_date", "2025-01-01"), ("status", "ok")]);
        let reversed = snapshot(&[("status", "ok"), ("expiration_date", "2025-01-01"), ("registrar", "A")]);

        assert!(diff(&forward, &forward).is_empty());
        assert!(diff(&forward, &reversed).is_empty());
        assert!(diff(&BTreeMap::<String, String>::new(), &BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_changed_value_is_removal_then_addition() {
        let before = snapshot(&[("registrar", "A"), ("expiration", "2025-01-01")]);
        let after = snapshot(&[("registrar", "A"), ("expiration", "2026-01-01")]);

        assert_eq!(diff(&before, &after), vec!["-expiration: 2025-01-01", "+expiration: 2026-01-01"]);
    }

    #[test]
    fn test_added_and_removed_keys() {
        let before = snapshot(&[("a", "1"), ("c", "3")]);
        let after = snapshot(&[("b", "2"), ("c", "3"), ("d", "4")]);

        assert_eq!(diff(&before, &after), vec!["-a: 1", "+b: 2", "+d: 4"]);
    }

    #[test]
    fn test_reverse_diff_inverts_markers() {
        let a = snapshot(&[("registrar", "A"), ("expiration", "2025-01-01"), ("name_server", "ns1")]);
        let b = snapshot(&[("registrar", "B"), ("expiration", "2025-01-01"), ("status", "locked")]);

        let mut forward: Vec<String> = diff(&a, &b).iter().map(|line| invert(line)).collect();
        let mut backward = diff(&b, &a);
        forward.sort();
        backward.sort();

        assert!(!forward.is_empty());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_render_is_sorted() {
        let fields = snapshot(&[("z", "last"), ("a", "first")]);
        assert_eq!(render(&fields), vec!["a: first", "z: last"]);
    }
}
