//! Child event computation between two orderings.

use crate::event::ChildEvent;
use serde_json::Value;
use std::collections::HashSet;

/// Computes the child events that turn the ordered children `old` into
/// `new`.
///
/// Removals come first, then one pass over `new` in order emitting
/// `Added`, `Changed` and `Moved` events. Applying the events in order to
/// a list equal to `old` (inserting after `prev_key`, or at the front
/// when it is `None`) yields a list equal to `new`.
pub fn diff_children(old: &[(String, Value)], new: &[(String, Value)]) -> Vec<ChildEvent> {
    let new_keys: HashSet<&str> = new.iter().map(|(key, _)| key.as_str()).collect();
    let mut events = Vec::new();

    let mut current: Vec<(String, Value)> = Vec::with_capacity(new.len());
    for (key, value) in old {
        if new_keys.contains(key.as_str()) {
            current.push((key.clone(), value.clone()));
        } else {
            events.push(ChildEvent::Removed { key: key.clone() });
        }
    }

    for (index, (key, value)) in new.iter().enumerate() {
        let prev_key = index.checked_sub(1).map(|prev| new[prev].0.clone());
        match current.iter().position(|(existing, _)| existing == key) {
            None => {
                current.insert(index, (key.clone(), value.clone()));
                events.push(ChildEvent::Added {
                    key: key.clone(),
                    value: value.clone(),
                    prev_key,
                });
            }
            Some(position) => {
                if current[position].1 != *value {
                    current[position].1 = value.clone();
                    events.push(ChildEvent::Changed {
                        key: key.clone(),
                        value: value.clone(),
                        prev_key: prev_key.clone(),
                    });
                }
                if position != index {
                    let entry = current.remove(position);
                    current.insert(index, entry);
                    events.push(ChildEvent::Moved {
                        key: key.clone(),
                        prev_key,
                    });
                }
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(entries: &[(&str, Value)]) -> Vec<(String, Value)> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn identical_lists_produce_nothing() {
        let a = list(&[("a", json!(1)), ("b", json!(2))]);
        assert!(diff_children(&a, &a).is_empty());
    }

    #[test]
    fn additions_carry_previous_key() {
        let old = list(&[("a", json!(1))]);
        let new = list(&[("a", json!(1)), ("b", json!(2))]);
        assert_eq!(
            diff_children(&old, &new),
            vec![ChildEvent::Added {
                key: "b".into(),
                value: json!(2),
                prev_key: Some("a".into()),
            }]
        );
    }

    #[test]
    fn removals_come_first() {
        let old = list(&[("a", json!(1)), ("b", json!(2))]);
        let new = list(&[("b", json!(3)), ("c", json!(4))]);
        let events = diff_children(&old, &new);
        assert_eq!(events[0], ChildEvent::Removed { key: "a".into() });
        assert_eq!(
            events[1],
            ChildEvent::Changed {
                key: "b".into(),
                value: json!(3),
                prev_key: None,
            }
        );
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn reordering_emits_moves() {
        let old = list(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]);
        let new = list(&[("c", json!(3)), ("a", json!(1)), ("b", json!(2))]);
        assert_eq!(
            diff_children(&old, &new),
            vec![ChildEvent::Moved {
                key: "c".into(),
                prev_key: None,
            }]
        );
    }
}
