//! Conversion between the flat, dotted-key records hosts exchange and the
//! nested records GraphQL variables and results use.

use serde_json::{Map, Value};

use crate::{AdapterError, AdapterResult};

const SEPARATOR: char = '.';

/// Largest array index a dotted key may name
pub const MAX_ARRAY_INDEX: usize = 9_999;

/// Rebuilds nested objects from dotted keys.
///
/// A numeric segment makes its parent an array sized to the largest index
/// seen; slots no key fills stay `null`. Indexes above [`MAX_ARRAY_INDEX`]
/// are rejected.
pub fn inflate(flat: &Map<String, Value>) -> AdapterResult<Map<String, Value>> {
    let mut root = Value::Object(Map::new());
    for (key, value) in flat {
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        if let Some(segment) = segments.iter().find(|s| is_numeric(s) && index(s).is_none()) {
            return Err(AdapterError::coercion(
                key,
                format!("array index `{segment}` is above {MAX_ARRAY_INDEX}"),
            ));
        }
        insert(&mut root, &segments, value.clone());
    }
    match root {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn index(segment: &str) -> Option<usize> {
    if !is_numeric(segment) {
        return None;
    }
    segment
        .parse()
        .ok()
        .filter(|index| *index <= MAX_ARRAY_INDEX)
}

fn container_for(segment: &str) -> Value {
    match index(segment) {
        Some(_) => Value::Array(Vec::new()),
        None => Value::Object(Map::new()),
    }
}

fn insert(target: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if let (Value::Array(items), None) = (&*target, index(head)) {
        let map = items
            .iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item.clone()))
            .collect();
        *target = Value::Object(map);
    }

    let slot = match target {
        Value::Array(items) => {
            let i = index(head).unwrap_or_default();
            if items.len() <= i {
                items.resize(i + 1, Value::Null);
            }
            &mut items[i]
        }
        Value::Object(map) => map.entry(head.to_string()).or_insert(Value::Null),
        other => {
            *other = container_for(head);
            return insert(other, segments, value);
        }
    };

    match rest.first() {
        None => *slot = value,
        Some(next) => {
            if !matches!(slot, Value::Object(_) | Value::Array(_)) {
                *slot = container_for(next);
            }
            insert(slot, rest, value);
        }
    }
}

/// Flattens nested objects and arrays into dotted keys.
///
/// A nested object whose only key is `id_field` holding a scalar is
/// replaced by that scalar under the parent key.
pub fn deflate(nested: &Map<String, Value>, id_field: &str) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in nested {
        flatten(key.clone(), value, id_field, &mut flat);
    }
    flat
}

fn flatten(prefix: String, value: &Value, id_field: &str, flat: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            if let Some(id) = reference_id(map, id_field) {
                flat.insert(prefix, id.clone());
                return;
            }
            for (key, value) in map {
                flatten(format!("{prefix}{SEPARATOR}{key}"), value, id_field, flat);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{prefix}{SEPARATOR}{i}"), item, id_field, flat);
            }
        }
        scalar => {
            flat.insert(prefix, scalar.clone());
        }
    }
}

fn reference_id<'a>(map: &'a Map<String, Value>, id_field: &str) -> Option<&'a Value> {
    if map.len() != 1 {
        return None;
    }
    map.get(id_field)
        .filter(|id| !matches!(id, Value::Object(_) | Value::Array(_)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Map, Value, json};
    use speculoos::prelude::*;

    use super::{MAX_ARRAY_INDEX, deflate, inflate};
    use crate::AdapterError;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn inflates_sparse_arrays() {
        let flat = object(json!({ "array.0": "zero", "array.3": "three" }));
        assert_eq!(
            Value::Object(inflate(&flat).unwrap()),
            json!({ "array": ["zero", null, null, "three"] })
        );
    }

    #[test]
    fn inflates_arrays_of_objects() {
        let flat = object(json!({
            "name": "n",
            "items.1.sku": "b",
            "items.0.sku": "a",
            "items.0.qty": 2,
            "owner.address.city": "Oslo",
        }));
        assert_eq!(
            Value::Object(inflate(&flat).unwrap()),
            json!({
                "name": "n",
                "items": [{ "sku": "a", "qty": 2 }, { "sku": "b" }],
                "owner": { "address": { "city": "Oslo" } },
            })
        );
    }

    #[test]
    fn inflates_up_to_the_largest_index() {
        let key = format!("a.{MAX_ARRAY_INDEX}");
        let flat = object(json!({ key: "last" }));
        let inflated = inflate(&flat).unwrap();
        let items = inflated["a"].as_array().unwrap();
        assert_eq!(items.len(), MAX_ARRAY_INDEX + 1);
        assert_eq!(items[MAX_ARRAY_INDEX], json!("last"));
    }

    #[rstest]
    #[case::past_the_limit("a.10000")]
    #[case::huge("a.4000000000")]
    #[case::usize_max("a.18446744073709551615")]
    #[case::beyond_usize("a.99999999999999999999999.b")]
    fn rejects_out_of_range_indexes(#[case] key: &str) {
        let flat = object(json!({ key: "x" }));
        assert_that!(inflate(&flat))
            .is_err()
            .matches(|err| matches!(err, AdapterError::Coercion { path, .. } if path == key));
    }

    #[test]
    fn deflates_nested_objects() {
        let nested = object(json!({ "a": 1, "b": "bee", "c": { "d": { "e": "eee" } } }));
        assert_eq!(
            Value::Object(deflate(&nested, "ID")),
            json!({ "a": 1, "b": "bee", "c.d.e": "eee" })
        );
    }

    #[rstest]
    #[case::identifier(json!({ "child": { "ID": "i-d" } }), json!({ "child": "i-d" }))]
    #[case::other_field(json!({ "child": { "notID": "x" } }), json!({ "child.notID": "x" }))]
    #[case::identifier_among_others(
        json!({ "child": { "ID": "i-d", "name": "n" } }),
        json!({ "child.ID": "i-d", "child.name": "n" })
    )]
    #[case::array_of_references(
        json!({ "tags": [{ "ID": "1" }, { "ID": "2" }] }),
        json!({ "tags.0": "1", "tags.1": "2" })
    )]
    fn collapses_reference_shorthand(#[case] nested: Value, #[case] expected: Value) {
        assert_eq!(Value::Object(deflate(&object(nested), "ID")), expected);
    }

    #[test]
    fn top_level_identifier_is_kept() {
        let nested = object(json!({ "ID": "1" }));
        assert_eq!(Value::Object(deflate(&nested, "ID")), json!({ "ID": "1" }));
    }

    #[test]
    fn empty_containers_produce_no_keys() {
        let nested = object(json!({ "a": {}, "b": [], "c": null }));
        assert_eq!(Value::Object(deflate(&nested, "ID")), json!({ "c": null }));
    }

    #[rstest]
    #[case(json!({ "a": 1, "b": { "c": true, "d": [1, 2, { "e": null }] } }))]
    #[case(json!({ "list": [["x", "y"], ["z"]], "s": "" }))]
    #[case(json!({ "deep": { "er": { "still": { "value": 1.5 } } } }))]
    fn nested_records_survive_a_round_trip(#[case] nested: Value) {
        let nested = object(nested);
        assert_eq!(inflate(&deflate(&nested, "ID")).unwrap(), nested);
    }

    #[rstest]
    #[case(json!({ "a": 1, "b.c": true, "b.d.0": 1, "b.d.1": 2 }))]
    #[case(json!({ "x.0.y": "first", "x.1.y": "second", "z": null }))]
    fn flat_records_survive_a_round_trip(#[case] flat: Value) {
        let flat = object(flat);
        assert_eq!(deflate(&inflate(&flat).unwrap(), "ID"), flat);
    }
}
