//! Turns a host's generic filter into typed per-field comparisons.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::{
    AdapterError, AdapterResult,
    property::{PropertyKind, ResolvedType, TypeMap},
    schema::TypeKind,
};

/// One criterion from the host: a property path and what it should match
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    pub path: String,
    pub value: FilterValue,
}

impl FilterEntry {
    pub fn single(path: impl Into<String>, value: impl Into<Value>) -> FilterEntry {
        FilterEntry {
            path: path.into(),
            value: FilterValue::Single(value.into()),
        }
    }

    pub fn range(path: impl Into<String>, from: Option<Value>, to: Option<Value>) -> FilterEntry {
        FilterEntry {
            path: path.into(),
            value: FilterValue::Range { from, to },
        }
    }
}

/// `null` and `""` count as absent, for single values and bounds alike
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(Value),
    Range {
        from: Option<Value>,
        to: Option<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Gte,
    Lte,
    Eq,
    Match,
}

/// A comparison ready to be passed to a query builder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFilter {
    pub field: String,
    pub is: FilterOperator,
    pub value: Value,
}

/// Coerces every entry to the type its path resolved to during the walk.
///
/// An entry yields one equality filter for a single value or a range with
/// equal bounds, and one filter per present bound otherwise. Equality is
/// `Match` for string-kind properties and `Eq` for the rest.
pub fn map_filter(type_map: &TypeMap, entries: &[FilterEntry]) -> AdapterResult<Vec<FieldFilter>> {
    let mut filters = Vec::new();
    for entry in entries {
        let path = entry.path.as_str();
        let resolved = type_map
            .get(path)
            .ok_or_else(|| AdapterError::coercion(path, "no such property"))?;
        let target = InputTarget::new(path, resolved)?;
        let equality = match resolved.property_kind {
            PropertyKind::String => FilterOperator::Match,
            _ => FilterOperator::Eq,
        };

        let mut push = |is, value| {
            filters.push(FieldFilter {
                field: entry.path.clone(),
                is,
                value,
            })
        };
        match &entry.value {
            FilterValue::Single(value) => {
                if let Some(value) = present(Some(value)) {
                    push(equality, target.coerce(path, value)?);
                }
            }
            FilterValue::Range { from, to } => {
                let from = present(from.as_ref())
                    .map(|value| target.coerce(path, value))
                    .transpose()?;
                let to = present(to.as_ref())
                    .map(|value| target.coerce(path, value))
                    .transpose()?;
                match (from, to) {
                    (Some(from), Some(to)) if from == to => push(equality, from),
                    (from, to) => {
                        if let Some(from) = from {
                            push(FilterOperator::Gte, from);
                        }
                        if let Some(to) = to {
                            push(FilterOperator::Lte, to);
                        }
                    }
                }
            }
        }
    }
    Ok(filters)
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

/// The input type a filter operand is converted to
struct InputTarget<'a> {
    name: &'a str,
    kind: TypeKind,
    enum_values: &'a [String],
}

impl<'a> InputTarget<'a> {
    fn new(path: &str, resolved: &'a ResolvedType) -> AdapterResult<InputTarget<'a>> {
        match resolved.kind {
            TypeKind::Object | TypeKind::Interface => Ok(InputTarget {
                name: "ID",
                kind: TypeKind::Scalar,
                enum_values: &[],
            }),
            kind if kind.is_input() => Ok(InputTarget {
                name: &resolved.name,
                kind,
                enum_values: &resolved.enum_values,
            }),
            _ => Err(AdapterError::coercion(
                path,
                format!("`{}` cannot be used as an input type", resolved.name),
            )),
        }
    }

    fn coerce(&self, path: &str, value: &Value) -> AdapterResult<Value> {
        let mismatch = || {
            AdapterError::coercion(path, format!("`{value}` is not a valid `{}`", self.name))
        };
        match self.kind {
            TypeKind::Enum => match value {
                Value::String(s) if self.enum_values.contains(s) => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            TypeKind::Scalar => match (self.name, value) {
                ("Int", Value::Number(n)) => n
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .map(Value::from)
                    .ok_or_else(mismatch),
                ("Int", Value::String(s)) => {
                    s.trim().parse::<i32>().map(Value::from).map_err(|_| mismatch())
                }
                ("Float", Value::Number(_)) => Ok(value.clone()),
                ("Float", Value::String(s)) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(mismatch),
                ("Boolean" | "Bool", Value::Bool(_)) => Ok(value.clone()),
                ("Boolean" | "Bool", Value::String(s)) => match s.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(mismatch()),
                },
                ("String" | "ID", Value::String(_)) => Ok(value.clone()),
                ("ID", Value::Number(n)) if n.is_i64() || n.is_u64() => {
                    Ok(Value::String(n.to_string()))
                }
                ("Int" | "Float" | "Boolean" | "Bool" | "String" | "ID", _) => Err(mismatch()),
                _ => Ok(value.clone()),
            },
            _ => Ok(value.clone()),
        }
    }
}
