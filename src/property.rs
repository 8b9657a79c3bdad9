//! The metadata a walk derives for each exposed field.

use std::{collections::BTreeMap, fmt, str::FromStr};

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

use crate::schema::TypeKind;

/// How a host should treat a property's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Number,
    Float,
    Boolean,
    #[serde(rename = "datetime")]
    DateTime,
    Reference,
    /// Anything without a more specific kind; structured sub-objects have it too
    #[serde(rename = "mixed")]
    Opaque,
}

impl PropertyKind {
    /// The kind a named scalar maps to when nothing overrides it
    pub fn from_type_name(name: &str) -> PropertyKind {
        match name {
            "String" | "ID" => PropertyKind::String,
            "Float" => PropertyKind::Float,
            "Int" => PropertyKind::Number,
            "Boolean" | "Bool" => PropertyKind::Boolean,
            "Date" => PropertyKind::DateTime,
            _ => PropertyKind::Opaque,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Number => "number",
            PropertyKind::Float => "float",
            PropertyKind::Boolean => "boolean",
            PropertyKind::DateTime => "datetime",
            PropertyKind::Reference => "reference",
            PropertyKind::Opaque => "mixed",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PropertyKind::String,
            PropertyKind::Number,
            PropertyKind::Float,
            PropertyKind::Boolean,
            PropertyKind::DateTime,
            PropertyKind::Reference,
            PropertyKind::Opaque,
        ]
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown property kind `{s}`"))
    }
}

/// One exposed field of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Dotted path from the resource root, unique within the resource
    pub(crate) path: String,
    pub(crate) kind: PropertyKind,
    pub(crate) is_id: bool,
    pub(crate) is_array: bool,
    pub(crate) is_required: bool,
    pub(crate) is_sortable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) enum_values: Vec<String>,
    /// The referenced resource or type, for reference properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reference: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) children: Vec<PropertyDescriptor>,
}

impl PropertyDescriptor {
    /// The last segment of the path
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// Finds a property by full path among `properties` and their children
    pub fn find<'a>(properties: &'a [PropertyDescriptor], path: &str) -> Option<&'a PropertyDescriptor> {
        properties.iter().find_map(|property| {
            if property.path == path {
                Some(property)
            } else if path.starts_with(property.path.as_str())
                && path[property.path.len()..].starts_with('.')
            {
                PropertyDescriptor::find(&property.children, path)
            } else {
                None
            }
        })
    }
}

/// The named type a walked field resolved to, kept for filter coercion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedType {
    pub name: String,
    pub kind: TypeKind,
    /// The kind the field's property ended up with
    pub property_kind: PropertyKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

/// Property path → resolved named type, for every field a walk visited
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeMap(BTreeMap<String, ResolvedType>);

impl TypeMap {
    pub fn get(&self, path: &str) -> Option<&ResolvedType> {
        self.0.get(path)
    }

    pub(crate) fn insert(&mut self, path: String, resolved: ResolvedType) {
        self.0.insert(path, resolved);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedType)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ResolvedType)> for TypeMap {
    fn from_iter<T: IntoIterator<Item = (String, ResolvedType)>>(iter: T) -> Self {
        TypeMap(iter.into_iter().collect())
    }
}
