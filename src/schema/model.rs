use std::{collections::HashMap, fmt};

use serde::Serialize;

use super::introspection::{
    FullType, IntrospectionField, IntrospectionKind, IntrospectionSchema, IntrospectionTypeRef,
};
use crate::{AdapterError, AdapterResult};

/// The kind of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    /// Object-like types that require a sub-selection
    pub const fn is_composite(self) -> bool {
        matches!(self, TypeKind::Object | TypeKind::Interface | TypeKind::Union)
    }

    /// Types that may appear in argument and variable positions
    pub const fn is_input(self) -> bool {
        matches!(self, TypeKind::Scalar | TypeKind::Enum | TypeKind::InputObject)
    }
}

/// A field's declared type: a named type inside any number of list and
/// required wrappers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

/// A [`TypeRef`] with its wrappers stripped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwrappedType<'a> {
    pub name: &'a str,
    pub is_array: bool,
    pub is_required: bool,
}

impl TypeRef {
    /// Strips list and required wrappers from the outside in.
    ///
    /// Required-ness follows the outermost layer only: a required wrapper
    /// seen after a list wrapper describes the items, not the field.
    pub fn unwrapped(&self) -> UnwrappedType<'_> {
        let mut is_array = false;
        let mut is_required = false;
        let mut current = self;
        loop {
            match current {
                TypeRef::NonNull(inner) => {
                    if !is_array {
                        is_required = true;
                    }
                    current = inner;
                }
                TypeRef::List(inner) => {
                    is_array = true;
                    current = inner;
                }
                TypeRef::Named(name) => {
                    return UnwrappedType {
                        name,
                        is_array,
                        is_required,
                    };
                }
            }
        }
    }

    /// The named type at the core of the wrappers
    pub fn named_type(&self) -> &str {
        self.unwrapped().name
    }

    fn from_introspection(type_ref: &IntrospectionTypeRef) -> AdapterResult<TypeRef> {
        let inner = || match type_ref.of_type.as_deref() {
            Some(inner) => TypeRef::from_introspection(inner).map(Box::new),
            None => Err(AdapterError::schema(format!(
                "{:?} type reference without `ofType`",
                type_ref.kind
            ))),
        };
        match type_ref.kind {
            IntrospectionKind::List => Ok(TypeRef::List(inner()?)),
            IntrospectionKind::NonNull => Ok(TypeRef::NonNull(inner()?)),
            _ => type_ref
                .name
                .clone()
                .map(TypeRef::Named)
                .ok_or_else(|| AdapterError::schema("named type reference without a name")),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// An output field or input field of a named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeRef,
}

impl FieldDefinition {
    fn from_introspection(field: &IntrospectionField) -> AdapterResult<FieldDefinition> {
        Ok(FieldDefinition {
            name: field.name.clone(),
            ty: TypeRef::from_introspection(&field.ty)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<FieldDefinition>,
    pub enum_values: Vec<String>,
}

impl TypeDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn from_introspection(full_type: &FullType) -> AdapterResult<TypeDefinition> {
        let name = full_type
            .name
            .clone()
            .ok_or_else(|| AdapterError::schema("type without a name"))?;
        let kind = match full_type.kind {
            IntrospectionKind::Scalar => TypeKind::Scalar,
            IntrospectionKind::Object => TypeKind::Object,
            IntrospectionKind::Interface => TypeKind::Interface,
            IntrospectionKind::Union => TypeKind::Union,
            IntrospectionKind::Enum => TypeKind::Enum,
            IntrospectionKind::InputObject => TypeKind::InputObject,
            IntrospectionKind::List | IntrospectionKind::NonNull => {
                return Err(AdapterError::schema(format!(
                    "`{name}` is listed as a wrapper type"
                )));
            }
        };
        let fields = full_type
            .fields
            .iter()
            .flatten()
            .map(FieldDefinition::from_introspection)
            .collect::<AdapterResult<Vec<_>>>()?;
        Ok(TypeDefinition {
            kind,
            fields,
            enum_values: full_type
                .enum_values
                .iter()
                .flatten()
                .map(|value| value.name.clone())
                .collect(),
            name,
        })
    }
}

/// Root operation kinds a resource document may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A read-only lookup table over an introspected schema.
///
/// Built once per connection and shared by every resource afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
    query_type: String,
    mutation_type: Option<String>,
    types: HashMap<String, TypeDefinition>,
}

impl SchemaModel {
    /// Builds the lookup table from a deserialized `__schema` object
    pub fn from_introspection(schema: &IntrospectionSchema) -> AdapterResult<SchemaModel> {
        let types = schema
            .types
            .iter()
            .map(|full_type| {
                TypeDefinition::from_introspection(full_type).map(|def| (def.name.clone(), def))
            })
            .collect::<AdapterResult<HashMap<_, _>>>()?;

        let root = |root: &Option<super::introspection::NamedTypeRef>| {
            root.as_ref().and_then(|root| root.name.clone())
        };
        let query_type = root(&schema.query_type)
            .ok_or_else(|| AdapterError::schema("the schema has no query type"))?;
        let mutation_type = root(&schema.mutation_type);
        for root in std::iter::once(&query_type).chain(mutation_type.iter()) {
            if !types.contains_key(root) {
                return Err(AdapterError::schema(format!(
                    "root type `{root}` is not among the schema's types"
                )));
            }
        }

        Ok(SchemaModel {
            query_type,
            mutation_type,
            types,
        })
    }

    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// Looks up `field` on the named type `type_name`
    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDefinition> {
        self.type_definition(type_name)?.field(field)
    }

    pub fn root_type(&self, operation: OperationKind) -> Option<&str> {
        match operation {
            OperationKind::Query => Some(&self.query_type),
            OperationKind::Mutation => self.mutation_type.as_deref(),
        }
    }

    /// Number of named types, built-ins included
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
