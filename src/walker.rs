//! Derives a resource's property tree by walking its sample document
//! against the schema.

use std::collections::HashMap;

use crate::{
    AdapterError, AdapterResult,
    document::{FieldSelection, NormalizedDocument},
    property::{PropertyDescriptor, PropertyKind, ResolvedType, TypeMap},
    schema::{SchemaModel, TypeDefinition, TypeKind},
};

const TYPENAME: &str = "__typename";
const ID_TYPE: &str = "ID";

/// Per-resource settings that steer the walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// The identifier field name of the resource
    pub id_field: String,
    /// When present, only these paths are sortable
    pub sortable: Option<Vec<String>>,
    /// Paths forced to reference kind, with the resource they point to
    pub references: HashMap<String, String>,
    /// Paths whose kind is set explicitly
    pub kinds: HashMap<String, PropertyKind>,
    pub preserve_sub_properties: bool,
}

impl WalkOptions {
    pub fn new(id_field: impl Into<String>) -> WalkOptions {
        WalkOptions {
            id_field: id_field.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOutput {
    pub properties: Vec<PropertyDescriptor>,
    pub type_map: TypeMap,
}

/// Walks the selections beneath the document's root field.
///
/// The root field itself belongs to the operation's root type and never
/// becomes a property. Every other field must exist in `schema`.
pub fn walk(
    document: &NormalizedDocument,
    schema: &SchemaModel,
    options: &WalkOptions,
) -> AdapterResult<WalkOutput> {
    let root = &document.root;
    let root_type = schema
        .root_type(document.operation)
        .ok_or_else(|| AdapterError::mismatch(format!("{:?}", document.operation), &root.name))?;
    let root_field = schema
        .field(root_type, &root.name)
        .ok_or_else(|| AdapterError::mismatch(root_type, &root.name))?;

    let mut walker = Walker {
        schema,
        options,
        type_map: TypeMap::default(),
    };
    let mut properties = walker.selections(root_field.ty.named_type(), None, &root.selections)?;
    prune(&mut properties);

    tracing::debug!(
        root = %root.name,
        properties = properties.len(),
        "walked sample document"
    );
    Ok(WalkOutput {
        properties,
        type_map: walker.type_map,
    })
}

struct Walker<'a> {
    schema: &'a SchemaModel,
    options: &'a WalkOptions,
    type_map: TypeMap,
}

impl Walker<'_> {
    fn selections(
        &mut self,
        parent_type: &str,
        prefix: Option<&str>,
        selections: &[FieldSelection],
    ) -> AdapterResult<Vec<PropertyDescriptor>> {
        let mut properties = Vec::with_capacity(selections.len());
        for selection in selections.iter().filter(|s| s.name != TYPENAME) {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{}", selection.response_key()),
                None => selection.response_key().to_string(),
            };
            properties.push(self.field(parent_type, path, prefix.is_none(), selection)?);
        }
        Ok(properties)
    }

    fn field(
        &mut self,
        parent_type: &str,
        path: String,
        top_level: bool,
        selection: &FieldSelection,
    ) -> AdapterResult<PropertyDescriptor> {
        let owner_type = selection.type_condition.as_deref().unwrap_or(parent_type);
        let definition = self
            .schema
            .field(owner_type, &selection.name)
            .ok_or_else(|| AdapterError::mismatch(owner_type, &selection.name))?;
        let unwrapped = definition.ty.unwrapped();
        let named = self
            .schema
            .type_definition(unwrapped.name)
            .ok_or_else(|| AdapterError::mismatch(unwrapped.name, &path))?;

        let enum_values = match named.kind {
            TypeKind::Enum => named.enum_values.clone(),
            _ => Vec::new(),
        };

        let inferred_reference = self.is_reference(named, selection);
        let explicit_reference = self.options.references.get(&path);

        let mut kind = PropertyKind::from_type_name(&named.name);
        if !enum_values.is_empty() {
            kind = PropertyKind::String;
        }
        if let Some(overridden) = self.options.kinds.get(&path) {
            kind = *overridden;
        }
        if inferred_reference || explicit_reference.is_some() {
            kind = PropertyKind::Reference;
        }
        self.type_map.insert(
            path.clone(),
            ResolvedType {
                name: named.name.clone(),
                kind: named.kind,
                property_kind: kind,
                enum_values: enum_values.clone(),
            },
        );

        let reference = match explicit_reference {
            Some(target) => Some(target.clone()),
            None if inferred_reference => Some(named.name.clone()),
            None => None,
        };

        let is_sortable = match &self.options.sortable {
            Some(sortable) => sortable.contains(&path),
            None => kind != PropertyKind::Reference,
        };

        let mut children = Vec::new();
        if !inferred_reference && !selection.is_leaf() {
            children = self.selections(&named.name, Some(&path), &selection.selections)?;
            if !self.options.preserve_sub_properties
                && matches!(children.as_slice(), [only] if only.name() == self.options.id_field)
            {
                children.clear();
            }
        }

        Ok(PropertyDescriptor {
            is_id: top_level && path == self.options.id_field,
            path,
            kind,
            is_array: unwrapped.is_array,
            is_required: unwrapped.is_required,
            is_sortable,
            enum_values,
            reference,
            children,
        })
    }

    /// An object selected only for its `ID` is a pointer to that object
    fn is_reference(&self, named: &TypeDefinition, selection: &FieldSelection) -> bool {
        if !named.kind.is_composite() {
            return false;
        }
        let selected: Vec<_> = selection
            .selections
            .iter()
            .filter(|s| s.name != TYPENAME)
            .collect();
        match selected.as_slice() {
            [only] if only.is_leaf() => {
                let owner_type = only.type_condition.as_deref().unwrap_or(&named.name);
                self.schema
                    .field(owner_type, &only.name)
                    .is_some_and(|field| field.ty.named_type() == ID_TYPE)
            }
            _ => false,
        }
    }
}

/// Drops opaque leaves, innermost first
fn prune(properties: &mut Vec<PropertyDescriptor>) {
    for property in properties.iter_mut() {
        prune(&mut property.children);
    }
    properties.retain(|property| {
        property.kind != PropertyKind::Opaque || !property.children.is_empty()
    });
}
