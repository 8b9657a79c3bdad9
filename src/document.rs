//! Parsing and fragment expansion of resource documents.
//!
//! A resource's sample document is reduced to a single root field whose
//! selection tree no longer contains fragments, so the field walker only
//! ever sees plain fields.

use std::{collections::HashMap, fmt};

use apollo_compiler::{Node, ast};

use crate::{AdapterError, AdapterResult, schema::OperationKind};

/// A GraphQL document as text or as an already parsed tree
#[derive(Clone, Debug)]
pub enum GraphQLDocument {
    Text(String),
    Parsed(ast::Document),
}

impl GraphQLDocument {
    /// Parses the text form; the parsed form is returned as is
    pub fn parse(&self) -> AdapterResult<ast::Document> {
        match self {
            GraphQLDocument::Text(text) => ast::Document::parse(text.as_str(), "resource.graphql")
                .map_err(|err| AdapterError::invalid_document(err.errors.to_string())),
            GraphQLDocument::Parsed(document) => Ok(document.clone()),
        }
    }
}

impl fmt::Display for GraphQLDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphQLDocument::Text(text) => f.write_str(text),
            GraphQLDocument::Parsed(document) => write!(f, "{document}"),
        }
    }
}

impl From<String> for GraphQLDocument {
    fn from(text: String) -> Self {
        GraphQLDocument::Text(text)
    }
}

impl From<&str> for GraphQLDocument {
    fn from(text: &str) -> Self {
        GraphQLDocument::Text(text.to_string())
    }
}

impl From<ast::Document> for GraphQLDocument {
    fn from(document: ast::Document) -> Self {
        GraphQLDocument::Parsed(document)
    }
}

/// A field and the fields selected beneath it, fragments already inlined
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSelection {
    pub alias: Option<String>,
    pub name: String,
    /// The type condition of the innermost fragment the field came from
    pub type_condition: Option<String>,
    pub selections: Vec<FieldSelection>,
}

impl FieldSelection {
    /// The key this field has in a response: its alias, else its name
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.selections.is_empty()
    }
}

/// The single-root-field shape every resource document must reduce to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub operation: OperationKind,
    pub root: FieldSelection,
}

/// Parses `document` if needed, inlines every fragment, and checks that one
/// operation with one root field remains
pub fn normalize(document: &GraphQLDocument) -> AdapterResult<NormalizedDocument> {
    let document = document.parse()?;

    let mut operations = Vec::new();
    let mut fragments = HashMap::new();
    for definition in &document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => operations.push(operation),
            ast::Definition::FragmentDefinition(fragment) => {
                fragments.insert(fragment.name.as_str(), fragment);
            }
            _ => {}
        }
    }

    let operation = match operations.as_slice() {
        [operation] => *operation,
        _ => {
            return Err(AdapterError::invalid_document(format!(
                "expected exactly one operation, found {}",
                operations.len()
            )));
        }
    };
    let kind = match operation.operation_type {
        ast::OperationType::Query => OperationKind::Query,
        ast::OperationType::Mutation => OperationKind::Mutation,
        ast::OperationType::Subscription => {
            return Err(AdapterError::invalid_document(
                "subscriptions cannot describe a resource",
            ));
        }
    };

    let expander = FragmentExpander { fragments };
    let mut roots = expander.selection_set(&operation.selection_set, &mut Vec::new())?;
    if roots.len() != 1 {
        return Err(AdapterError::invalid_document(format!(
            "expected exactly one top-level field, found {}",
            roots.len()
        )));
    }
    Ok(NormalizedDocument {
        operation: kind,
        root: roots.remove(0),
    })
}

struct FragmentExpander<'a> {
    fragments: HashMap<&'a str, &'a Node<ast::FragmentDefinition>>,
}

impl<'a> FragmentExpander<'a> {
    /// `active` holds the fragments currently being expanded, to reject cycles
    fn selection_set(
        &self,
        selections: &'a [ast::Selection],
        active: &mut Vec<&'a str>,
    ) -> AdapterResult<Vec<FieldSelection>> {
        let mut fields = Vec::new();
        for selection in selections {
            match selection {
                ast::Selection::Field(field) => {
                    let field = FieldSelection {
                        alias: field.alias.as_ref().map(|alias| alias.to_string()),
                        name: field.name.to_string(),
                        type_condition: None,
                        selections: self.selection_set(&field.selection_set, active)?,
                    };
                    merge(&mut fields, field)?;
                }
                ast::Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name.as_str();
                    let fragment = self.fragments.get(name).copied().ok_or_else(|| {
                        AdapterError::invalid_document(format!("unknown fragment `{name}`"))
                    })?;
                    if active.contains(&name) {
                        return Err(AdapterError::invalid_document(format!(
                            "fragment `{name}` spreads itself"
                        )));
                    }
                    active.push(name);
                    let expanded = self.selection_set(&fragment.selection_set, active)?;
                    active.pop();
                    for field in expanded {
                        merge(&mut fields, conditioned(field, Some(&fragment.type_condition)))?;
                    }
                }
                ast::Selection::InlineFragment(inline) => {
                    let expanded = self.selection_set(&inline.selection_set, active)?;
                    for field in expanded {
                        merge(&mut fields, conditioned(field, inline.type_condition.as_ref()))?;
                    }
                }
            }
        }
        Ok(fields)
    }
}

/// Tags `field` with `condition` unless an inner fragment already did
fn conditioned(mut field: FieldSelection, condition: Option<&ast::NamedType>) -> FieldSelection {
    if field.type_condition.is_none() {
        field.type_condition = condition.map(|name| name.to_string());
    }
    field
}

/// Adds `field` to `fields`, folding it into an earlier field with the same
/// response key so every key appears once per selection set
fn merge(fields: &mut Vec<FieldSelection>, field: FieldSelection) -> AdapterResult<()> {
    let Some(existing) = fields
        .iter_mut()
        .find(|existing| existing.response_key() == field.response_key())
    else {
        fields.push(field);
        return Ok(());
    };
    if existing.name != field.name {
        return Err(AdapterError::invalid_document(format!(
            "`{}` selects both `{}` and `{}`",
            field.response_key(),
            existing.name,
            field.name
        )));
    }
    for child in field.selections {
        merge(&mut existing.selections, child)?;
    }
    Ok(())
}
