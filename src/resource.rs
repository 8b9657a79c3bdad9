//! Per-resource configuration: the query builders and the hints that steer
//! property inference.

use std::{fmt, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    document::GraphQLDocument, filter::FieldFilter, property::PropertyKind, walker::WalkOptions,
};

/// A flat or nested record, depending on which side of inflate/deflate it is
pub type Record = Map<String, Value>;

/// Reads the typed result out of a response's `data`
pub type ParseFn<T> = Box<dyn FnOnce(Value) -> Result<T, serde_json::Error> + Send>;

/// One call's document, its variables, and how to read its result
pub struct QueryMapping<T> {
    pub document: GraphQLDocument,
    pub variables: Map<String, Value>,
    pub parse: ParseFn<T>,
}

impl<T> QueryMapping<T> {
    pub fn new(
        document: impl Into<GraphQLDocument>,
        variables: Map<String, Value>,
        parse: impl FnOnce(Value) -> Result<T, serde_json::Error> + Send + 'static,
    ) -> QueryMapping<T> {
        QueryMapping {
            document: document.into(),
            variables,
            parse: Box::new(parse),
        }
    }
}

impl<T: DeserializeOwned + 'static> QueryMapping<T> {
    /// Deserializes `data[key]`, the usual place a single root field's
    /// result lands
    pub fn extract(
        document: impl Into<GraphQLDocument>,
        variables: Map<String, Value>,
        key: impl Into<String>,
    ) -> QueryMapping<T> {
        let key = key.into();
        QueryMapping::new(document, variables, move |mut data| {
            let value = data.get_mut(&key).map(Value::take).unwrap_or_default();
            serde_json::from_value(value)
        })
    }
}

impl<T> fmt::Debug for QueryMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMapping")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Pagination and ordering for `find`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindOptions {
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

pub type CountFn = Arc<dyn Fn(&[FieldFilter]) -> QueryMapping<u64> + Send + Sync>;
pub type FindFn =
    Arc<dyn Fn(&[FieldFilter], &FindOptions) -> QueryMapping<Vec<Record>> + Send + Sync>;
pub type FindOneFn = Arc<dyn Fn(&str) -> QueryMapping<Option<Record>> + Send + Sync>;
pub type CreateFn = Arc<dyn Fn(Record) -> QueryMapping<Record> + Send + Sync>;
pub type UpdateFn = Arc<dyn Fn(&str, Record) -> QueryMapping<Record> + Send + Sync>;
pub type DeleteFn = Arc<dyn Fn(&str) -> QueryMapping<Value> + Send + Sync>;

/// Everything a connection needs to expose one resource.
///
/// The `find_one` builder doubles as the sample document: it is called
/// with an empty identifier during initialization and its selection set
/// decides which properties the resource has.
#[derive(Clone)]
pub struct ResourceDescriptor {
    pub(crate) id: String,
    pub(crate) count: CountFn,
    pub(crate) find: FindFn,
    pub(crate) find_one: FindOneFn,
    pub(crate) create: Option<CreateFn>,
    pub(crate) update: Option<UpdateFn>,
    pub(crate) delete: Option<DeleteFn>,
    pub(crate) walk_options: WalkOptions,
}

impl ResourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        id_field: impl Into<String>,
        count: impl Fn(&[FieldFilter]) -> QueryMapping<u64> + Send + Sync + 'static,
        find: impl Fn(&[FieldFilter], &FindOptions) -> QueryMapping<Vec<Record>>
        + Send
        + Sync
        + 'static,
        find_one: impl Fn(&str) -> QueryMapping<Option<Record>> + Send + Sync + 'static,
    ) -> ResourceDescriptor {
        ResourceDescriptor {
            id: id.into(),
            count: Arc::new(count),
            find: Arc::new(find),
            find_one: Arc::new(find_one),
            create: None,
            update: None,
            delete: None,
            walk_options: WalkOptions::new(id_field),
        }
    }

    pub fn with_create(
        mut self,
        create: impl Fn(Record) -> QueryMapping<Record> + Send + Sync + 'static,
    ) -> Self {
        self.create = Some(Arc::new(create));
        self
    }

    pub fn with_update(
        mut self,
        update: impl Fn(&str, Record) -> QueryMapping<Record> + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Arc::new(update));
        self
    }

    pub fn with_delete(
        mut self,
        delete: impl Fn(&str) -> QueryMapping<Value> + Send + Sync + 'static,
    ) -> Self {
        self.delete = Some(Arc::new(delete));
        self
    }

    /// Restricts sorting to the given paths
    pub fn with_sortable_fields<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.walk_options.sortable = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Marks `path` as a reference to the resource `target`
    pub fn with_reference(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.walk_options
            .references
            .insert(path.into(), target.into());
        self
    }

    pub fn with_property_kind(mut self, path: impl Into<String>, kind: PropertyKind) -> Self {
        self.walk_options.kinds.insert(path.into(), kind);
        self
    }

    /// Keeps sub-objects that only select the identifier as nested trees
    pub fn preserve_sub_properties(mut self) -> Self {
        self.walk_options.preserve_sub_properties = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_field(&self) -> &str {
        &self.walk_options.id_field
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("id", &self.id)
            .field("create", &self.create.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .field("walk_options", &self.walk_options)
            .finish_non_exhaustive()
    }
}
