//! Exposes the types of a GraphQL API as admin-panel resources.
//!
//! A [`Connection`] introspects the endpoint once, then walks each
//! resource's sample document against the schema to derive its
//! [`PropertyDescriptor`] tree. After that, [`Resource`] runs the
//! resource's count/find/write builders, coercing filters with the types
//! recorded during the walk and converting records between flat dotted
//! keys and nested objects.

pub mod cli;
pub mod connection;
pub mod document;
mod error;
pub mod filter;
pub mod logger;
pub mod params;
pub mod property;
pub mod resource;
pub mod schema;
pub mod transport;
pub mod walker;

pub use connection::{Connection, ConnectionConfig, ErrorObserver, Resource};
pub use document::GraphQLDocument;
pub use error::{AdapterError, AdapterResult};
pub use filter::{FieldFilter, FilterEntry, FilterOperator, FilterValue};
pub use property::{PropertyDescriptor, PropertyKind, ResolvedType, TypeMap};
pub use resource::{FindOptions, QueryMapping, Record, ResourceDescriptor, Sort, SortDirection};
pub use schema::SchemaModel;
