//! The client-side view of a remote schema.
//!
//! The model is always built from an introspection result: either one
//! fetched from the endpoint, or one computed locally from SDL.

mod introspection;
mod model;

use apollo_compiler::{ExecutableDocument, Schema, introspection as executor, validation::Valid};
use serde_json::{Map, Value};

pub use introspection::INTROSPECTION_QUERY;
pub use model::{
    FieldDefinition, OperationKind, SchemaModel, TypeDefinition, TypeKind, TypeRef, UnwrappedType,
};

use crate::{AdapterError, AdapterResult, transport::GraphQLClient};
use introspection::IntrospectionData;

/// Runs the introspection query against the client's endpoint and builds a
/// [`SchemaModel`] from the answer
pub async fn fetch_schema(client: &GraphQLClient) -> AdapterResult<SchemaModel> {
    tracing::debug!(endpoint = %client.endpoint(), "introspecting schema");
    let data = client.execute(INTROSPECTION_QUERY, Map::new()).await?;
    let schema = SchemaModel::from_introspection_data(data)?;
    tracing::debug!(types = schema.len(), "schema introspected");
    Ok(schema)
}

/// Executes the introspection query locally against an SDL document and
/// returns the `data` object a live endpoint serving it would return
pub fn introspect_sdl(sdl: &str) -> AdapterResult<Value> {
    let schema = Schema::parse_and_validate(sdl, "schema.graphql")
        .map_err(|err| AdapterError::schema(err.errors.to_string()))?;
    let document =
        ExecutableDocument::parse_and_validate(&schema, INTROSPECTION_QUERY, "introspection.graphql")
            .map_err(|err| AdapterError::schema(err.errors.to_string()))?;
    let operation = document
        .operations
        .get(None)
        .map_err(|_| AdapterError::schema("the introspection query must have one operation"))?;
    let response = executor::partial_execute(
        &schema,
        &schema.implementers_map(),
        &document,
        operation,
        Valid::assume_valid_ref(&Default::default()),
    )
    .map_err(|err| AdapterError::schema(err.message().to_string()))?;

    let mut response =
        serde_json::to_value(&response).map_err(|err| AdapterError::schema(err.to_string()))?;
    match response.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(AdapterError::schema("introspection produced no data")),
    }
}

impl SchemaModel {
    /// Builds the model from the `data` object of an introspection response
    pub fn from_introspection_data(data: Value) -> AdapterResult<SchemaModel> {
        let data: IntrospectionData =
            serde_json::from_value(data).map_err(|err| AdapterError::schema(err.to_string()))?;
        let schema = data
            .schema
            .ok_or_else(|| AdapterError::schema("the response has no `__schema`"))?;
        SchemaModel::from_introspection(&schema)
    }

    /// Builds the model for an SDL document without any network access
    pub fn from_sdl(sdl: &str) -> AdapterResult<SchemaModel> {
        SchemaModel::from_introspection_data(introspect_sdl(sdl)?)
    }
}
