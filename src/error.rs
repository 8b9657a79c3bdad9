use adminql_graphql::GraphQLServiceError;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// AdapterError represents every failure surfaced by a connection or resource.
///
/// None of these are retried internally: they end the call that raised them,
/// after the connection's error observer (if any) has seen them.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The endpoint could not be reached, or did not answer with a GraphQL response.
    #[error("could not reach the GraphQL endpoint: {msg}")]
    Transport {
        /// The error message.
        msg: String,
    },

    /// The endpoint answered with one or more GraphQL errors.
    #[error("the GraphQL endpoint responded with errors: {msg}")]
    RemoteGraphQL {
        /// Every returned error message, one per line.
        msg: String,
    },

    /// The introspection result was not a usable schema.
    #[error("invalid introspection result: {msg}")]
    Schema {
        /// The error message.
        msg: String,
    },

    /// A sample document could not be parsed or has the wrong shape.
    #[error("invalid document: {msg}")]
    InvalidDocument {
        /// The error message.
        msg: String,
    },

    /// A sample document selects something the live schema does not define.
    #[error("field `{field}` on type `{type_name}` has no type in the remote schema")]
    SchemaMismatch {
        /// The parent type the field was looked up on.
        type_name: String,
        /// The field that could not be resolved.
        field: String,
    },

    /// A filter or record value could not be converted to the field's type.
    #[error("cannot use value for `{path}`: {msg}")]
    Coercion {
        /// The property path the value was meant for.
        path: String,
        /// The error message.
        msg: String,
    },

    /// A write was requested on a resource that has no builder for it.
    #[error("resource `{resource}` does not support {action}")]
    NotEditable {
        /// The resource identifier.
        resource: String,
        /// `create`, `update` or `delete`.
        action: &'static str,
    },

    /// A builder's result could not be read into the expected shape.
    #[error("could not read the result of `{resource}`: {msg}")]
    Deserialize {
        /// The resource identifier.
        resource: String,
        /// The error message.
        msg: String,
    },

    /// The connection configuration is unusable.
    #[error("invalid configuration: {msg}")]
    Config {
        /// The error message.
        msg: String,
    },
}

impl AdapterError {
    pub(crate) fn invalid_document(msg: impl Into<String>) -> AdapterError {
        AdapterError::InvalidDocument { msg: msg.into() }
    }

    pub(crate) fn schema(msg: impl Into<String>) -> AdapterError {
        AdapterError::Schema { msg: msg.into() }
    }

    pub(crate) fn coercion(path: impl Into<String>, msg: impl Into<String>) -> AdapterError {
        AdapterError::Coercion {
            path: path.into(),
            msg: msg.into(),
        }
    }

    pub(crate) fn mismatch(type_name: impl Into<String>, field: impl Into<String>) -> AdapterError {
        AdapterError::SchemaMismatch {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

impl From<GraphQLServiceError> for AdapterError {
    fn from(err: GraphQLServiceError) -> Self {
        match err {
            GraphQLServiceError::Remote { .. } => AdapterError::RemoteGraphQL {
                msg: err.to_string(),
            },
            err => AdapterError::Transport {
                msg: err.to_string(),
            },
        }
    }
}

impl From<http::header::InvalidHeaderName> for AdapterError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        AdapterError::Config {
            msg: err.to_string(),
        }
    }
}

impl From<http::header::InvalidHeaderValue> for AdapterError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        AdapterError::Config {
            msg: err.to_string(),
        }
    }
}
