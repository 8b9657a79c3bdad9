//! A connection to one GraphQL endpoint and the resources it serves.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use adminql_http::{
    HttpServiceConfig,
    extend_headers::{HeaderProvider, HeaderSource},
};
use buildstructor::buildstructor;
use derive_getters::Getters;
use http::{HeaderMap, HeaderName, HeaderValue};
use itertools::Itertools;
use url::Url;

use crate::{
    AdapterError, AdapterResult,
    document::normalize,
    filter::{FilterEntry, map_filter},
    params::{deflate, inflate},
    property::{PropertyDescriptor, TypeMap},
    resource::{FindOptions, QueryMapping, Record, ResourceDescriptor},
    schema::{SchemaModel, fetch_schema},
    transport::GraphQLClient,
    walker::walk,
};

/// Sees every error before it is returned to the caller
pub type ErrorObserver = Arc<dyn Fn(&AdapterError) + Send + Sync>;

#[derive(Clone, Getters)]
pub struct ConnectionConfig {
    name: String,
    endpoint: Url,
    headers: HeaderMap,
    http: HttpServiceConfig,
    #[getter(skip)]
    header_provider: Option<HeaderProvider>,
    #[getter(skip)]
    error_observer: Option<ErrorObserver>,
}

#[buildstructor]
impl ConnectionConfig {
    #[builder]
    pub fn new(
        name: String,
        endpoint: Url,
        headers: Option<Vec<(String, String)>>,
        accept_invalid_certificates: Option<bool>,
        timeout: Option<Duration>,
        retries: Option<usize>,
    ) -> AdapterResult<ConnectionConfig> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers.iter().flatten() {
            let name = HeaderName::from_str(name)?;
            let value = HeaderValue::from_str(value)?;
            header_map.insert(name, value);
        }
        let http = HttpServiceConfig::builder()
            .and_accept_invalid_certificates(accept_invalid_certificates)
            .and_timeout(timeout)
            .and_retries(retries)
            .build();
        Ok(ConnectionConfig {
            name,
            endpoint,
            headers: header_map,
            http,
            header_provider: None,
            error_observer: None,
        })
    }

    /// Computes extra headers per request, on top of the static ones
    pub fn with_header_provider(
        mut self,
        provider: impl Fn() -> HeaderMap + Send + Sync + 'static,
    ) -> Self {
        self.header_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_error_observer(
        mut self,
        observer: impl Fn(&AdapterError) + Send + Sync + 'static,
    ) -> Self {
        self.error_observer = Some(Arc::new(observer));
        self
    }

    fn header_source(&self) -> HeaderSource {
        HeaderSource::new(self.headers.clone(), self.header_provider.clone())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("headers", &self.headers)
            .field("http", &self.http)
            .field("header_provider", &self.header_provider.is_some())
            .field("error_observer", &self.error_observer.is_some())
            .finish()
    }
}

/// An initialized connection: the schema and every resource's properties,
/// all immutable from here on
#[derive(Clone)]
pub struct Connection {
    name: String,
    schema: Arc<SchemaModel>,
    resources: Vec<Arc<Resource>>,
}

impl Connection {
    /// Fetches the schema once, then derives the properties of every
    /// resource from its sample document. Fails on the first error; no
    /// resource of a failed initialization is usable.
    pub async fn initialize(
        config: ConnectionConfig,
        resources: Vec<ResourceDescriptor>,
    ) -> AdapterResult<Connection> {
        let client = GraphQLClient::new(
            config.endpoint.clone(),
            config.header_source(),
            config.http.clone(),
        )?;
        let observer = config.error_observer.clone();
        let observe = |err: AdapterError| {
            report(&observer, &config.name, &err);
            err
        };

        if let Some(id) = resources.iter().map(ResourceDescriptor::id).duplicates().next() {
            return Err(observe(AdapterError::Config {
                msg: format!("resource `{id}` is configured twice"),
            }));
        }

        tracing::debug!(connection = %config.name, resources = resources.len(), "initializing");
        let schema = Arc::new(fetch_schema(&client).await.map_err(observe)?);

        let mut initialized = Vec::with_capacity(resources.len());
        for descriptor in resources {
            let resource = Resource::new(descriptor, &schema, client.clone(), observer.clone())
                .map_err(observe)?;
            initialized.push(Arc::new(resource));
        }

        tracing::debug!(connection = %config.name, "initialized");
        Ok(Connection {
            name: config.name,
            schema,
            resources: initialized,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    pub fn resource(&self, id: &str) -> Option<&Arc<Resource>> {
        self.resources.iter().find(|resource| resource.id() == id)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

fn report(observer: &Option<ErrorObserver>, scope: &str, err: &AdapterError) {
    tracing::warn!(%scope, error = %err, "operation failed");
    if let Some(observer) = observer {
        observer(err);
    }
}

/// One initialized resource.
///
/// Filters are checked against the types recorded when the properties were
/// derived. Records cross this API flat, with dotted keys.
pub struct Resource {
    descriptor: ResourceDescriptor,
    properties: Vec<PropertyDescriptor>,
    type_map: TypeMap,
    client: GraphQLClient,
    observer: Option<ErrorObserver>,
}

impl Resource {
    fn new(
        descriptor: ResourceDescriptor,
        schema: &SchemaModel,
        client: GraphQLClient,
        observer: Option<ErrorObserver>,
    ) -> AdapterResult<Resource> {
        let sample = (descriptor.find_one)("");
        let document = normalize(&sample.document)?;
        let output = walk(&document, schema, &descriptor.walk_options)?;
        tracing::debug!(
            resource = %descriptor.id,
            properties = output.properties.len(),
            "resource initialized"
        );
        Ok(Resource {
            descriptor,
            properties: output.properties,
            type_map: output.type_map,
            client,
            observer,
        })
    }

    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    pub fn id_field(&self) -> &str {
        self.descriptor.id_field()
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks up a property by dotted path, descending into sub-objects
    pub fn property(&self, path: &str) -> Option<&PropertyDescriptor> {
        PropertyDescriptor::find(&self.properties, path)
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub async fn count(&self, filter: &[FilterEntry]) -> AdapterResult<u64> {
        let result = async {
            let filters = map_filter(&self.type_map, filter)?;
            self.execute((self.descriptor.count)(&filters)).await
        };
        self.observe(result.await)
    }

    pub async fn find(
        &self,
        filter: &[FilterEntry],
        options: &FindOptions,
    ) -> AdapterResult<Vec<Record>> {
        let result = async {
            let filters = map_filter(&self.type_map, filter)?;
            let records = self
                .execute((self.descriptor.find)(&filters, options))
                .await?;
            Ok::<_, AdapterError>(records.iter().map(|record| self.deflate(record)).collect())
        };
        self.observe(result.await)
    }

    pub async fn find_one(&self, id: &str) -> AdapterResult<Option<Record>> {
        let result = self.execute((self.descriptor.find_one)(id)).await;
        self.observe(result.map(|record| record.map(|record| self.deflate(&record))))
    }

    /// Fetches each id in turn; ids that match nothing are left out
    pub async fn find_many(&self, ids: &[String]) -> AdapterResult<Vec<Record>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.find_one(id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn create(&self, record: Record) -> AdapterResult<Record> {
        let result = async {
            let create = self
                .descriptor
                .create
                .as_ref()
                .ok_or_else(|| self.not_editable("create"))?;
            let created = self.execute(create(inflate(&record)?)).await?;
            Ok::<_, AdapterError>(self.deflate(&created))
        };
        self.observe(result.await)
    }

    pub async fn update(&self, id: &str, record: Record) -> AdapterResult<Record> {
        let result = async {
            let update = self
                .descriptor
                .update
                .as_ref()
                .ok_or_else(|| self.not_editable("update"))?;
            let updated = self.execute(update(id, inflate(&record)?)).await?;
            Ok::<_, AdapterError>(self.deflate(&updated))
        };
        self.observe(result.await)
    }

    pub async fn delete(&self, id: &str) -> AdapterResult<()> {
        let result = async {
            let delete = self
                .descriptor
                .delete
                .as_ref()
                .ok_or_else(|| self.not_editable("delete"))?;
            self.execute(delete(id)).await.map(drop)
        };
        self.observe(result.await)
    }

    async fn execute<T>(&self, mapping: QueryMapping<T>) -> AdapterResult<T> {
        let QueryMapping {
            document,
            variables,
            parse,
        } = mapping;
        let data = self.client.execute(document.to_string(), variables).await?;
        parse(data).map_err(|err| AdapterError::Deserialize {
            resource: self.id().to_string(),
            msg: err.to_string(),
        })
    }

    fn deflate(&self, record: &Record) -> Record {
        deflate(record, self.id_field())
    }

    fn not_editable(&self, action: &'static str) -> AdapterError {
        AdapterError::NotEditable {
            resource: self.id().to_string(),
            action,
        }
    }

    fn observe<T>(&self, result: AdapterResult<T>) -> AdapterResult<T> {
        if let Err(err) = &result {
            report(&self.observer, self.id(), err);
        }
        result
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id())
            .field("properties", &self.properties.len())
            .finish_non_exhaustive()
    }
}
