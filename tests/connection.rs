use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use adminql::{
    AdapterError, Connection, ConnectionConfig, FilterEntry, FindOptions, PropertyDescriptor,
    PropertyKind, QueryMapping, Record, ResourceDescriptor, Sort, SortDirection,
    schema::introspect_sdl,
};
use httpmock::{Method::POST, MockServer};
use indoc::indoc;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Map, Value, json};
use speculoos::prelude::*;
use url::Url;

const SDL: &str = indoc! {r#"
    scalar JSON

    enum Operator { GTE LTE EQ MATCH }

    input Filter { field: String!, is: Operator!, value: JSON }

    type Query {
      thing(ID: ID!): Thing
      things(filters: [Filter!], offset: Int, limit: Int, sort: JSON): [Thing!]!
      thingCount(filters: [Filter!]): Int!
    }

    type Mutation {
      createThing(input: JSON!): Thing!
      updateThing(ID: ID!, input: JSON!): Thing!
      deleteThing(ID: ID!): Boolean!
    }

    type User { ID: ID!, handle: String! }
    type Address { city: String!, street: String }

    type Thing {
      ID: ID!
      name: String!
      tags: [String!]!
      rating: Int
      owner: User
      address: Address
    }
"#};

const THING: &str = indoc! {r#"
    query Thing($ID: ID!) {
      thing(ID: $ID) { ...ThingFields }
    }

    fragment ThingFields on Thing {
      ID
      name
      tags
      rating
      owner { ID }
      address { city street }
    }
"#};

fn variables(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn things() -> ResourceDescriptor {
    ResourceDescriptor::new(
        "things",
        "ID",
        |filters| {
            QueryMapping::extract(
                "query Count($filters: [Filter!]) { thingCount(filters: $filters) }",
                variables(json!({ "filters": filters })),
                "thingCount",
            )
        },
        |filters, options| {
            QueryMapping::extract(
                "query Things($filters: [Filter!], $offset: Int, $limit: Int, $sort: JSON) { things(filters: $filters, offset: $offset, limit: $limit, sort: $sort) { ID name } }",
                variables(json!({
                    "filters": filters,
                    "offset": options.offset,
                    "limit": options.limit,
                    "sort": options.sort,
                })),
                "things",
            )
        },
        |id| QueryMapping::extract(THING, variables(json!({ "ID": id })), "thing"),
    )
}

fn editable_things() -> ResourceDescriptor {
    things()
        .with_create(|input| {
            QueryMapping::extract(
                "mutation Create($input: JSON!) { createThing(input: $input) { ID name tags owner { ID } } }",
                variables(json!({ "input": input })),
                "createThing",
            )
        })
        .with_update(|id, input| {
            QueryMapping::extract(
                "mutation Update($ID: ID!, $input: JSON!) { updateThing(ID: $ID, input: $input) { ID name } }",
                variables(json!({ "ID": id, "input": input })),
                "updateThing",
            )
        })
        .with_delete(|id| {
            QueryMapping::extract(
                "mutation Delete($ID: ID!) { deleteThing(ID: $ID) }",
                variables(json!({ "ID": id })),
                "deleteThing",
            )
        })
}

fn serve_schema(server: &MockServer) {
    let data = introspect_sdl(SDL).unwrap();
    server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("__schema");
        then.status(200).json_body(json!({ "data": data }));
    });
}

fn config(server: &MockServer) -> ConnectionConfig {
    ConnectionConfig::builder()
        .name("test")
        .endpoint(Url::parse(&server.url("/graphql")).unwrap())
        .headers(vec![("x-api-key".to_string(), "secret".to_string())])
        .build()
        .unwrap()
}

fn paths(properties: &[PropertyDescriptor]) -> Vec<&str> {
    properties.iter().map(|p| p.path().as_str()).collect()
}

fn record(value: Value) -> Record {
    variables(value)
}

#[tokio::test]
async fn initialization_derives_properties_from_the_sample_document() {
    let server = MockServer::start_async().await;
    serve_schema(&server);

    let connection = Connection::initialize(config(&server), vec![things()])
        .await
        .unwrap();
    let resource = connection.resource("things").unwrap();

    assert_eq!(
        paths(resource.properties()),
        vec!["ID", "name", "tags", "rating", "owner", "address"]
    );

    let id = resource.property("ID").unwrap();
    assert!(*id.is_id());
    assert_eq!(*id.kind(), PropertyKind::String);

    let tags = resource.property("tags").unwrap();
    assert!(*tags.is_array());
    assert!(*tags.is_required());

    let owner = resource.property("owner").unwrap();
    assert_eq!(*owner.kind(), PropertyKind::Reference);
    assert_eq!(owner.reference().as_deref(), Some("User"));
    assert!(owner.children().is_empty());

    let address = resource.property("address").unwrap();
    assert_eq!(paths(address.children()), vec!["address.city", "address.street"]);
    assert!(*resource.property("address.city").unwrap().is_required());

    assert_eq!(resource.type_map().get("rating").unwrap().name, "Int");
    assert_eq!(connection.name(), "test");
    assert!(connection.schema().type_definition("Thing").is_some());
}

#[tokio::test]
async fn count_and_find_send_coerced_filters() {
    let server = MockServer::start_async().await;
    serve_schema(&server);
    let count = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .header("x-api-key", "secret")
            .body_includes("thingCount")
            .body_includes(r#"{"field":"name","is":"MATCH","value":"wid"}"#)
            .body_includes(r#"{"field":"rating","is":"GTE","value":2}"#)
            .body_includes(r#"{"field":"rating","is":"LTE","value":5}"#);
        then.status(200).json_body(json!({ "data": { "thingCount": 3 } }));
    });
    let find = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query Things")
            .body_includes(r#""offset":10"#)
            .body_includes(r#""direction":"DESC""#);
        then.status(200).json_body(json!({
            "data": { "things": [{ "ID": "1", "name": "widget" }, { "ID": "2", "name": "wide" }] }
        }));
    });

    let connection = Connection::initialize(config(&server), vec![things()])
        .await
        .unwrap();
    let resource = connection.resource("things").unwrap();
    let filter = [
        FilterEntry::single("name", "wid"),
        FilterEntry::range("rating", Some(json!("2")), Some(json!(5))),
    ];

    assert_eq!(resource.count(&filter).await.unwrap(), 3);

    let options = FindOptions {
        offset: 10,
        limit: Some(10),
        sort: Some(Sort {
            field: "name".to_string(),
            direction: SortDirection::Desc,
        }),
    };
    let records = resource.find(&filter, &options).await.unwrap();
    assert_eq!(
        records,
        vec![
            record(json!({ "ID": "1", "name": "widget" })),
            record(json!({ "ID": "2", "name": "wide" })),
        ]
    );

    count.assert_calls_async(1).await;
    find.assert_calls_async(1).await;
}

#[tokio::test]
async fn find_one_flattens_the_result() {
    let server = MockServer::start_async().await;
    serve_schema(&server);
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query Thing(")
            .body_includes(r#""ID":"1""#);
        then.status(200).json_body(json!({
            "data": { "thing": {
                "ID": "1",
                "name": "widget",
                "tags": ["a", "b"],
                "rating": null,
                "owner": { "ID": "u-1" },
                "address": { "city": "Oslo", "street": null }
            } }
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("query Thing(")
            .body_includes(r#""ID":"missing""#);
        then.status(200).json_body(json!({ "data": { "thing": null } }));
    });

    let connection = Connection::initialize(config(&server), vec![things()])
        .await
        .unwrap();
    let resource = connection.resource("things").unwrap();

    let expected = record(json!({
        "ID": "1",
        "name": "widget",
        "tags.0": "a",
        "tags.1": "b",
        "rating": null,
        "owner": "u-1",
        "address.city": "Oslo",
        "address.street": null,
    }));
    assert_eq!(resource.find_one("1").await.unwrap(), Some(expected.clone()));
    assert_eq!(resource.find_one("missing").await.unwrap(), None);
    assert_eq!(
        resource
            .find_many(&["missing".to_string(), "1".to_string()])
            .await
            .unwrap(),
        vec![expected]
    );
}

#[tokio::test]
async fn writes_inflate_records() {
    let server = MockServer::start_async().await;
    serve_schema(&server);
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("createThing")
            .body_includes(r#""tags":["x","y"]"#)
            .body_includes(r#""address":{"city":"Oslo"}"#);
        then.status(200).json_body(json!({
            "data": { "createThing": { "ID": "9", "name": "new", "tags": ["x", "y"], "owner": { "ID": "u-1" } } }
        }));
    });
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_includes("updateThing")
            .body_includes(r#""ID":"9""#)
            .body_includes(r#""name":"renamed""#);
        then.status(200).json_body(json!({
            "data": { "updateThing": { "ID": "9", "name": "renamed" } }
        }));
    });
    let delete = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("deleteThing");
        then.status(200).json_body(json!({ "data": { "deleteThing": true } }));
    });

    let connection = Connection::initialize(config(&server), vec![editable_things()])
        .await
        .unwrap();
    let resource = connection.resource("things").unwrap();

    let created = resource
        .create(record(json!({
            "name": "new",
            "tags.0": "x",
            "tags.1": "y",
            "address.city": "Oslo",
        })))
        .await
        .unwrap();
    assert_eq!(
        created,
        record(json!({ "ID": "9", "name": "new", "tags.0": "x", "tags.1": "y", "owner": "u-1" }))
    );

    let updated = resource
        .update("9", record(json!({ "name": "renamed" })))
        .await
        .unwrap();
    assert_eq!(updated, record(json!({ "ID": "9", "name": "renamed" })));

    resource.delete("9").await.unwrap();

    create.assert_calls_async(1).await;
    update.assert_calls_async(1).await;
    delete.assert_calls_async(1).await;
}

#[tokio::test]
async fn writes_with_out_of_range_indexes_are_rejected() {
    let server = MockServer::start_async().await;
    serve_schema(&server);
    let create = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("createThing");
        then.status(200).json_body(json!({ "data": { "createThing": { "ID": "9" } } }));
    });

    let connection = Connection::initialize(config(&server), vec![editable_things()])
        .await
        .unwrap();
    let resource = connection.resource("things").unwrap();

    assert_that!(
        resource
            .create(record(json!({ "tags.18446744073709551615": "x" })))
            .await
    )
    .is_err()
    .matches(|err| matches!(err, AdapterError::Coercion { .. }));
    create.assert_calls_async(0).await;
}

#[tokio::test]
async fn failures_reach_the_observer() {
    let server = MockServer::start_async().await;
    serve_schema(&server);
    server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("thingCount");
        then.status(200).json_body(json!({
            "data": null,
            "errors": [{ "message": "first" }, { "message": "second" }]
        }));
    });

    let observed = Arc::new(AtomicUsize::new(0));
    let seen = observed.clone();
    let config = config(&server).with_error_observer(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let connection = Connection::initialize(config, vec![things()]).await.unwrap();
    let resource = connection.resource("things").unwrap();

    assert_that!(resource.count(&[]).await)
        .is_err()
        .matches(|err| matches!(err, AdapterError::RemoteGraphQL { msg } if msg.contains("first\nsecond")));
    assert_that!(resource.create(Record::new()).await)
        .is_err()
        .matches(|err| matches!(err, AdapterError::NotEditable { action: "create", .. }));
    assert_that!(resource.count(&[FilterEntry::single("colour", "red")]).await)
        .is_err()
        .matches(|err| matches!(err, AdapterError::Coercion { .. }));

    assert_eq!(observed.load(Ordering::SeqCst), 3);
}

#[rstest]
#[case::two_root_fields("query { thing(ID: \"\") { ID } things { ID } }", "InvalidDocument")]
#[case::unknown_field("query { thing(ID: \"\") { ID colour } }", "SchemaMismatch")]
#[tokio::test]
async fn initialization_aborts_on_bad_sample_documents(
    #[case] sample: &'static str,
    #[case] expected: &str,
) {
    let server = MockServer::start_async().await;
    serve_schema(&server);

    let broken = ResourceDescriptor::new(
        "broken",
        "ID",
        |_| QueryMapping::extract("{ thingCount }", Map::new(), "thingCount"),
        |_, _| QueryMapping::extract("{ things { ID } }", Map::new(), "things"),
        move |_| QueryMapping::extract(sample, Map::new(), "thing"),
    );

    let observed = Arc::new(AtomicUsize::new(0));
    let seen = observed.clone();
    let config = config(&server).with_error_observer(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let result = Connection::initialize(config, vec![things(), broken]).await;

    assert_that!(result).is_err().matches(|err| match err {
        AdapterError::InvalidDocument { .. } => expected == "InvalidDocument",
        AdapterError::SchemaMismatch { .. } => expected == "SchemaMismatch",
        _ => false,
    });
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_resources_are_rejected() {
    let server = MockServer::start_async().await;

    let result = Connection::initialize(config(&server), vec![things(), things()]).await;

    assert_that!(result)
        .is_err()
        .matches(|err| matches!(err, AdapterError::Config { .. }));
}

#[tokio::test]
async fn unreachable_endpoints_fail_initialization() {
    let config = ConnectionConfig::builder()
        .name("offline")
        .endpoint(Url::parse("http://127.0.0.1:9/graphql").unwrap())
        .build()
        .unwrap();

    let result = Connection::initialize(config, vec![things()]).await;

    assert_that!(result)
        .is_err()
        .matches(|err| matches!(err, AdapterError::Transport { .. }));
}
