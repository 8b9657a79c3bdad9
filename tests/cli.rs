use std::fs;

use adminql::schema::introspect_sdl;
use assert_cmd::Command;
use httpmock::{Method::POST, MockServer};
use predicates::prelude::*;
use serde_json::json;

const SDL: &str = r#"
    type Query { thing(ID: ID!): Thing }
    type User { ID: ID! }
    type Thing { ID: ID!, name: String!, tags: [String!], owner: User }
"#;

#[test]
fn its_executable() {
    let mut cmd = Command::cargo_bin("adminql").unwrap();

    // running the CLI with no command returns to std err
    let result = cmd.assert();
    result.failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn describe_prints_the_property_tree() {
    let server = MockServer::start();
    let data = introspect_sdl(SDL).unwrap();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .header("x-api-key", "secret");
        then.status(200).json_body(json!({ "data": data }));
    });

    let temp = tempfile::tempdir().unwrap();
    let query = temp.path().join("thing.graphql");
    fs::write(&query, "query Thing($ID: ID!) { thing(ID: $ID) { ID name tags owner { ID } } }")
        .unwrap();

    let mut cmd = Command::cargo_bin("adminql").unwrap();
    cmd.arg("describe")
        .arg("--endpoint")
        .arg(server.url("/graphql"))
        .arg("--query")
        .arg(query.to_str().unwrap())
        .arg("--id-field")
        .arg("ID")
        .arg("-H")
        .arg("x-api-key:secret")
        .arg("--reference")
        .arg("owner=users")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""path": "tags""#))
        .stdout(predicate::str::contains(r#""isArray": true"#))
        .stdout(predicate::str::contains(r#""reference": "users""#));

    mock.assert();
}

#[test]
fn describe_fails_on_a_malformed_query() {
    let temp = tempfile::tempdir().unwrap();
    let query = temp.path().join("bad.graphql");
    fs::write(&query, "query Bad { thing(").unwrap();

    let mut cmd = Command::cargo_bin("adminql").unwrap();
    cmd.arg("describe")
        .arg("--endpoint")
        .arg("http://127.0.0.1:9/graphql")
        .arg("--query")
        .arg(query.to_str().unwrap())
        .arg("--id-field")
        .arg("ID")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid document"));
}
