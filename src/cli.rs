use std::{fs, path::PathBuf, str::FromStr, time::Duration};

use adminql_http::extend_headers::HeaderSource;
use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use url::Url;

use crate::{
    connection::ConnectionConfig,
    document::{GraphQLDocument, normalize},
    logger::{LEVELS, Level},
    property::{PropertyDescriptor, PropertyKind, TypeMap},
    schema::fetch_schema,
    transport::GraphQLClient,
    walker::{WalkOptions, walk},
};

#[derive(Debug, Parser)]
#[command(
    name = "adminql",
    version,
    about = "Derive admin-panel resource properties from a GraphQL API"
)]
pub struct Adminql {
    #[command(subcommand)]
    pub command: Command,

    /// Specify adminql's log level
    #[arg(long = "log", short = 'l', global = true, value_parser = parse_level)]
    pub log_level: Option<Level>,
}

impl Adminql {
    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Describe(describe) => describe.run().await,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Introspect an endpoint and print the properties a sample query exposes
    Describe(Describe),
}

#[derive(Debug, Args)]
pub struct Describe {
    /// The GraphQL endpoint to introspect
    #[arg(long)]
    pub endpoint: Url,

    /// A file holding the resource's sample "find one" query
    #[arg(long, value_name = "FILE")]
    pub query: PathBuf,

    /// The name of the identifier field
    #[arg(long, value_name = "NAME")]
    pub id_field: String,

    /// headers to pass to the endpoint. Values must be key:value pairs.
    /// If a value has a space in it, use quotes around the pair,
    /// ex. -H "Auth:some key"
    #[arg(value_name = "KEY:VALUE", long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Option<Vec<(String, String)>>,

    /// Treat a path as a reference to another resource
    #[arg(long = "reference", value_name = "PATH=RESOURCE", value_parser = parse_pair)]
    pub references: Vec<(String, String)>,

    /// Restrict sorting to these paths
    #[arg(long = "sortable", value_name = "PATH")]
    pub sortable: Option<Vec<String>>,

    /// Force the kind of a path
    #[arg(long = "kind", value_name = "PATH=KIND", value_parser = parse_kind)]
    pub kinds: Vec<(String, PropertyKind)>,

    /// Keep sub-objects that only select the identifier
    #[arg(long)]
    pub preserve_sub_properties: bool,

    /// Seconds to wait for the endpoint
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// How many times to retry a failed introspection
    #[arg(long)]
    pub retries: Option<usize>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,
}

#[derive(Debug, Serialize)]
struct Description<'a> {
    properties: &'a [PropertyDescriptor],
    types: &'a TypeMap,
}

impl Describe {
    pub async fn run(&self) -> anyhow::Result<()> {
        let text = fs::read_to_string(&self.query)
            .with_context(|| format!("could not read {}", self.query.display()))?;
        let document = normalize(&GraphQLDocument::from(text))?;

        let config = ConnectionConfig::builder()
            .name("describe")
            .endpoint(self.endpoint.clone())
            .and_headers(self.headers.clone())
            .accept_invalid_certificates(self.insecure)
            .and_timeout(self.timeout)
            .and_retries(self.retries)
            .build()?;
        let client = GraphQLClient::new(
            config.endpoint().clone(),
            HeaderSource::from(config.headers().clone()),
            config.http().clone(),
        )?;
        let schema = fetch_schema(&client).await?;

        let output = walk(&document, &schema, &self.walk_options())?;
        let description = Description {
            properties: &output.properties,
            types: &output.type_map,
        };
        println!("{}", serde_json::to_string_pretty(&description)?);
        Ok(())
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            sortable: self.sortable.clone(),
            references: self.references.iter().cloned().collect(),
            kinds: self.kinds.iter().cloned().collect(),
            preserve_sub_properties: self.preserve_sub_properties,
            ..WalkOptions::new(&self.id_field)
        }
    }
}

fn parse_level(level: &str) -> anyhow::Result<Level> {
    Level::from_str(level)
        .map_err(|_| anyhow!("unknown log level `{level}`, expected one of {LEVELS:?}"))
}

pub(crate) fn parse_header(header: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow!("could not parse \"{header}\" as a KEY:VALUE header"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn parse_pair(pair: &str) -> anyhow::Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(anyhow!("could not parse \"{pair}\" as a KEY=VALUE pair")),
    }
}

fn parse_kind(pair: &str) -> anyhow::Result<(String, PropertyKind)> {
    let (path, kind) = parse_pair(pair)?;
    let kind = kind.parse::<PropertyKind>().map_err(|err| anyhow!(err))?;
    Ok((path, kind))
}

fn parse_seconds(seconds: &str) -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(seconds.parse()?))
}
