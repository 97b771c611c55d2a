//! # capi: C-API command-line client
//!
//! Talks to a running `capi-hub` and validates filters offline.
//!
//! - `capi measurements --sources A,B --filter '<filter>'` runs a query.
//! - `capi units --sources A` lists a code list.
//! - `capi validate '<filter>'` parses without a hub.

use std::path::{Path, PathBuf};

use capi_core::{
    CapabilitySet, ConnectorCapability, FilterParser, Measurement, MeasurementList, MeasurementObject,
    ParseOutcome, SourceCodeName,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tabled::{settings::Style, Table, Tabled};

/// Client for the C-API measurement federation gateway.
#[derive(Parser)]
#[command(name = "capi", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query measurements from one or more sources.
    Measurements {
        /// Comma-separated source codes.
        #[arg(long)]
        sources: String,
        /// Filter expression, e.g. `quantity:eq:'CONCTTE'`.
        #[arg(long)]
        filter: String,
        /// Print raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List compartment codes.
    Compartments(ListArgs),
    /// List parameter codes.
    Parameters(ListArgs),
    /// List quantity codes.
    Quantities(ListArgs),
    /// List unit codes.
    Units(ListArgs),
    /// List measurement objects.
    MeasurementObjects(ListArgs),

    /// List the sources known to the hub.
    Sources,

    /// Show the hub's active capability set.
    Capabilities,

    /// Parse a filter locally and print its conditions or errors.
    Validate {
        filter: String,
        /// TOML file with `[[capabilities]]` entries (default: built-in set).
        #[arg(long)]
        capabilities: Option<PathBuf>,
        #[arg(long)]
        allow_empty: bool,
        #[arg(long)]
        skip_unknown: bool,
    },
}

#[derive(clap::Args)]
struct ListArgs {
    /// Comma-separated source codes.
    #[arg(long)]
    sources: String,
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            filter,
            capabilities,
            allow_empty,
            skip_unknown,
        } => {
            let capabilities = match capabilities {
                Some(path) => match load_capabilities(&path) {
                    Ok(set) => set,
                    Err(e) => {
                        eprintln!("Cannot load capabilities from {}: {}", path.display(), e);
                        std::process::exit(2);
                    }
                },
                None => CapabilitySet::builtin(),
            };
            let outcome = FilterParser::new(&capabilities)
                .allow_empty(allow_empty)
                .skip_unknown_fields(skip_unknown)
                .parse(Some(&filter));
            println!("{}", render_outcome(&outcome));
            if !outcome.is_valid() {
                std::process::exit(1);
            }
        }

        // Hub commands
        cmd => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to build tokio runtime");

            if let Err(e) = rt.block_on(async_main(cmd)) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn async_main(cmd: Commands) -> Result<(), reqwest::Error> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("CAPI_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());

    match cmd {
        Commands::Measurements { sources, filter, json } => {
            let url = format!("{}/api/measurements", base_url);
            let resp = client
                .get(&url)
                .query(&[("sources", sources.as_str()), ("request", filter.as_str())])
                .send()
                .await?;
            if !resp.status().is_success() {
                return report_rejection(resp).await;
            }
            let list: MeasurementList = resp.json().await?;
            if json {
                print_json(&list);
            } else {
                println!("{}", measurement_table(&list.result));
                for error in &list.errors {
                    eprintln!("! {}", error);
                }
            }
        }

        Commands::Compartments(args) => list_codes(&client, &base_url, "compartments", args).await?,
        Commands::Parameters(args) => list_codes(&client, &base_url, "parameters", args).await?,
        Commands::Quantities(args) => list_codes(&client, &base_url, "quantities", args).await?,
        Commands::Units(args) => list_codes(&client, &base_url, "units", args).await?,

        Commands::MeasurementObjects(args) => {
            let url = format!("{}/api/measurementobjects", base_url);
            let resp = client.get(&url).query(&[("sources", args.sources.as_str())]).send().await?;
            if !resp.status().is_success() {
                return report_rejection(resp).await;
            }
            let objects: Vec<MeasurementObject> = resp.json().await?;
            if args.json {
                print_json(&objects);
            } else {
                let rows = objects.iter().map(|o| CodeRow {
                    source: o.source.clone(),
                    code: o.code.clone(),
                    name: o.name.clone(),
                });
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }

        Commands::Sources => {
            let json = get_json(&client, &format!("{}/api/sources", base_url)).await?;
            print_json(&json);
        }

        Commands::Capabilities => {
            let json = get_json(&client, &format!("{}/api/capabilities", base_url)).await?;
            print_json(&json);
        }

        Commands::Validate { .. } => {}
    }
    Ok(())
}

async fn list_codes(client: &reqwest::Client, base_url: &str, kind: &str, args: ListArgs) -> Result<(), reqwest::Error> {
    let url = format!("{}/api/{}", base_url, kind);
    let resp = client.get(&url).query(&[("sources", args.sources.as_str())]).send().await?;
    if !resp.status().is_success() {
        return report_rejection(resp).await;
    }
    let entries: Vec<SourceCodeName> = resp.json().await?;
    if args.json {
        print_json(&entries);
    } else {
        println!("{}", code_table(&entries));
    }
    Ok(())
}

async fn get_json(client: &reqwest::Client, url: &str) -> Result<serde_json::Value, reqwest::Error> {
    client.get(url).send().await?.json().await
}

async fn report_rejection(resp: reqwest::Response) -> Result<(), reqwest::Error> {
    eprintln!("Request rejected ({})", resp.status());
    let body = resp.text().await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => eprintln!("{}", serde_json::to_string_pretty(&json).unwrap_or(body)),
        Err(_) => eprintln!("{}", body),
    }
    std::process::exit(1);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}

// =============================================================================
// Rendering
// =============================================================================

#[derive(Tabled)]
struct MeasurementRow {
    source: String,
    #[tabled(rename = "object")]
    measurement_object: String,
    date: String,
    compartment: String,
    parameter: String,
    quantity: String,
    value: String,
    unit: String,
}

impl From<&Measurement> for MeasurementRow {
    fn from(m: &Measurement) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            source: m.source.clone(),
            measurement_object: text(&m.measurement_object),
            date: m
                .measurement_date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            compartment: text(&m.compartment),
            parameter: text(&m.parameter),
            quantity: text(&m.quantity),
            value: m.value.map(|v| v.to_string()).unwrap_or_default(),
            unit: text(&m.unit),
        }
    }
}

#[derive(Tabled)]
struct CodeRow {
    source: String,
    code: String,
    name: String,
}

fn measurement_table(measurements: &[Measurement]) -> String {
    Table::new(measurements.iter().map(MeasurementRow::from))
        .with(Style::rounded())
        .to_string()
}

fn code_table(entries: &[SourceCodeName]) -> String {
    let rows = entries.iter().map(|e| CodeRow {
        source: e.source.clone(),
        code: e.code.clone(),
        name: e.name.clone(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_outcome(outcome: &ParseOutcome) -> String {
    if outcome.is_valid() {
        let mut lines = vec![format!("valid: {} condition(s)", outcome.conditions.len())];
        lines.extend(
            outcome
                .conditions
                .iter()
                .map(|c| format!("  {} [{}]", c, c.data_type())),
        );
        lines.join("\n")
    } else {
        let mut lines = vec![format!("invalid: {} error(s)", outcome.errors.len())];
        lines.extend(outcome.errors.iter().map(|e| format!("  {}", e)));
        lines.join("\n")
    }
}

// =============================================================================
// Capabilities file
// =============================================================================

#[derive(Deserialize)]
struct CapabilitiesFile {
    #[serde(default)]
    capabilities: Vec<ConnectorCapability>,
}

fn load_capabilities(path: &Path) -> Result<CapabilitySet, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let file: CapabilitiesFile = toml::from_str(&content).map_err(|e| e.to_string())?;
    if file.capabilities.is_empty() {
        return Ok(CapabilitySet::builtin());
    }
    Ok(CapabilitySet::new(file.capabilities))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rendering() {
        let caps = CapabilitySet::builtin();
        let outcome = FilterParser::new(&caps).parse(Some("quantity:eq:'Q1';value:gt:2.5"));
        let text = render_outcome(&outcome);
        assert!(text.starts_with("valid: 2 condition(s)"));
        assert!(text.contains("quantity:eq:'Q1'"));

        let outcome = FilterParser::new(&caps).parse(Some("unknownfield:eq:'X'"));
        let text = render_outcome(&outcome);
        assert!(text.starts_with("invalid: 1 error(s)"));
        assert!(text.contains("unknownfield"));
    }

    #[test]
    fn test_capabilities_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caps.toml");
        std::fs::write(
            &path,
            "[[capabilities]]\nfieldName = \"depth\"\ndataCategory = \"value\"\nqueryType = \"numeric\"\n",
        )
        .unwrap();
        let caps = load_capabilities(&path).unwrap();
        assert_eq!(caps.field_names(), vec!["depth"]);
        assert!(load_capabilities(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_tables() {
        let mut m = Measurement::new("A");
        m.value = Some(1.5);
        m.unit = Some("mg/l".into());
        let table = measurement_table(&[m]);
        assert!(table.contains("mg/l"));
        assert!(table.contains("1.5"));
        assert!(table.contains("object"));

        let table = code_table(&[SourceCodeName::new("A", "CU", "Copper")]);
        assert!(table.contains("Copper"));
    }
}
