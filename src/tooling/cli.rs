//! CLI Tooling
//!
//! Command-line interface for running the server and operating on tables
//! directly against the configured store.

use crate::config::{ConfigLoader, MoldstoreConfig};
use crate::error::ApiError;
use crate::logging::{LogFormat, LogOutput, LoggingConfig};
use crate::search::{filter_records, SearchQuery};
use crate::server::Server;
use crate::service::TableService;
use crate::store::open_store;
use crate::table::{TableRegistry, TableSchema};
use crate::types::Record;
use crate::writer::RetryingWriter;
use clap::{Parser, Subcommand};
use comfy_table::presets::{UTF8_BORDERS_ONLY, UTF8_FULL};
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

/// Moldstore CLI - CSV-backed mold and cutter inventory
#[derive(Parser, Debug)]
#[command(name = "moldstore")]
#[command(about = "Mold and cutter inventory tables with optimistic-concurrency writes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides ./moldstore.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log output
    #[arg(long, global = true, value_enum)]
    pub log_output: Option<LogOutput>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Listen host (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List registered tables and their columns
    Tables {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the rows of a table
    Show {
        /// Table file name, e.g. molds.csv
        table: String,
        /// Case-insensitive substring filter
        #[arg(long)]
        filter: Option<String>,
        /// Restrict the filter to one column
        #[arg(long)]
        field: Option<String>,
        /// Print at most this many rows
        #[arg(long)]
        limit: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Prepend a row to a table
    Append {
        table: String,
        /// Column value as KEY=VALUE (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },
    /// Merge new values into one row
    Update {
        table: String,
        /// Value of the lookup column
        id: String,
        /// Lookup column (defaults to the primary key)
        #[arg(long)]
        id_field: Option<String>,
        /// Column value as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val, required = true)]
        sets: Vec<(String, String)>,
    },
    /// Remove one row
    Delete {
        table: String,
        /// Value of the lookup column
        id: String,
        /// Lookup column (defaults to the primary key)
        #[arg(long)]
        id_field: Option<String>,
    },
}

/// Parse a `KEY=VALUE` argument; the value is kept verbatim
pub fn parse_key_val(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", arg));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Fold the command-line log flags over the configured logging section
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.format = format;
        }
        if let Some(output) = self.log_output {
            config.output = output;
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

/// Load configuration from `--config` or the working directory
pub fn load_config(config_path: Option<&Path>) -> Result<MoldstoreConfig, ApiError> {
    let working_dir = std::env::current_dir()
        .map_err(|e| ApiError::ConfigError(format!("Cannot read working directory: {}", e)))?;
    ConfigLoader::load_with_override(config_path, &working_dir)
        .map_err(|e| ApiError::ConfigError(e.to_string()))
}

/// CLI context holding the configured service and an async runtime
pub struct CliContext {
    config: MoldstoreConfig,
    service: TableService,
    runtime: Runtime,
}

impl CliContext {
    /// Load configuration and open the configured store
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        Self::from_config(load_config(config_path.as_deref())?)
    }

    pub fn from_config(config: MoldstoreConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to start runtime: {}", e)))?;

        let store = open_store(&config.store)?;
        let writer = RetryingWriter::new(store, config.retry.to_policy());
        let service = TableService::new(Arc::new(TableRegistry::builtin()), writer);
        Ok(Self {
            config,
            service,
            runtime,
        })
    }

    pub fn config(&self) -> &MoldstoreConfig {
        &self.config
    }

    pub fn service(&self) -> &TableService {
        &self.service
    }

    /// Execute a CLI command and return its printable output
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Serve { host, port } => self.handle_serve(host.as_deref(), *port),
            Commands::Tables { format } => self.handle_tables(format),
            Commands::Show {
                table,
                filter,
                field,
                limit,
                format,
            } => self.handle_show(table, filter.as_deref(), field.as_deref(), *limit, format),
            Commands::Append { table, fields } => self.handle_append(table, fields),
            Commands::Update {
                table,
                id,
                id_field,
                sets,
            } => self.handle_update(table, id, id_field.as_deref(), sets),
            Commands::Delete {
                table,
                id,
                id_field,
            } => self.handle_delete(table, id, id_field.as_deref()),
        }
    }

    fn handle_serve(&self, host: Option<&str>, port: Option<u16>) -> Result<String, ApiError> {
        let mut server_config = self.config.server.clone();
        if let Some(host) = host {
            server_config.host = host.to_string();
        }
        if let Some(port) = port {
            server_config.port = port;
        }
        let server = Server::with_service(server_config, self.service.clone());
        self.runtime.block_on(server.serve())?;
        Ok("Server stopped".to_string())
    }

    fn handle_tables(&self, format: &str) -> Result<String, ApiError> {
        let tables = self.service.registry().list();
        if format == "json" {
            let schemas: Vec<&TableSchema> = tables.iter().map(|t| t.as_ref()).collect();
            return to_json(&schemas);
        }
        check_text_format(format)?;

        let mut out = format!("{}\n\n", "Tables".bold().underline());
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Table", "Primary key", "ID prefix", "Columns"]);
        for schema in &tables {
            table.add_row(vec![
                schema.name.clone(),
                schema.primary_key().to_string(),
                schema.id_prefix.clone(),
                schema.columns.len().to_string(),
            ]);
        }
        out.push_str(&table.to_string());
        Ok(out)
    }

    fn handle_show(
        &self,
        table_name: &str,
        filter: Option<&str>,
        field: Option<&str>,
        limit: Option<usize>,
        format: &str,
    ) -> Result<String, ApiError> {
        let schema = self.service.registry().get(table_name)?;
        let mut query = SearchQuery::new(filter.unwrap_or_default());
        if let Some(field) = field {
            query = query.in_field(field);
        }
        query.validate(&schema)?;

        let records = self
            .runtime
            .block_on(self.service.read_records(&schema.name))?;
        let mut records = filter_records(&records, &query);
        let total = records.len();
        if let Some(limit) = limit {
            records.truncate(limit);
        }

        if format == "json" {
            return to_json(&records);
        }
        check_text_format(format)?;
        Ok(format_records_text(&schema, &records, total))
    }

    fn handle_append(&self, table: &str, fields: &[(String, String)]) -> Result<String, ApiError> {
        let record: Record = fields.iter().cloned().collect();
        let entry_id = self
            .runtime
            .block_on(self.service.append_log(table, record))?;
        info!(table, entry_id = %entry_id, "Appended from CLI");
        Ok(format!("Added {} to {}", entry_id, table.trim()))
    }

    fn handle_update(
        &self,
        table: &str,
        id: &str,
        id_field: Option<&str>,
        sets: &[(String, String)],
    ) -> Result<String, ApiError> {
        let id_field = self.resolve_id_field(table, id_field)?;
        let patch: Record = sets.iter().cloned().collect();
        let receipt = self
            .runtime
            .block_on(self.service.update_item(table, id, &id_field, &patch))?;
        if receipt.committed {
            Ok(format!("Updated {}={} in {}", id_field, id.trim(), table.trim()))
        } else {
            Ok(format!("{}={} already up to date", id_field, id.trim()))
        }
    }

    fn handle_delete(
        &self,
        table: &str,
        id: &str,
        id_field: Option<&str>,
    ) -> Result<String, ApiError> {
        let id_field = self.resolve_id_field(table, id_field)?;
        self.runtime
            .block_on(self.service.delete_item(table, id, &id_field))?;
        Ok(format!("Deleted {}={} from {}", id_field, id.trim(), table.trim()))
    }

    fn resolve_id_field(&self, table: &str, id_field: Option<&str>) -> Result<String, ApiError> {
        match id_field {
            Some(field) => Ok(field.to_string()),
            None => Ok(self.service.registry().get(table)?.primary_key().to_string()),
        }
    }
}

fn check_text_format(format: &str) -> Result<(), ApiError> {
    if format == "text" {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "Invalid format: {} (must be 'text' or 'json')",
            format
        )))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Render rows in schema column order
pub fn format_records_text(schema: &TableSchema, records: &[Record], total: usize) -> String {
    if records.is_empty() {
        return format!("No rows in {}.", schema.name);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(schema.columns.clone());
    for record in records {
        table.add_row(
            schema
                .columns
                .iter()
                .map(|column| record.value(column).to_string())
                .collect::<Vec<_>>(),
        );
    }
    let shown = if records.len() < total {
        format!("{} of {} rows", records.len(), total)
    } else {
        format!("{} rows", total)
    };
    format!("{}\n{}", table, shown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_keeps_value_verbatim() {
        assert_eq!(
            parse_key_val("MoldName= A, \"B\" ").unwrap(),
            ("MoldName".to_string(), " A, \"B\" ".to_string())
        );
        assert_eq!(
            parse_key_val("Notes=a=b").unwrap(),
            ("Notes".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn log_flags_override_config() {
        let cli = Cli::parse_from(["moldstore", "--verbose", "--log-format", "json", "tables"]);
        let merged = cli.logging_config(&LoggingConfig::default());
        assert_eq!(merged.level, "debug");
        assert_eq!(merged.format, LogFormat::Json);
        assert_eq!(merged.output, LogOutput::Stderr);
    }

    #[test]
    fn memory_context_round_trip() {
        let ctx = CliContext::from_config(MoldstoreConfig::default()).unwrap();
        let added = ctx
            .execute(&Commands::Append {
                table: "molds.csv".to_string(),
                fields: vec![
                    ("MoldID".to_string(), "M1".to_string()),
                    ("MoldName".to_string(), "Foo".to_string()),
                ],
            })
            .unwrap();
        assert_eq!(added, "Added M1 to molds.csv");

        ctx.execute(&Commands::Update {
            table: "molds.csv".to_string(),
            id: "M1".to_string(),
            id_field: None,
            sets: vec![("MoldName".to_string(), "Bar".to_string())],
        })
        .unwrap();

        let shown = ctx
            .execute(&Commands::Show {
                table: "molds.csv".to_string(),
                filter: Some("bar".to_string()),
                field: None,
                limit: None,
                format: "json".to_string(),
            })
            .unwrap();
        let rows: Vec<Record> = serde_json::from_str(&shown).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("MoldName"), "Bar");

        let deleted = ctx
            .execute(&Commands::Delete {
                table: "molds.csv".to_string(),
                id: "M1".to_string(),
                id_field: None,
            })
            .unwrap();
        assert_eq!(deleted, "Deleted MoldID=M1 from molds.csv");
    }

    #[test]
    fn text_rows_follow_schema_order() {
        let schema = TableSchema::new("molds.csv", &["MoldID", "MoldName"], "M").unwrap();
        let records: Vec<Record> = vec![[("MoldName", "Foo"), ("MoldID", "M1")]
            .into_iter()
            .collect()];
        let text = format_records_text(&schema, &records, 3);
        assert!(text.contains("MoldID"));
        assert!(text.ends_with("1 of 3 rows"));
    }
}
