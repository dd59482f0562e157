// ==========================================
// 运单动态字段系统 - 命令行入口
// ==========================================
// 输出: 每条命令向 stdout 打印一个 ApiResponse 信封（JSON）
// 日志: stderr（RUST_LOG 控制级别）
// ==========================================

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};

use shipment_schema::api::ApiResponse;
use shipment_schema::app::commands;
use shipment_schema::app::{get_default_db_path, AppState};
use shipment_schema::domain::import_job::{ColumnMapping, ImportExecuteRequest};
use shipment_schema::logging;

#[derive(Parser)]
#[command(
    name = "shipment-schema",
    version,
    about = "Shipment dynamic schema engine: field definitions, validation and spreadsheet import"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database path (default: $SHIPMENT_SCHEMA_DB_PATH or the user data dir).
    #[arg(long = "db", value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Field definition management.
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// Two-phase spreadsheet import.
    #[command(subcommand)]
    Import(ImportCommand),

    /// Stored shipments.
    #[command(subcommand)]
    Shipment(ShipmentCommand),
}

#[derive(Subcommand)]
enum SchemaCommand {
    /// List all field definitions in display order.
    List {
        /// Only visible fields.
        #[arg(long)]
        visible: bool,
    },
    /// Seed the default shipment fields when the store is empty.
    Init,
    /// List distinct field groups.
    Groups,
    /// List supported field types.
    Types,
    /// Validate a JSON object of values against the schema.
    Validate {
        #[arg(long, value_name = "JSON")]
        values: String,
    },
    /// Assemble the form for a JSON object of values.
    Form {
        #[arg(long, value_name = "JSON", default_value = "{}")]
        values: String,
    },
}

#[derive(Subcommand)]
enum ImportCommand {
    /// Stage a file and print headers, sample rows and the suggested mapping.
    Preview {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Import a previewed file with a column mapping.
    Execute {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
        /// Column mapping as JSON: {"<header>": "<fieldKey>" | "skip"}.
        #[arg(long, value_name = "JSON")]
        mapping: String,
        /// Default values applied to every row, as a JSON object.
        #[arg(long, value_name = "JSON")]
        defaults: Option<String>,
    },
    /// Discard a previewed file.
    Discard {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
}

#[derive(Subcommand)]
enum ShipmentCommand {
    /// List shipments, newest first.
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    /// Show one shipment by id, or by AWB number with --awb.
    Get {
        #[arg(value_name = "ID", required_unless_present = "awb")]
        id: Option<String>,
        #[arg(long, value_name = "AWB", conflicts_with = "id")]
        awb: Option<String>,
    },
    /// Delete one shipment.
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Create a shipment from a JSON object of values.
    Create {
        #[arg(long, value_name = "JSON")]
        values: String,
    },
}

fn parse_object(label: &str, raw: &str) -> anyhow::Result<Map<String, Value>> {
    serde_json::from_str(raw).with_context(|| format!("--{} must be a JSON object", label))
}

fn emit<T: Serialize>(response: ApiResponse<T>) -> bool {
    println!("{}", commands::to_json(&response));
    response.success
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let db_path = cli
        .db
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(get_default_db_path);
    tracing::debug!(db_path = %db_path, "使用数据库");

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    let ok = match cli.command {
        Command::Schema(cmd) => match cmd {
            SchemaCommand::List { visible: true } => emit(commands::list_visible_fields(&state)),
            SchemaCommand::List { visible: false } => emit(commands::list_fields(&state)),
            SchemaCommand::Init => emit(commands::initialize_default_fields(&state)),
            SchemaCommand::Groups => emit(commands::list_field_groups(&state)),
            SchemaCommand::Types => emit(commands::list_field_types(&state)),
            SchemaCommand::Validate { values } => {
                let values = parse_object("values", &values)?;
                emit(commands::validate_values(&state, &values))
            }
            SchemaCommand::Form { values } => {
                let values = parse_object("values", &values)?;
                emit(commands::assemble_form(&state, &values))
            }
        },
        Command::Import(cmd) => match cmd {
            ImportCommand::Preview { file } => {
                emit(commands::import_preview(&state, &file.to_string_lossy()).await)
            }
            ImportCommand::Execute {
                job_id,
                mapping,
                defaults,
            } => {
                let mapping: ColumnMapping = serde_json::from_str(&mapping)
                    .context("--mapping must be a JSON object of header to field key")?;
                let default_values = match defaults {
                    Some(raw) => parse_object("defaults", &raw)?,
                    None => Map::new(),
                };
                let request = ImportExecuteRequest {
                    file_reference: job_id,
                    mapping,
                    default_values,
                };
                emit(commands::import_execute(&state, &request).await)
            }
            ImportCommand::Discard { job_id } => emit(commands::import_discard(&state, &job_id).await),
        },
        Command::Shipment(cmd) => match cmd {
            ShipmentCommand::List { limit, offset } => {
                emit(commands::list_shipments(&state, limit, offset))
            }
            ShipmentCommand::Get { id, awb } => match (id, awb) {
                (_, Some(awb)) => emit(commands::get_shipment_by_awb(&state, &awb)),
                (Some(id), None) => emit(commands::get_shipment(&state, &id)),
                (None, None) => anyhow::bail!("either <ID> or --awb is required"),
            },
            ShipmentCommand::Delete { id } => emit(commands::delete_shipment(&state, &id)),
            ShipmentCommand::Create { values } => {
                let values = parse_object("values", &values)?;
                emit(commands::create_shipment(&state, &values))
            }
        },
    };

    Ok(ok)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.log_format {
        LogFormatArg::Pretty => logging::init(),
        LogFormatArg::Json => logging::init_json(),
    }
    tracing::debug!(version = shipment_schema::VERSION, "{}", shipment_schema::APP_NAME);

    let ok = run(cli).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
