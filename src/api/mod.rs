use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{AccountYear, HouseholdConfig, HouseholdReport, presets, simulate_household};
use crate::render::{render_account_year, render_tax_return};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Document {
    Checking,
    Savings,
    Retirement,
    Utility,
    Tax,
    All,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "statement-sim",
    about = "Synthetic household financial statements (checking, savings, retirement, utilities, tax)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate one year of statements and print them.
    Generate(GenerateArgs),
    /// Serve the statements API over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, default_value_t = 2024)]
    pub year: i32,
    #[arg(long, default_value_t = 42, help = "Base seed; the same seed reproduces the same statements")]
    pub seed: u64,
    #[arg(long, value_enum, default_value_t = Document::All)]
    pub document: Document,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long, help = "JSON household configuration; defaults to the built-in Doe household")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatementsPayload {
    year: Option<i32>,
    seed: Option<u64>,
    document: Option<Document>,
    household: Option<HouseholdConfig>,
}

#[derive(Debug)]
struct StatementRequest {
    household: HouseholdConfig,
    year: i32,
    seed: u64,
    document: Document,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(args: &GenerateArgs) -> Result<StatementRequest, String> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&args.year) {
        return Err(format!("--year must be between {MIN_YEAR} and {MAX_YEAR}"));
    }

    let household = match &args.config {
        Some(path) => load_household(path)?,
        None => presets::doe_household(),
    };

    let request = StatementRequest {
        household,
        year: args.year,
        seed: args.seed,
        document: args.document,
    };
    check_document(&request)?;
    Ok(request)
}

fn load_household(path: &Path) -> Result<HouseholdConfig, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("--config {}: cannot read file: {e}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("--config {}: invalid household JSON: {e}", path.display()))
}

fn check_document(request: &StatementRequest) -> Result<(), String> {
    let household = &request.household;
    let missing = match request.document {
        Document::Savings => household.savings.is_none().then_some("a savings account"),
        Document::Retirement => household.retirement.is_empty().then_some("a retirement plan"),
        Document::Utility => household.utilities.is_empty().then_some("a utility account"),
        Document::Tax => household.tax.is_none().then_some("a tax return"),
        Document::Checking | Document::All => None,
    };
    match missing {
        Some(what) => Err(format!("--document: the household has no {what}")),
        None => Ok(()),
    }
}

fn generate(request: &StatementRequest) -> Result<HouseholdReport, String> {
    simulate_household(&request.household, request.year, request.seed).map_err(|e| e.to_string())
}

fn selected_accounts(report: &HouseholdReport, document: Document) -> Vec<&AccountYear> {
    match document {
        Document::Checking => vec![&report.checking],
        Document::Savings => report.savings.iter().collect(),
        Document::Retirement => report.retirement.iter().collect(),
        Document::Utility => report.utilities.iter().collect(),
        Document::Tax => Vec::new(),
        Document::All => report.accounts().collect(),
    }
}

fn document_json(report: &HouseholdReport, document: Document) -> serde_json::Result<serde_json::Value> {
    match document {
        Document::All => serde_json::to_value(report),
        Document::Tax => serde_json::to_value(&report.tax),
        _ => serde_json::to_value(selected_accounts(report, document)),
    }
}

fn document_text(report: &HouseholdReport, document: Document) -> Result<String, fmt::Error> {
    let mut text = String::new();
    for account in selected_accounts(report, document) {
        render_account_year(&mut text, &report.bank_name, &report.holder, account)?;
    }
    if matches!(document, Document::Tax | Document::All) {
        if let Some(ret) = &report.tax {
            render_tax_return(&mut text, &report.holder, ret)?;
        }
    }
    Ok(text)
}

pub fn run_generate(args: &GenerateArgs) -> Result<String, String> {
    let request = build_request(args)?;
    let report = generate(&request)?;
    match args.format {
        OutputFormat::Json => document_json(&report, request.document)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .map_err(|e| format!("failed to encode statements: {e}")),
        OutputFormat::Text => document_text(&report, request.document)
            .map_err(|e| format!("failed to render statements: {e}")),
    }
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Generate(args) => {
            let output = run_generate(&args)?;
            print!("{output}");
            Ok(())
        }
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("server error: {e}")),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/statements",
            get(statements_get_handler).post(statements_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "statements HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn statements_get_handler(Query(payload): Query<StatementsPayload>) -> Response {
    statements_response(payload)
}

async fn statements_post_handler(Json(payload): Json<StatementsPayload>) -> Response {
    statements_response(payload)
}

fn statements_response(payload: StatementsPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let report = match generate(&request) {
        Ok(report) => report,
        Err(msg) => {
            warn!(year = request.year, seed = request.seed, error = %msg, "statement generation failed");
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
        }
    };

    match document_json(&report, request.document) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<StatementRequest, String> {
    let payload = serde_json::from_str::<StatementsPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: StatementsPayload) -> Result<StatementRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.year {
        args.year = v;
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }
    if let Some(v) = payload.document {
        args.document = v;
    }

    let mut request = build_request(&args)?;
    if let Some(household) = payload.household {
        request.household = household;
        check_document(&request)?;
    }
    Ok(request)
}

fn default_args_for_api() -> GenerateArgs {
    GenerateArgs {
        year: 2024,
        seed: 42,
        document: Document::All,
        format: OutputFormat::Json,
        config: None,
    }
}
