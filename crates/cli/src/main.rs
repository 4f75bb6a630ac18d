use std::io::{BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::signal;
use tracing::{info, warn};
use warden_api::{ConsoleConfig, HttpApi};
use warden_console::{
    BulkAction, Discard, RenderSink, ScreenController, ScreenKind, ScreenUpdate, StatusKind, StatusLine, StatusSink,
};
use warden_core::{Record, SelectionSet};
use warden_ops::{BulkRun, ReasonChoice, ReasonPolicy, ReasonRequest, ReasonResolver};

#[derive(Parser, Debug)]
#[command(name = "wardenctl", version, about = "Warden admin console CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Admin API base URL
    #[arg(long = "api-base", global = true, env = "WARDEN_API_BASE")]
    api_base: Option<String>,

    /// Bearer token for the admin API
    #[arg(long = "token", global = true, env = "WARDEN_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the admin screens and what they offer
    Screens,
    /// Fetch a screen's collection and print the visible rows
    Ls {
        /// Screen name, e.g. "content" or "submissions"
        screen: String,
        /// Server-side filter, repeatable: --filter status=draft
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Client-side search over the screen's search fields
        #[arg(long = "search")]
        search: Option<String>,
        /// Page size (default: WARDEN_PAGE_SIZE)
        #[arg(long = "limit")]
        limit: Option<u32>,
    },
    /// Show one record
    Get {
        screen: String,
        id: u64,
    },
    /// Apply an action to a set of ids
    Bulk {
        screen: String,
        /// publish, unpublish, approve, reject, review, mark-read, delete
        action: String,
        /// Comma separated ids, e.g. 3,7,9
        #[arg(long = "ids")]
        ids: String,
        /// Reason for reject (or note for approve); prompted when required and missing
        #[arg(long = "reason")]
        reason: Option<String>,
        /// Never prompt; a missing required reason cancels the batch
        #[arg(long = "no-prompt", action = ArgAction::SetTrue)]
        no_prompt: bool,
    },
    /// Refresh a screen on an interval until Ctrl-C
    Poll {
        screen: String,
        /// Interval in milliseconds (default: WARDEN_POLL_MS)
        #[arg(long = "interval-ms")]
        interval_ms: Option<f64>,
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("WARDEN_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("WARDEN_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid WARDEN_METRICS_ADDR; expected host:port");
        }
    }
}

/// Status lines go to stderr so stdout stays parseable.
struct StderrStatus;

impl StatusSink for StderrStatus {
    fn status(&self, line: StatusLine) {
        eprintln!("[{}] {}", line.kind.as_str(), line.text);
    }
}

/// Prints every render update as it arrives (used by `poll`).
struct PrintUpdates {
    output: Output,
    columns: Vec<&'static str>,
}

impl RenderSink for PrintUpdates {
    fn render(&self, update: ScreenUpdate) {
        match (&update, self.output) {
            (ScreenUpdate::Visible { rows, total, .. }, Output::Human) => {
                println!("-- {} of {} rows", rows.len(), total);
                print_rows(&self.columns, rows);
            }
            (ScreenUpdate::Poll(state), Output::Human) => {
                eprintln!("[info] polling {} ({}ms)", if state.enabled { "on" } else { "off" }, state.interval_ms);
            }
            (_, Output::Human) => {}
            (_, Output::Json) => match serde_json::to_string(&update) {
                Ok(s) => println!("{}", s),
                Err(e) => warn!(error = %e, "encode update failed"),
            },
        }
    }
}

/// Reads a reason from stdin when the batch needs one. Empty input cancels.
struct StdinReason {
    given: Option<String>,
    prompt: bool,
}

#[async_trait::async_trait]
impl ReasonResolver for StdinReason {
    async fn resolve(&self, request: &ReasonRequest) -> ReasonChoice {
        if self.given.is_some() || request.policy != ReasonPolicy::Required {
            return ReasonChoice::Provided(self.given.clone());
        }
        if !self.prompt {
            return ReasonChoice::Cancelled;
        }
        let label = format!("{} {} item(s); reason (empty cancels): ", request.action, request.count);
        let line = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "{}", label);
            let _ = stderr.flush();
            let mut buf = String::new();
            std::io::stdin().lock().read_line(&mut buf).map(|_| buf)
        })
        .await;
        match line {
            Ok(Ok(s)) if !s.trim().is_empty() => ReasonChoice::Provided(Some(s.trim().to_string())),
            Ok(Err(e)) => {
                warn!(error = %e, "reading reason failed");
                ReasonChoice::Cancelled
            }
            _ => ReasonChoice::Cancelled,
        }
    }
}

fn parse_filter(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=').ok_or_else(|| anyhow!("invalid filter '{}': expected KEY=VALUE", raw))
}

fn columns(kind: ScreenKind) -> Vec<&'static str> {
    kind.spec().search_fields.iter().copied().filter(|f| *f != "id").collect()
}

fn cell(record: &Record, field: &str) -> String {
    let text = record.field_text(field).map(|c| c.into_owned()).unwrap_or_else(|| "-".to_string());
    if text.chars().count() > 32 {
        let short: String = text.chars().take(31).collect();
        format!("{}…", short)
    } else {
        text
    }
}

fn print_rows(columns: &[&str], rows: &[Record]) {
    let header: Vec<String> = columns.iter().map(|c| format!("{:<32}", c.to_uppercase())).collect();
    println!("{:<8} {}", "ID", header.join(" "));
    for r in rows {
        let cells: Vec<String> = columns.iter().map(|c| format!("{:<32}", cell(r, c))).collect();
        println!("{:<8} {}", r.id, cells.join(" "));
    }
}

fn open_screen(
    kind: ScreenKind,
    config: &ConsoleConfig,
    render: Arc<dyn RenderSink>,
) -> Result<ScreenController> {
    let api = Arc::new(HttpApi::new(config)?);
    Ok(ScreenController::new(kind, api, config, render, Arc::new(StderrStatus)))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut config = ConsoleConfig::from_env();
    if let Some(base) = cli.api_base.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        config.api_base = base.trim_end_matches('/').to_string();
    }
    if let Some(token) = cli.token.clone().filter(|t| !t.trim().is_empty()) {
        config.api_token = Some(token);
    }
    info!(api_base = %config.api_base, page_size = config.page_size, "wardenctl starting");

    match cli.command {
        Commands::Screens => match cli.output {
            Output::Human => {
                for kind in ScreenKind::ALL {
                    let spec = kind.spec();
                    let actions: Vec<_> = spec.actions.iter().map(|a| a.name()).collect();
                    println!(
                        "{:<14} filters: {:<32} actions: {}{}",
                        kind.name(),
                        spec.filters.join(","),
                        if actions.is_empty() { "-".to_string() } else { actions.join(",") },
                        if spec.poll_by_default { "  (polls)" } else { "" }
                    );
                }
            }
            Output::Json => {
                let specs: Vec<_> = ScreenKind::ALL.into_iter().map(|k| k.spec()).collect();
                println!("{}", serde_json::to_string_pretty(&specs)?);
            }
        },
        Commands::Ls { screen: name, filters, search, limit } => {
            let kind: ScreenKind = name.parse()?;
            if let Some(limit) = limit { config.page_size = limit; }
            let screen = open_screen(kind, &config, Arc::new(Discard))?;
            for raw in &filters {
                let (k, v) = parse_filter(raw)?;
                screen.set_filter(k, v)?;
            }
            let snap = screen.apply_filters().await?;
            info!(screen = %screen.kind(), rows = snap.len(), "ls loaded");
            if let Some(term) = search.as_deref() { screen.set_search(term); }
            let rows = screen.visible();
            match cli.output {
                Output::Human => {
                    print_rows(&columns(kind), &rows);
                    eprintln!("{} shown, {} in cache, {} total", rows.len(), snap.len(), snap.total_or_len());
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        Commands::Get { screen: name, id } => {
            let kind: ScreenKind = name.parse()?;
            let screen = open_screen(kind, &config, Arc::new(Discard))?;
            let record = screen.detail(id).await?;
            match cli.output {
                Output::Human => {
                    println!("{:<20} {}", "id", record.id);
                    for (k, v) in &record.fields {
                        let text = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        println!("{:<20} {}", k, text);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&record)?),
            }
        }
        Commands::Bulk { screen: name, action, ids, reason, no_prompt } => {
            let kind: ScreenKind = name.parse()?;
            let action: BulkAction = action.parse()?;
            let selection = SelectionSet::parse_list(&ids);
            let screen = open_screen(kind, &config, Arc::new(Discard))?;
            let resolver = StdinReason { given: reason, prompt: !no_prompt };
            let run = screen.bulk(action, &selection, &resolver).await?;
            if let Output::Json = cli.output {
                match &run {
                    BulkRun::Completed { report, refresh_error, .. } => {
                        let body = serde_json::json!({
                            "action": action,
                            "report": report,
                            "refresh_error": refresh_error.as_ref().map(|e| e.to_string()),
                        });
                        println!("{}", serde_json::to_string_pretty(&body)?);
                    }
                    BulkRun::NothingSelected => println!("{}", serde_json::json!({ "action": action, "outcome": "nothing_selected" })),
                    BulkRun::Cancelled => println!("{}", serde_json::json!({ "action": action, "outcome": "cancelled" })),
                }
            }
            if let Some(report) = run.report() {
                if report.total() > 0 && report.succeeded == 0 {
                    bail!("{} failed for every selected item", action);
                }
            }
        }
        Commands::Poll { screen: name, interval_ms, filters } => {
            let kind: ScreenKind = name.parse()?;
            let render = Arc::new(PrintUpdates { output: cli.output, columns: columns(kind) });
            let screen = open_screen(kind, &config, render)?;
            for raw in &filters {
                let (k, v) = parse_filter(raw)?;
                screen.set_filter(k, v)?;
            }
            let interval = interval_ms.unwrap_or(config.poll_ms as f64);
            let period = screen.start_polling(interval);
            info!(screen = %screen.kind(), interval_ms = %period.as_millis(), "poll invoked");
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c handler failed");
            }
            info!("Ctrl-C received; stopping poll loop");
            screen.stop_polling();
            if matches!(cli.output, Output::Human) {
                eprintln!("[{}] polling stopped", StatusKind::Info.as_str());
            }
        }
    }

    Ok(())
}
