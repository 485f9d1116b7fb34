//! Structured JSON-lines event log.
//!
//! Every record carries `ts`, `run_id`, `seq`, `lvl`, `component`, `event`,
//! `msg` and a `data` object. Records land in `<log_dir>/events.jsonl`
//! (trace and debug in `trace.jsonl`) once [`init`] has been called, and on
//! stderr when `LOG_STDERR=1`. Stdout is left to the human-readable report.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Market,    // Book tops, ticker feed
    Exec,      // Order placement, cancels, retries
    Reconcile, // Open-order diffing between runs
    Account,   // Accounts, payment methods, deposits
    System,    // Startup, config, shutdown
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Market => "market",
            Domain::Exec => "exec",
            Domain::Reconcile => "reconcile",
            Domain::Account => "account",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS is a comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Mutex<Option<File>>,
    trace: Mutex<Option<File>>,
    stderr: bool,
}

impl RunContext {
    fn new(log_dir: Option<&Path>) -> Self {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let (events, trace) = match log_dir {
            Some(dir) => {
                if let Err(err) = create_dir_all(dir) {
                    eprintln!("[log] failed to create log dir {}: {}", dir.display(), err);
                }
                (open_append(&dir.join("events.jsonl")), open_append(&dir.join("trace.jsonl")))
            }
            None => (None, None),
        };
        Self {
            run_id,
            events: Mutex::new(events),
            trace: Mutex::new(trace),
            stderr: matches!(std::env::var("LOG_STDERR").as_deref(), Ok("1") | Ok("true")),
        }
    }
}

fn open_append(path: &Path) -> Option<File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(f) => Some(f),
        Err(err) => {
            eprintln!("[log] failed to open {}: {}", path.display(), err);
            None
        }
    }
}

/// Point the event log at `log_dir`. Only the first call has any effect;
/// records emitted before it go nowhere but stderr.
pub fn init(log_dir: &Path) {
    let _ = RUN_CONTEXT.set(RunContext::new(Some(log_dir)));
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| RunContext::new(None))
}

pub fn run_id() -> String {
    ensure_run_context().run_id.clone()
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    let secret_keys: Vec<String> = fields
        .keys()
        .filter(|k| {
            let k = k.to_ascii_lowercase();
            k.starts_with("cb-access-") || matches!(k.as_str(), "api_secret" | "passphrase" | "signature")
        })
        .cloned()
        .collect();
    for key in secret_keys {
        fields.insert(key, redacted.clone());
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["product", "order_id", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<Option<File>>, line: &str) {
    if let Ok(mut guard) = writer.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn build_record(run_id: &str, level: Level, component: &str, event: &str, fields: Map<String, Value>) -> Value {
    let fields = sanitize_fields(fields);
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry)
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let line = build_record(&ctx.run_id, level, component, event, fields).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    if ctx.stderr {
        eprintln!("{}", line);
    }
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_book_top(product: &str, bid: f64, ask: f64) {
    log(
        Level::Debug,
        Domain::Market,
        "book_top",
        obj(&[
            ("product", v_str(product)),
            ("bid", v_num(bid)),
            ("ask", v_num(ask)),
            ("mid", v_num((bid + ask) / 2.0)),
        ]),
    );
}

pub fn log_order_submit(product: &str, side: &str, order_type: &str, price: Option<f64>, size: Option<f64>, funds: Option<f64>) {
    log(
        Level::Info,
        Domain::Exec,
        "order_submit",
        obj(&[
            ("product", v_str(product)),
            ("side", v_str(side)),
            ("type", v_str(order_type)),
            ("price", price.map(v_num).unwrap_or(Value::Null)),
            ("size", size.map(v_num).unwrap_or(Value::Null)),
            ("funds", funds.map(v_num).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn log_order_accepted(product: &str, side: &str, order_id: &str) {
    log(
        Level::Info,
        Domain::Exec,
        "order_accepted",
        obj(&[("product", v_str(product)), ("side", v_str(side)), ("order_id", v_str(order_id))]),
    );
}

pub fn log_order_rejected(product: &str, side: &str, message: &str) {
    log(
        Level::Warn,
        Domain::Exec,
        "order_rejected",
        obj(&[("product", v_str(product)), ("side", v_str(side)), ("msg", v_str(message))]),
    );
}

pub fn log_cancel(order_id: &str, result: Result<(), &str>) {
    match result {
        Ok(()) => log(Level::Info, Domain::Exec, "order_cancel", obj(&[("order_id", v_str(order_id))])),
        Err(msg) => log(
            Level::Error,
            Domain::Exec,
            "order_cancel_failed",
            obj(&[("order_id", v_str(order_id)), ("msg", v_str(msg))]),
        ),
    }
}

pub fn log_reconcile(product: &str, outcome: &str, stored: usize, open: usize) {
    log(
        Level::Info,
        Domain::Reconcile,
        "reconcile",
        obj(&[
            ("product", v_str(product)),
            ("outcome", v_str(outcome)),
            ("stored_ids", json!(stored)),
            ("open_ids", json!(open)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Emits a trace record with the elapsed time when dropped.
pub struct ProfileScope {
    domain: Domain,
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn new(domain: Domain, label: &'static str) -> Self {
        Self::with_context(domain, label, &[])
    }

    pub fn with_context(domain: Domain, label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            domain,
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, self.domain, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
