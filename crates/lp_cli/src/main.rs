// crates/lp_cli/src/main.rs
//
// `lp`: typed error mapping to exit codes, logging setup, and one function per
// subcommand. Results go to stdout as JSON; logs go to stderr.

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const IO: i32 = 4;
    pub const INVOCATION: i32 = 5;
    pub const PREDICTION: i32 = 6;
    pub const AUDIT: i32 = 7;
}

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use args::{Args, Command, RequestArgs};

use lp_client::{ChainOptions, ChainSession, HttpSource, Termination};
use lp_core::fields::RawRequest;
use lp_core::{Problem, RequestParameters};
use lp_pipeline::{Lookup, Pipeline, PipelineError, ServiceConfig};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Request problems, listed in full.
    Validation(Vec<Problem>),
    Config(String),
    /// Store, audit log, output files.
    Io(String),
    /// The predictor could not be started.
    Invocation(String),
    /// The predictor ran and left no usable result.
    Prediction(String),
    /// The audit log does not verify.
    Audit(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(problems) => {
                let lines: Vec<String> = problems.iter().map(ToString::to_string).collect();
                write!(f, "invalid request: {}", lines.join("; "))
            }
            MainError::Config(m) => write!(f, "config: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Invocation(m) => write!(f, "invocation: {m}"),
            MainError::Prediction(m) => write!(f, "prediction: {m}"),
            MainError::Audit(m) => write!(f, "audit log: {m}"),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    let rc = match run(&args) {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("lp: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

fn init_tracing(args: &Args) {
    let default = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn map_error(e: &MainError) -> i32 {
    use exitcodes::*;
    match e {
        MainError::Validation(_) => VALIDATION,
        MainError::Config(_) => CONFIG,
        MainError::Io(_) => IO,
        MainError::Invocation(_) => INVOCATION,
        MainError::Prediction(_) => PREDICTION,
        MainError::Audit(_) => AUDIT,
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Validation(problems) => MainError::Validation(problems),
        PipelineError::Invocation(e) => MainError::Invocation(e.to_string()),
        PipelineError::Config(e) => MainError::Config(e.to_string()),
        PipelineError::Storage(e) => MainError::Io(e.to_string()),
        PipelineError::Audit(e) => MainError::Io(format!("audit log: {e}")),
    }
}

fn run(args: &Args) -> Result<(), MainError> {
    match &args.command {
        Command::Validate(req) => {
            let p = parse_request(req)?;
            print_json(&json!(p.normalized()));
            Ok(())
        }
        Command::Fingerprint { request, show_canonical } => {
            let p = parse_request(request)?;
            println!("{}", lp_core::fingerprint(&p));
            if *show_canonical {
                println!("{}", lp_core::canonical_string(&p));
            }
            Ok(())
        }
        Command::EncodeUrl(req) => {
            println!("{}", lp_core::query::encode(&parse_request(req)?));
            Ok(())
        }
        Command::DecodeUrl { query } => {
            let decoded = lp_core::query::decode(query);
            if decoded.is_none() {
                tracing::info!("no scenario in query");
            }
            print_json(&json!(decoded));
            Ok(())
        }
        Command::Submit(req) => submit(args, req),
        Command::Serve { bind } => {
            let mut cfg = load_config(args)?;
            if let Some(addr) = bind {
                cfg.bind = *addr;
            }
            runtime()?.block_on(lp_server::serve(&cfg)).map_err(|e| match e {
                lp_server::ServeError::Pipeline(e) => map_pipeline_err(e),
                lp_server::ServeError::Io(e) => MainError::Io(e.to_string()),
            })
        }
        Command::Chain { request, server, max_hours, poll_ms } => {
            chain(request, server, *max_hours, Duration::from_millis(*poll_ms))
        }
        Command::Manifest { out } => {
            let cfg = load_config(args)?;
            let store = lp_io::ScenarioStore::open(&cfg.preds_dir).map_err(|e| MainError::Io(e.to_string()))?;
            let manifest = lp_pipeline::build_manifest(&store).map_err(|e| MainError::Io(e.to_string()))?;
            match out {
                Some(path) => lp_io::manifest::write_manifest(path, &manifest)
                    .map_err(|e| MainError::Io(format!("{}: {e}", path.display()))),
                None => {
                    print_json(&json!(manifest));
                    Ok(())
                }
            }
        }
        Command::VerifyAudit { log } => {
            let path = match log {
                Some(path) => path.clone(),
                None => load_config(args)?.audit_log_path(),
            };
            let records = lp_io::audit::verify_chain(&path).map_err(|e| match e {
                lp_io::IoError::Path(_) => MainError::Io(format!("{}: {e}", path.display())),
                _ => MainError::Audit(format!("{}: {e}", path.display())),
            })?;
            print_json(&json!({ "audit_log": path.display().to_string(), "records": records }));
            Ok(())
        }
    }
}

fn print_json(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()));
}

fn parse_request(req: &RequestArgs) -> Result<RequestParameters, MainError> {
    let raw = req.to_raw().map_err(MainError::Validation)?;
    lp_core::validate(&raw).map_err(MainError::Validation)
}

fn load_config(args: &Args) -> Result<ServiceConfig, MainError> {
    let mut cfg = match &args.config {
        Some(path) => ServiceConfig::load(path).map_err(|e| MainError::Config(e.to_string()))?,
        None => ServiceConfig::default(),
    };
    if let Some(dir) = &args.preds_dir {
        cfg.preds_dir = dir.clone();
    }
    Ok(cfg)
}

fn runtime() -> Result<tokio::runtime::Runtime, MainError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| MainError::Io(format!("runtime: {e}")))
}

/// Local pipeline; waits for the run so the record is final on exit.
fn submit(args: &Args, req: &RequestArgs) -> Result<(), MainError> {
    let cfg = load_config(args)?;
    let raw = req.to_raw().map_err(MainError::Validation)?;
    runtime()?.block_on(submit_and_wait(&cfg, &raw))
}

async fn submit_and_wait(cfg: &ServiceConfig, raw: &RawRequest) -> Result<(), MainError> {
    let pipeline = Pipeline::from_config(cfg).map_err(map_pipeline_err)?;
    let sub = pipeline.submit(raw).map_err(map_pipeline_err)?;
    let run = match sub.run {
        Some(run) => run.wait().await,
        None => None,
    };
    let found = lp_pipeline::lookup(pipeline.store(), &sub.fingerprint)
        .map_err(|e| MainError::Io(e.to_string()))?;
    let status = match &found {
        Lookup::Complete(_) => "complete",
        Lookup::Pending => "pending",
        Lookup::Failed(_) => "failed",
        Lookup::NotFound => "missing",
    };
    print_json(&json!({
        "fingerprint": sub.fingerprint,
        "outcome": format!("{:?}", sub.outcome),
        "run": run.map(|r| format!("{r:?}")),
        "status": status,
    }));
    match found {
        Lookup::Failed(msg) => Err(MainError::Prediction(msg)),
        _ => Ok(()),
    }
}

fn chain(req: &RequestArgs, server: &str, max_hours: Option<usize>, poll: Duration) -> Result<(), MainError> {
    let now = chrono::Utc::now();
    let placeholder = lp_core::time::format_utc(&lp_core::time::hour_floor(now));
    let raw = req.to_raw_for_chain(&placeholder).map_err(MainError::Validation)?;
    let base = lp_core::validate(&raw).map_err(MainError::Validation)?;

    let source = HttpSource::new(server).with_poll_interval(poll);
    let session = ChainSession::new(source).with_options(ChainOptions { max_hours });
    let report = runtime()?.block_on(session.run(&base, now));

    if let Termination::Failed { launch, reason } = &report.termination {
        tracing::info!(hour = %launch, %reason, "chain ended");
    }
    print_json(&lp_client::geojson::landing_line(&report.chain));
    Ok(())
}
