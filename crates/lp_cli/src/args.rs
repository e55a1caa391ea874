// crates/lp_cli/src/args.rs
//
// CLI surface. Launch parameters come either as the seven-field positional
// form (`--query`) or as one flag per field; both end up as a raw request that
// goes through the shared validator, so the CLI never judges a value itself.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use lp_core::fields::{RawRequest, RawValue};
use lp_core::{Field, Problem};

#[derive(Debug, Parser, Clone)]
#[command(name = "lp", disable_help_subcommand = true, about = "Balloon landing predictor")]
pub struct Args {
    /// Service configuration JSON (defaults apply when omitted).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Scenario store root; overrides the config file.
    #[arg(long, global = true)]
    pub preds_dir: Option<PathBuf>,

    /// Only warnings and errors on stderr.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Check launch parameters; print them normalized, or every problem.
    Validate(RequestArgs),
    /// Print the scenario fingerprint of launch parameters.
    Fingerprint {
        #[command(flatten)]
        request: RequestArgs,
        /// Also print the canonical string that was hashed.
        #[arg(long)]
        show_canonical: bool,
    },
    /// Print the shareable seven-field query form.
    EncodeUrl(RequestArgs),
    /// Parse a shared query; prints `null` when it holds no valid scenario.
    DecodeUrl {
        query: String,
    },
    /// Run one scenario through the local pipeline and wait for the predictor.
    Submit(RequestArgs),
    /// Serve the HTTP API.
    Serve {
        /// Listen address; overrides the config file.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Fetch one prediction per hour from a server until one fails.
    Chain {
        #[command(flatten)]
        request: RequestArgs,
        /// Server root URL.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
        /// Stop after this many hours.
        #[arg(long)]
        max_hours: Option<usize>,
        /// Milliseconds between polls of a pending prediction.
        #[arg(long, default_value_t = 2000)]
        poll_ms: u64,
    },
    /// Print (or write) the listing of completed scenarios.
    Manifest {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Recompute the hash chain of the submission audit log.
    VerifyAudit {
        /// Log file; defaults to the configured one.
        log: Option<PathBuf>,
    },
}

#[derive(Debug, ClapArgs, Clone, Default)]
pub struct RequestArgs {
    /// `lat,lon,alt,datetime,ascent,burst,descent`
    #[arg(long, conflicts_with_all = [
        "launch_latitude", "launch_longitude", "launch_altitude", "launch_datetime",
        "ascent_rate", "burst_altitude", "descent_rate",
    ])]
    pub query: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub launch_latitude: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub launch_longitude: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub launch_altitude: Option<String>,
    /// UTC, `YYYY-MM-DDTHH:MM:SSZ`. `chain` ignores it.
    #[arg(long)]
    pub launch_datetime: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub ascent_rate: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub burst_altitude: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub descent_rate: Option<String>,
}

impl RequestArgs {
    fn flag(&self, field: Field) -> Option<&String> {
        match field {
            Field::LaunchLatitude => self.launch_latitude.as_ref(),
            Field::LaunchLongitude => self.launch_longitude.as_ref(),
            Field::LaunchAltitude => self.launch_altitude.as_ref(),
            Field::LaunchDatetime => self.launch_datetime.as_ref(),
            Field::AscentRate => self.ascent_rate.as_ref(),
            Field::BurstAltitude => self.burst_altitude.as_ref(),
            Field::DescentRate => self.descent_rate.as_ref(),
        }
    }

    /// Raw request as typed; missing fields are left for the validator to report.
    pub fn to_raw(&self) -> Result<RawRequest, Vec<Problem>> {
        if let Some(q) = &self.query {
            let parts: Vec<&str> = q.trim_start_matches('?').split(',').collect();
            if parts.len() != Field::ALL.len() {
                return Err(vec![Problem::other(format!(
                    "expected {} comma-separated fields, got {}",
                    Field::ALL.len(),
                    parts.len()
                ))]);
            }
            return Ok(Field::ALL
                .iter()
                .zip(parts)
                .map(|(f, v)| (f.key().to_string(), RawValue::from(v)))
                .collect());
        }
        Ok(Field::ALL
            .iter()
            .filter_map(|f| self.flag(*f).map(|v| (f.key().to_string(), RawValue::from(v.as_str()))))
            .collect())
    }

    /// For `chain`: the launch time is replaced hour by hour, so any valid
    /// placeholder will do when none was given.
    pub fn to_raw_for_chain(&self, placeholder: &str) -> Result<RawRequest, Vec<Problem>> {
        let mut raw = self.to_raw()?;
        raw.entry(Field::LaunchDatetime.key().to_string())
            .or_insert_with(|| RawValue::from(placeholder));
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn negative_longitude_flag_is_a_value() {
        let args = Args::try_parse_from(["lp", "validate", "--launch-longitude", "-10.5"]).unwrap();
        let Command::Validate(req) = args.command else { panic!("wrong subcommand") };
        assert_eq!(req.launch_longitude.as_deref(), Some("-10.5"));
    }

    #[test]
    fn query_form_maps_positionally() {
        let req = RequestArgs {
            query: Some("?52,0.1,50,2025-03-01T12:00:00Z,5,30000,5".into()),
            ..RequestArgs::default()
        };
        let raw = req.to_raw().unwrap();
        assert_eq!(raw["burst_altitude"], RawValue::from("30000"));
        assert_eq!(raw.len(), 7);

        let short = RequestArgs { query: Some("1,2,3".into()), ..RequestArgs::default() };
        assert!(short.to_raw().is_err());
    }

    #[test]
    fn chain_placeholder_only_fills_a_gap() {
        let req = RequestArgs { launch_latitude: Some("52".into()), ..RequestArgs::default() };
        let raw = req.to_raw_for_chain("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(raw["launch_datetime"], RawValue::from("2025-01-01T00:00:00Z"));
        assert_eq!(raw.len(), 2);
    }
}
