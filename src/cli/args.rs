use crate::participant::ParticipantSettings;
use crate::service::{ServiceConfig, ServiceLifecycle, DEFAULT_COMPONENT_NAME};
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Serve AppFlow stage requests as a flow or payment service
#[derive(Parser, Debug)]
#[command(name = "appflow-participant")]
#[command(about = "Serve AppFlow stage requests over stdin/stdout", long_about = None)]
pub struct CliArgs {
    /// File of newline-delimited request messages; stdin when absent
    #[arg(value_name = "INPUT", help = "Path to a file of newline-delimited messages")]
    pub input_file: Option<PathBuf>,

    /// Which built-in participant serves the requests
    #[arg(
        long = "participant",
        value_name = "KIND",
        default_value = "passthrough",
        help = "Participant: 'passthrough', 'surcharge' or 'payment'"
    )]
    pub participant: ParticipantKind,

    /// Additional amount identifier used by the surcharge participant
    #[arg(long = "surcharge-id", value_name = "ID", default_value = "surcharge")]
    pub surcharge_id: String,

    /// Surcharge as a fraction of the base amount
    #[arg(
        long = "surcharge-fraction",
        value_name = "FRACTION",
        default_value = "0.05",
        help = "Surcharge as a fraction of the base amount, between 0 and 1"
    )]
    pub surcharge_fraction: Decimal,

    /// Decline limit of the payment participant, in subunits
    #[arg(long = "decline-above", value_name = "SUBUNITS")]
    pub decline_above: Option<i64>,

    /// API version stamped on outgoing messages
    #[arg(long = "api-version", value_name = "VERSION")]
    pub api_version: Option<String>,

    /// Component name stamped on outgoing messages
    #[arg(long = "component-name", value_name = "NAME")]
    pub component_name: Option<String>,

    /// Keep serving requests after the first completed stream
    #[arg(long = "keep-alive")]
    pub keep_alive: bool,

    /// Number of runtime worker threads
    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,

    /// Log filter directive, overrides RUST_LOG
    #[arg(long = "log-filter", value_name = "FILTER")]
    pub log_filter: Option<String>,
}

/// Built-in participants selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ParticipantKind {
    Passthrough,
    Surcharge,
    #[value(name = "payment")]
    SimulatedPayment,
}

impl CliArgs {
    /// Create a ServiceConfig from CLI arguments
    ///
    /// Values not given on the command line take their defaults; invalid ones
    /// fall back with a logged warning.
    pub fn to_service_config(&self) -> ServiceConfig {
        let default = ServiceConfig::default();
        let lifecycle = if self.keep_alive {
            ServiceLifecycle::KeepAlive
        } else {
            ServiceLifecycle::StopAfterStream
        };
        ServiceConfig::new(
            self.api_version.as_deref().unwrap_or(&default.api_version),
            self.component_name
                .as_deref()
                .unwrap_or(DEFAULT_COMPONENT_NAME),
            lifecycle,
            self.worker_threads.unwrap_or(default.worker_threads),
        )
    }

    /// Settings for the selected participant
    pub fn to_participant_settings(&self) -> ParticipantSettings {
        ParticipantSettings {
            surcharge_id: self.surcharge_id.clone(),
            surcharge_fraction: self.surcharge_fraction,
            decline_above: self.decline_above,
        }
    }
}
