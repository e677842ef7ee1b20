//! Operator configuration
//!
//! Settings are read from command-line flags, falling back to environment
//! variables and then to defaults.

use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default event reporter (controller) name
pub const DEFAULT_REPORTER: &str = "node-operation-controller";

/// Node Remediation Operator
#[derive(Parser, Debug, Clone)]
#[command(name = "node-remediation-operator")]
#[command(version, about = "Expands NodeRemediationTemplates into per-node NodeRemediations")]
pub struct OperatorConfig {
    /// Port serving /metrics, /healthz and /readyz
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Upper bound in seconds for any single Kubernetes API call made during reconcile
    #[arg(long, env = "CALL_TIMEOUT_SECS", default_value_t = 30)]
    pub call_timeout_secs: u64,

    /// Controller name recorded on emitted Kubernetes events
    #[arg(long, env = "EVENT_REPORTER", default_value = DEFAULT_REPORTER)]
    pub reporter: String,

    /// Emit logs as JSON (disable for human-readable output)
    #[arg(long, env = "LOG_JSON", default_value_t = true, action = clap::ArgAction::Set)]
    pub log_json: bool,
}

impl OperatorConfig {
    /// Reject settings the operator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout_secs == 0 {
            return Err(Error::config("call timeout must be at least one second"));
        }
        if self.reporter.trim().is_empty() {
            return Err(Error::config("event reporter name must not be empty"));
        }
        Ok(())
    }

    /// Per-call timeout handed to every reconcile
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
