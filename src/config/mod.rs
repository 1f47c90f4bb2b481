//! Coffer configuration file handling.
//!
//! A TOML file describes the genesis state of a treasury: signer sets and
//! thresholds, categories, emergency cooldown, the initial policy set, and
//! logging. Policies are `[[policies]]` tables tagged by `kind`.

pub mod duration;

use crate::emergency::DEFAULT_COOLDOWN_SECS;
use crate::error::TreasuryError;
use crate::policy::{PolicyEngine, PolicyRule};
use crate::proposals::ProposalRegistry;
use crate::emergency::EmergencyController;
use crate::events::EventLog;
use crate::treasury::{Treasury, TreasuryState};
use crate::types::{Amount, Principal, Timestamp};
use crate::vault::{TreasuryVault, VaultParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Depositor recorded for the configured opening balance.
pub const GENESIS_DEPOSITOR: &str = "genesis";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Failed to write config file '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] TreasuryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CofferConfig {
    pub treasury: TreasurySection,

    #[serde(default)]
    pub policies: Vec<PolicyConfigEntry>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Genesis parameters for the vault and emergency controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasurySection {
    pub signers: Vec<String>,
    pub threshold: u32,
    pub emergency_signers: Vec<String>,
    pub emergency_threshold: u32,

    /// Minimum time between emergency executions ("24h", "90m", or seconds).
    #[serde(
        default = "default_cooldown",
        deserialize_with = "duration::deserialize_secs",
        serialize_with = "duration::serialize_secs"
    )]
    pub emergency_cooldown: u64,

    pub categories: Vec<String>,

    #[serde(default)]
    pub opening_balance: Amount,
}

/// One named policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfigEntry {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(flatten)]
    pub rule: PolicyRule,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl CofferConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        write_file(path, &contents)
    }

    /// Check every invariant without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_state().map(|_| ())
    }

    /// Build a ready treasury. The opening balance, if any, is deposited at
    /// `now` by the genesis depositor.
    pub fn build_treasury(&self, now: Timestamp) -> Result<Treasury, ConfigError> {
        let mut treasury = Treasury::from_state(self.build_state()?);
        if self.treasury.opening_balance > 0 {
            treasury.deposit(
                &Principal::from(GENESIS_DEPOSITOR),
                self.treasury.opening_balance,
                now,
            )?;
        }
        Ok(treasury)
    }

    fn build_state(&self) -> Result<TreasuryState, ConfigError> {
        let section = &self.treasury;
        let vault = TreasuryVault::new(VaultParams {
            signers: unique("signers", &section.signers)?,
            threshold: section.threshold,
            emergency_signers: unique("emergency_signers", &section.emergency_signers)?,
            emergency_threshold: section.emergency_threshold,
            categories: unique("categories", &section.categories)?,
        })?;

        let mut policy = PolicyEngine::new();
        for entry in &self.policies {
            if policy.get(&entry.name).is_some() {
                return Err(TreasuryError::invalid(format!(
                    "policy '{}' is defined more than once",
                    entry.name
                ))
                .into());
            }
            policy.install(&entry.name, entry.rule.clone(), vault.categories())?;
            if !entry.enabled {
                policy.set_enabled(&entry.name, false)?;
            }
        }

        Ok(TreasuryState {
            vault,
            policy,
            proposals: ProposalRegistry::new(),
            emergency: EmergencyController::new(section.emergency_cooldown),
            events: EventLog::new(),
            history: Vec::new(),
        })
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        r#"# Coffer treasury configuration
#
# Genesis parameters for a multi-signer treasury. Signer sets, thresholds and
# policies can be changed later through governance operations; this file only
# describes the starting state.

[treasury]
# Principals allowed to open, sign and cancel spending proposals
signers = ["alice", "bob", "carol"]
threshold = 2

# Principals allowed to create and sign emergency actions
emergency_signers = ["alice", "bob"]
emergency_threshold = 2

# Minimum time between two emergency executions ("24h", "90m", "off")
emergency_cooldown = "24h"

# Spending categories
categories = ["operations", "grants"]

# Funds deposited at genesis (minor units)
opening_balance = 0

# Per-category daily/weekly/monthly limits and a per-transaction cap
[[policies]]
name = "operations_limits"
kind = "spending_limit"
category = "operations"
max_per_transaction = 5000
daily_limit = 10000
monthly_limit = 50000

# Larger spends need more signatures
[[policies]]
name = "operations_tiers"
kind = "threshold_tiers"
category = "operations"
tiers = [
    { min_amount = 0, max_amount = 1000, threshold = 2 },
    { min_amount = 1001, max_amount = 10000, threshold = 3 },
]

# lock = base_duration + amount / amount_factor seconds
[[policies]]
name = "grants_delay"
kind = "time_lock"
category = "grants"
base_duration = "1h"
amount_factor = 1000

# Recipient allow/deny list (an empty allow list admits everyone not denied)
[[policies]]
name = "recipients"
kind = "recipients"
allow = []
deny = []

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/coffer/coffer.log"
"#
        .to_string()
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml())
    }
}

fn unique<T>(field: &str, values: &[String]) -> Result<BTreeSet<T>, TreasuryError>
where
    T: Ord + From<String>,
{
    let mut set = BTreeSet::new();
    for value in values {
        if !set.insert(T::from(value.clone())) {
            return Err(TreasuryError::invalid(format!(
                "duplicate entry '{}' in {}",
                value, field
            )));
        }
    }
    Ok(set)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, contents).map_err(write_err)
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coffer")
        .join("config.toml")
}
