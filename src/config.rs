// ⚙️ Configuration - JSON settings file
//
// Every field has a default, so a partial file (or none at all) is valid.

use crate::amount::DEFAULT_EPSILON;
use crate::entities::ReverseBalance;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite file holding the book
    pub database_path: PathBuf,

    /// Currency mnemonic preselected for new accounts
    pub default_currency: String,

    /// Joins account names into full names
    pub account_separator: char,

    /// "Debits"/"Credits" instead of per-type labels
    pub use_accounting_labels: bool,

    /// Suggest a payment after reconciling a credit card
    pub auto_credit_card_payments: bool,

    pub reverse_balance: ReverseBalance,

    /// Largest difference still treated as balanced
    pub balance_tolerance: f64,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: PathBuf::from("ledger.db"),
            default_currency: "USD".to_string(),
            account_separator: ':',
            use_accounting_labels: false,
            auto_credit_card_payments: true,
            reverse_balance: ReverseBalance::Credit,
            balance_tolerance: DEFAULT_EPSILON,
            log_level: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: LedgerConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = ?path.as_ref(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.default_currency.trim().is_empty() {
            anyhow::bail!("default_currency must not be empty");
        }
        if self.account_separator.is_alphanumeric() {
            anyhow::bail!("account_separator must not be a letter or digit");
        }
        if self.balance_tolerance.is_nan() || self.balance_tolerance <= 0.0 {
            anyhow::bail!("balance_tolerance must be positive");
        }
        Ok(())
    }
}
