//! CLI arguments for SWAP configuration.

use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;
use clap::Args;
use serde::{Deserialize, Serialize};
use vertex_observability::LoggingConfig;
use vertex_swarm_bandwidth_contracts::factory_address_for_network;
use vertex_swarm_bandwidth_primitives::Uint256;

use crate::cashout::CashoutStrategy;
use crate::constants::*;

/// Configuration errors that abort startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("network id {0} is not supported, expected {SUPPORTED_NETWORK_ID}")]
    NetworkIdMismatch(u64),

    #[error("disconnect threshold {disconnect} must exceed payment threshold {payment}")]
    DisconnectThresholdTooLow { payment: i64, disconnect: i64 },

    #[error("payment threshold must be positive, got {0}")]
    NonPositivePaymentThreshold(i64),

    #[error("deposit amount {0} given with skip-deposit")]
    DepositWithSkip(Uint256),

    /// A deposit is required when one is not skipped.
    #[error("deposit amount must be positive")]
    MissingDeposit,

    #[error("backend url is empty")]
    MissingBackendUrl,

    #[error("no factory known for network {0}")]
    UnknownNetwork(u64),
}

/// Thresholds and policies the engine runs with. All amounts are in honey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub payment_threshold: i64,
    pub disconnect_threshold: i64,
    pub cheque_debt_tolerance: i64,
    pub cashout: CashoutStrategy,
    pub hard_deposit_timeout: Duration,
}

impl Default for SwapParams {
    fn default() -> Self {
        Self {
            payment_threshold: DEFAULT_PAYMENT_THRESHOLD,
            disconnect_threshold: DEFAULT_DISCONNECT_THRESHOLD,
            cheque_debt_tolerance: DEFAULT_CHEQUE_DEBT_TOLERANCE,
            cashout: CashoutStrategy::default(),
            hard_deposit_timeout: DEFAULT_HARD_DEPOSIT_TIMEOUT,
        }
    }
}

/// SWAP CLI arguments. Thresholds are in honey, amounts in wei.
#[derive(Debug, Args, Clone, Serialize, Deserialize)]
#[command(next_help_heading = "SWAP")]
#[serde(default)]
pub struct SwapArgs {
    /// Directory for rolling log files (empty disables the file sink)
    #[arg(long = "swap.log-path")]
    pub log_path: Option<PathBuf>,

    /// Debt at which a cheque is issued
    #[arg(long = "swap.payment-threshold", default_value_t = DEFAULT_PAYMENT_THRESHOLD)]
    pub payment_threshold: i64,

    /// Debt at which priced operations are refused
    #[arg(long = "swap.disconnect-threshold", default_value_t = DEFAULT_DISCONNECT_THRESHOLD)]
    pub disconnect_threshold: i64,

    /// Deploy the chequebook without a deposit
    #[arg(long = "swap.skip-deposit", default_value_t = true, action = clap::ArgAction::Set)]
    pub skip_deposit: bool,

    /// Initial chequebook deposit in wei
    #[arg(long = "swap.deposit-amount", default_value_t = Uint256::ZERO)]
    pub deposit_amount: Uint256,

    /// Chequebook factory (defaults to the network's factory)
    #[arg(long = "swap.factory-address")]
    pub factory_address: Option<Address>,

    /// Ethereum node endpoint
    #[arg(long = "swap.backend-url", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Network id of the chain
    #[arg(long = "swap.network-id", default_value_t = SUPPORTED_NETWORK_ID)]
    pub network_id: u64,

    /// Use an already deployed chequebook
    #[arg(long = "swap.chequebook")]
    pub chequebook: Option<Address>,

    /// Overpayment tolerated on received cheques
    #[arg(long = "swap.cheque-debt-tolerance", default_value_t = DEFAULT_CHEQUE_DEBT_TOLERANCE)]
    pub cheque_debt_tolerance: i64,

    /// When received cheques are cashed
    #[arg(long = "swap.cashout", value_enum, default_value_t = CashoutStrategy::Profitable)]
    pub cashout: CashoutStrategy,

    /// Hard deposit timeout of a newly deployed chequebook, in seconds
    #[arg(long = "swap.hard-deposit-timeout", default_value_t = DEFAULT_HARD_DEPOSIT_TIMEOUT.as_secs())]
    pub hard_deposit_timeout: u64,
}

impl Default for SwapArgs {
    fn default() -> Self {
        Self {
            log_path: None,
            payment_threshold: DEFAULT_PAYMENT_THRESHOLD,
            disconnect_threshold: DEFAULT_DISCONNECT_THRESHOLD,
            skip_deposit: true,
            deposit_amount: Uint256::ZERO,
            factory_address: None,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            network_id: SUPPORTED_NETWORK_ID,
            chequebook: None,
            cheque_debt_tolerance: DEFAULT_CHEQUE_DEBT_TOLERANCE,
            cashout: CashoutStrategy::default(),
            hard_deposit_timeout: DEFAULT_HARD_DEPOSIT_TIMEOUT.as_secs(),
        }
    }
}

impl SwapArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network_id != SUPPORTED_NETWORK_ID {
            return Err(ConfigError::NetworkIdMismatch(self.network_id));
        }
        if self.payment_threshold <= 0 {
            return Err(ConfigError::NonPositivePaymentThreshold(self.payment_threshold));
        }
        if self.disconnect_threshold <= self.payment_threshold {
            return Err(ConfigError::DisconnectThresholdTooLow {
                payment: self.payment_threshold,
                disconnect: self.disconnect_threshold,
            });
        }
        if self.skip_deposit && !self.deposit_amount.is_zero() {
            return Err(ConfigError::DepositWithSkip(self.deposit_amount));
        }
        if !self.skip_deposit && self.deposit_amount.is_zero() {
            return Err(ConfigError::MissingDeposit);
        }
        if self.backend_url.trim().is_empty() {
            return Err(ConfigError::MissingBackendUrl);
        }
        Ok(())
    }

    /// Engine parameters.
    pub fn params(&self) -> SwapParams {
        SwapParams {
            payment_threshold: self.payment_threshold,
            disconnect_threshold: self.disconnect_threshold,
            cheque_debt_tolerance: self.cheque_debt_tolerance,
            cashout: self.cashout,
            hard_deposit_timeout: Duration::from_secs(self.hard_deposit_timeout),
        }
    }

    /// The configured factory, or the one known for the network.
    pub fn factory_address(&self) -> Result<Address, ConfigError> {
        match self.factory_address {
            Some(address) => Ok(address),
            None => factory_address_for_network(self.network_id)
                .map_err(|_| ConfigError::UnknownNetwork(self.network_id)),
        }
    }

    /// Deposit sent with a chequebook deployment.
    pub fn deposit(&self) -> Uint256 {
        if self.skip_deposit {
            Uint256::ZERO
        } else {
            self.deposit_amount
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            log_dir: self.log_path.clone(),
            ..LoggingConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        swap: SwapArgs,
    }

    fn parse(args: &[&str]) -> SwapArgs {
        let mut argv = vec!["vertex"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv).swap
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = parse(&[]);
        args.validate().unwrap();
        assert_eq!(args.payment_threshold, 10_002_441);
        assert_eq!(args.disconnect_threshold, 20 * 10_002_441);
        assert_eq!(args.deposit(), Uint256::ZERO);
        assert!(args.logging_config().file_sink().is_none());

        let serde_default: SwapArgs = serde_json::from_str("{}").unwrap();
        assert_eq!(serde_default.payment_threshold, args.payment_threshold);
        assert_eq!(serde_default.backend_url, args.backend_url);
    }

    #[test]
    fn test_rejects_wrong_network() {
        let args = parse(&["--swap.network-id", "1"]);
        assert_matches!(args.validate(), Err(ConfigError::NetworkIdMismatch(1)));
    }

    #[test]
    fn test_rejects_disconnect_below_payment() {
        let args = parse(&[
            "--swap.payment-threshold",
            "1000",
            "--swap.disconnect-threshold",
            "1000",
        ]);
        assert_matches!(
            args.validate(),
            Err(ConfigError::DisconnectThresholdTooLow {
                payment: 1000,
                disconnect: 1000
            })
        );
    }

    #[test]
    fn test_deposit_rules() {
        let args = parse(&["--swap.deposit-amount", "42"]);
        assert_matches!(args.validate(), Err(ConfigError::DepositWithSkip(_)));

        let args = parse(&["--swap.skip-deposit", "false"]);
        assert_matches!(args.validate(), Err(ConfigError::MissingDeposit));

        let args = parse(&["--swap.skip-deposit", "false", "--swap.deposit-amount", "42"]);
        args.validate().unwrap();
        assert_eq!(args.deposit(), Uint256::from_u64(42));
    }

    #[test]
    fn test_factory_address_lookup() {
        let args = parse(&[]);
        assert_eq!(
            args.factory_address().unwrap(),
            factory_address_for_network(SUPPORTED_NETWORK_ID).unwrap()
        );

        let explicit = Address::repeat_byte(1);
        let args = SwapArgs {
            factory_address: Some(explicit),
            ..SwapArgs::default()
        };
        assert_eq!(args.factory_address().unwrap(), explicit);

        let args = SwapArgs {
            network_id: 99,
            ..SwapArgs::default()
        };
        assert_matches!(args.factory_address(), Err(ConfigError::UnknownNetwork(99)));
    }

    #[test]
    fn test_log_path_enables_file_sink() {
        let args = parse(&["--swap.log-path", "/tmp/swap-logs"]);
        let config = args.logging_config();
        assert_eq!(config.file_sink(), Some(std::path::Path::new("/tmp/swap-logs")));
    }

    #[test]
    fn test_params() {
        let args = parse(&["--swap.cashout", "always", "--swap.hard-deposit-timeout", "60"]);
        let params = args.params();
        assert_eq!(params.cashout, CashoutStrategy::Always);
        assert_eq!(params.hard_deposit_timeout, Duration::from_secs(60));
        assert_eq!(params.cheque_debt_tolerance, DEFAULT_CHEQUE_DEBT_TOLERANCE);
    }
}
