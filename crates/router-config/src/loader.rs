//! Configuration loading from files and environment.

use crate::types::RouterConfig;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load configuration from file
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RouterConfig> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {:?}", path))?;

		let config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents)?,
			Some("json") => Self::from_json(&contents)?,
			Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
			_ => anyhow::bail!("Unsupported config format: {:?}", path),
		};

		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<RouterConfig> {
		toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<RouterConfig> {
		serde_json::from_str(contents).context("Failed to parse JSON")
	}

	/// Load from YAML string
	pub fn from_yaml(contents: &str) -> Result<RouterConfig> {
		serde_yaml::from_str(contents).context("Failed to parse YAML")
	}

	/// Load from environment variables with optional file override
	pub fn from_env_and_file(file_path: Option<&Path>) -> Result<RouterConfig> {
		let mut config = if let Some(path) = file_path {
			Self::from_file(path)?
		} else {
			RouterConfig::default()
		};

		Self::apply_env_overrides(&mut config)?;

		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Apply environment variable overrides
	fn apply_env_overrides(config: &mut RouterConfig) -> Result<()> {
		if let Ok(level) = std::env::var("ROUTER_LOG_LEVEL") {
			debug!("Overriding log level from environment");
			config.monitoring.log_level = level;
		}

		if let Ok(hops) = std::env::var("ROUTER_MAX_HOPS") {
			debug!("Overriding max hops from environment");
			config.routing.max_hops = hops
				.parse()
				.context("ROUTER_MAX_HOPS must be an integer")?;
		}

		if let Ok(slippage) = std::env::var("ROUTER_MAX_SLIPPAGE") {
			debug!("Overriding default max slippage from environment");
			config.routing.default_max_slippage = slippage
				.parse()
				.context("ROUTER_MAX_SLIPPAGE must be a decimal")?;
		}

		Ok(())
	}

	/// Validate configuration. Bad admin config is rejected here, before it
	/// can affect in-flight requests.
	pub fn validate_config(config: &RouterConfig) -> Result<()> {
		if config.routing.max_hops == 0 {
			anyhow::bail!("routing.max_hops must be at least 1");
		}

		if config.routing.default_max_slippage <= Decimal::ZERO
			|| config.routing.default_max_slippage >= Decimal::ONE
		{
			anyhow::bail!("routing.default_max_slippage must be in (0, 1)");
		}

		if config.routing.top_k_split == 0 || config.routing.split_slices == 0 {
			anyhow::bail!("routing split parameters must be positive");
		}

		if config.quotes.source_timeout_ms == 0 || config.quotes.quote_ttl_ms == 0 {
			anyhow::bail!("quote timeout and TTL must be positive");
		}

		if config.buffers.rebalance_utilization_threshold <= Decimal::ZERO
			|| config.buffers.rebalance_utilization_threshold > Decimal::ONE
		{
			anyhow::bail!("buffers.rebalance_utilization_threshold must be in (0, 1]");
		}

		for (token, targets) in &config.buffers.tokens {
			if targets.min > targets.target || targets.target > targets.max {
				anyhow::bail!(
					"buffer targets for '{}' must satisfy min <= target <= max",
					token
				);
			}
			if targets.total < Decimal::ZERO {
				anyhow::bail!("buffer total for '{}' must not be negative", token);
			}
		}

		if config.arbitrage.beneficiary.is_empty() {
			anyhow::bail!("arbitrage.beneficiary must not be empty");
		}

		if config.execution.step_tolerance < Decimal::ZERO
			|| config.execution.step_tolerance >= Decimal::ONE
		{
			anyhow::bail!("execution.step_tolerance must be in [0, 1)");
		}

		Ok(())
	}
}

/// Load configuration from standard locations
pub fn load_config() -> Result<RouterConfig> {
	// Check for config file in order:
	// 1. Environment variable ROUTER_CONFIG_FILE
	// 2. ./router.toml
	// 3. ./config/router.toml
	// 4. Default config with env overrides

	if let Ok(path) = std::env::var("ROUTER_CONFIG_FILE") {
		return ConfigLoader::from_env_and_file(Some(Path::new(&path)));
	}

	let paths = ["./router.toml", "./config/router.toml"];

	for path in &paths {
		if Path::new(path).exists() {
			return ConfigLoader::from_env_and_file(Some(Path::new(path)));
		}
	}

	ConfigLoader::from_env_and_file(None)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_default_validates() {
		let config = RouterConfig::default();
		assert!(ConfigLoader::validate_config(&config).is_ok());
	}

	#[test]
	fn test_toml_parsing() {
		let toml = r#"
[quotes]
source_timeout_ms = 250
quote_ttl_ms = 5000
oracle_deviation_threshold = "0.05"
arbitrage_aggregation = "best_output"
oracle_check_aggregation = "median"

[routing]
max_hops = 3
default_max_slippage = "0.01"
top_k_split = 3
split_slices = 100

[buffers]
rebalance_utilization_threshold = "0.75"
rebalance_interval_secs = 60

[buffers.tokens.USDC]
total = "100000"
min = "20000"
max = "120000"
target = "80000"

[arbitrage]
min_profit = "0"
scan_interval_secs = 5
max_trade_amount = "10000"
beneficiary = "protocol"
opportunity_ttl_ms = 5000

[execution]
step_tolerance = "0.005"
default_deadline_secs = 30
history_limit = 1000

[monitoring]
log_level = "debug"
event_capacity = 1024
"#;

		let config = ConfigLoader::from_toml(toml).unwrap();
		assert_eq!(config.quotes.source_timeout_ms, 250);
		assert_eq!(config.monitoring.log_level, "debug");

		let usdc = config.buffers.tokens.get("USDC").unwrap();
		assert_eq!(usdc.target, dec!(80000));

		assert!(ConfigLoader::validate_config(&config).is_ok());
	}

	#[test]
	fn test_validation_rejects_zero_hops() {
		let mut config = RouterConfig::default();
		config.routing.max_hops = 0;
		assert!(ConfigLoader::validate_config(&config).is_err());
	}

	#[test]
	fn test_validation_rejects_inverted_buffer_targets() {
		let mut config = RouterConfig::default();
		config.buffers.tokens.insert(
			"DAI".to_string(),
			crate::types::BufferTokenConfig {
				total: dec!(1000),
				min: dec!(900),
				max: dec!(1200),
				target: dec!(100),
			},
		);
		assert!(ConfigLoader::validate_config(&config).is_err());
	}

	#[test]
	fn test_toml_round_trip() {
		let config = RouterConfig::default();
		let serialized = toml::to_string(&config).unwrap();
		let reparsed = ConfigLoader::from_toml(&serialized).unwrap();
		assert_eq!(reparsed.routing.max_hops, config.routing.max_hops);
		assert_eq!(
			reparsed.quotes.oracle_deviation_threshold,
			config.quotes.oracle_deviation_threshold
		);
	}
}
