//! Environment-sourced configuration.
//!
//! The whole configuration is built and validated once at startup;
//! nothing re-reads the environment afterwards. Variables:
//!
//! | Variable | Format | Default |
//! |---|---|---|
//! | `PROVIDERS` | `address,priority;address,priority` (priority optional) | — |
//! | `DIRECT_ENDPOINTS` | `url;url` | — |
//! | `KEYS` | `key,key` | — |
//! | `PORT` | front-door port | 3000 |
//! | `HOST` | front-door host | 0.0.0.0 |
//! | `WORKER_BIN` | worker executable | 0g-compute-cli |
//! | `DEFAULT_PROVIDER_PRIORITY` | u32 | 100 |
//! | `DEFAULT_ENDPOINT_PRIORITY` | u32 | 50 |
//! | `RPC_ENDPOINT`, `LEDGER_CA`, `INFERENCE_CA`, `GAS_PRICE` | optional overrides | — |

use thiserror::Error;

use relay_registry::{InstanceId, LaunchSpec, ProviderSpec};

/// Offset added to the front-door port for the first worker port, so
/// workers never collide with the public listener.
pub const WORKER_PORT_OFFSET: u16 = 100;

/// Fatal configuration errors, reported before anything launches.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no providers or direct endpoints configured; set PROVIDERS or DIRECT_ENDPOINTS")]
    NothingToServe,

    #[error("on-chain providers configured but no keys; set KEYS")]
    MissingKeys,

    #[error("invalid port value: {0}")]
    InvalidPort(String),

    #[error("invalid priority value: {0}")]
    InvalidPriority(String),

    #[error("worker ports exceed the valid range (front-door port {0}, {1} instances)")]
    PortRange(u16, usize),
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub providers: Vec<ProviderSpec>,
    pub endpoints: Vec<String>,
    pub keys: Vec<String>,
    pub port: u16,
    pub host: String,
    pub worker_bin: String,
    pub default_provider_priority: u32,
    pub default_endpoint_priority: u32,
    pub rpc_endpoint: Option<String>,
    pub ledger_contract: Option<String>,
    pub inference_contract: Option<String>,
    pub gas_price: Option<String>,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (injectable for tests).
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_provider_priority = parse_priority(get("DEFAULT_PROVIDER_PRIORITY"), 100)?;
        let default_endpoint_priority = parse_priority(get("DEFAULT_ENDPOINT_PRIORITY"), 50)?;

        let port: u16 = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 3000,
        };

        let config = Self {
            providers: parse_providers(get("PROVIDERS"), default_provider_priority)?,
            endpoints: parse_list(get("DIRECT_ENDPOINTS"), ';'),
            keys: parse_list(get("KEYS"), ','),
            port,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            worker_bin: get("WORKER_BIN").unwrap_or_else(|| "0g-compute-cli".to_string()),
            default_provider_priority,
            default_endpoint_priority,
            rpc_endpoint: get("RPC_ENDPOINT"),
            ledger_contract: get("LEDGER_CA"),
            inference_contract: get("INFERENCE_CA"),
            gas_price: get("GAS_PRICE"),
        };
        config.validate()?;
        Ok(config)
    }

    /// One worker per key, or exactly one in direct-endpoint-only mode.
    pub fn instance_count(&self) -> usize {
        if self.keys.is_empty() { 1 } else { self.keys.len() }
    }

    /// Launch specs for every worker: ids `router-{i}`, ports offset
    /// from the front-door port.
    pub fn launch_specs(&self) -> Vec<(InstanceId, LaunchSpec)> {
        (0..self.instance_count())
            .map(|i| {
                let spec = LaunchSpec {
                    providers: self.providers.clone(),
                    endpoints: self.endpoints.clone(),
                    key: self.keys.get(i).cloned(),
                    port: self.port + WORKER_PORT_OFFSET + i as u16,
                    host: self.host.clone(),
                    default_provider_priority: self.default_provider_priority,
                    default_endpoint_priority: self.default_endpoint_priority,
                    rpc_endpoint: self.rpc_endpoint.clone(),
                    ledger_contract: self.ledger_contract.clone(),
                    inference_contract: self.inference_contract.clone(),
                    gas_price: self.gas_price.clone(),
                };
                (format!("router-{i}"), spec)
            })
            .collect()
    }

    /// Re-check the invariants. Called once inside `from_lookup`, and
    /// again by the caller after any field is overridden.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() && self.endpoints.is_empty() {
            return Err(ConfigError::NothingToServe);
        }
        if !self.providers.is_empty() && self.keys.is_empty() {
            return Err(ConfigError::MissingKeys);
        }
        let count = self.instance_count();
        let highest = self.port as usize + WORKER_PORT_OFFSET as usize + count - 1;
        if highest > u16::MAX as usize {
            return Err(ConfigError::PortRange(self.port, count));
        }
        Ok(())
    }
}

fn parse_list(raw: Option<String>, separator: char) -> Vec<String> {
    raw.map(|s| {
        s.split(separator)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_priority(raw: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match raw {
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPriority(s)),
        None => Ok(default),
    }
}

fn parse_providers(
    raw: Option<String>,
    default_priority: u32,
) -> Result<Vec<ProviderSpec>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let mut providers = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let provider = match entry.split_once(',') {
            Some((address, priority)) => ProviderSpec {
                address: address.trim().to_string(),
                priority: priority
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPriority(priority.trim().to_string()))?,
            },
            None => ProviderSpec {
                address: entry.to_string(),
                priority: default_priority,
            },
        };
        providers.push(provider);
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_is_fatal() {
        let result = config_from(&[]);
        assert!(matches!(result, Err(ConfigError::NothingToServe)));
    }

    #[test]
    fn providers_without_keys_is_fatal() {
        let result = config_from(&[("PROVIDERS", "0xaaa,10")]);
        assert!(matches!(result, Err(ConfigError::MissingKeys)));
    }

    #[test]
    fn direct_endpoints_need_no_keys() {
        let config = config_from(&[("DIRECT_ENDPOINTS", "http://a.test;http://b.test")]).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.instance_count(), 1);
    }

    #[test]
    fn one_instance_per_key() {
        let config = config_from(&[
            ("PROVIDERS", "0xaaa,10;0xbbb"),
            ("KEYS", "k0,k1,k2"),
        ])
        .unwrap();
        assert_eq!(config.instance_count(), 3);

        let specs = config.launch_specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].0, "router-0");
        assert_eq!(specs[2].0, "router-2");
        assert_eq!(specs[0].1.key.as_deref(), Some("k0"));
        assert_eq!(specs[2].1.key.as_deref(), Some("k2"));
    }

    #[test]
    fn provider_priority_defaults_when_omitted() {
        let config = config_from(&[
            ("PROVIDERS", "0xaaa,10;0xbbb"),
            ("KEYS", "k0"),
            ("DEFAULT_PROVIDER_PRIORITY", "42"),
        ])
        .unwrap();
        assert_eq!(config.providers[0].priority, 10);
        assert_eq!(config.providers[1].priority, 42);
    }

    #[test]
    fn worker_ports_are_offset_and_unique() {
        let config = config_from(&[
            ("DIRECT_ENDPOINTS", "http://a.test"),
            ("PROVIDERS", "0xaaa"),
            ("KEYS", "k0,k1"),
            ("PORT", "3000"),
        ])
        .unwrap();

        let specs = config.launch_specs();
        assert_eq!(specs[0].1.port, 3100);
        assert_eq!(specs[1].1.port, 3101);
    }

    #[test]
    fn defaults_applied() {
        let config = config_from(&[("DIRECT_ENDPOINTS", "http://a.test")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.worker_bin, "0g-compute-cli");
        assert_eq!(config.default_provider_priority, 100);
        assert_eq!(config.default_endpoint_priority, 50);
    }

    #[test]
    fn invalid_port_rejected() {
        let result = config_from(&[
            ("DIRECT_ENDPOINTS", "http://a.test"),
            ("PORT", "not-a-port"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn invalid_priority_rejected() {
        let result = config_from(&[
            ("PROVIDERS", "0xaaa,high"),
            ("KEYS", "k0"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidPriority(_))));
    }

    #[test]
    fn worker_port_overflow_rejected() {
        let result = config_from(&[
            ("DIRECT_ENDPOINTS", "http://a.test"),
            ("PORT", "65500"),
        ]);
        assert!(matches!(result, Err(ConfigError::PortRange(65500, 1))));
    }

    #[test]
    fn port_override_is_caught_by_revalidation() {
        // A valid env config whose port is then overridden from the
        // command line into the overflow range must fail validation
        // before any launch spec is built.
        let mut config = config_from(&[("DIRECT_ENDPOINTS", "http://a.test")]).unwrap();
        config.port = 65500;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::PortRange(65500, 1))));
    }

    #[test]
    fn optional_network_overrides_pass_through() {
        let config = config_from(&[
            ("DIRECT_ENDPOINTS", "http://a.test"),
            ("RPC_ENDPOINT", "http://rpc.test"),
            ("LEDGER_CA", "0xledger"),
            ("INFERENCE_CA", "0xinfer"),
            ("GAS_PRICE", "2000000"),
        ])
        .unwrap();

        let (_, spec) = &config.launch_specs()[0];
        assert_eq!(spec.rpc_endpoint.as_deref(), Some("http://rpc.test"));
        assert_eq!(spec.ledger_contract.as_deref(), Some("0xledger"));
        assert_eq!(spec.inference_contract.as_deref(), Some("0xinfer"));
        assert_eq!(spec.gas_price.as_deref(), Some("2000000"));
    }
}
