//! Client configuration loaded from environment variables.

use thiserror::Error;
use xec_core::constants::Network;

/// Indexer used when `XEC_API_URLS` is unset.
pub const DEFAULT_MAINNET_URL: &str = "https://chronik.be.cash/xec";
/// Indexer used when `XEC_API_URLS_TEST` is unset.
pub const DEFAULT_TESTNET_URL: &str = "https://chronik-testnet.fabien.cash";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("XEC_NETWORK must be mainnet or testnet, got {0:?}")] InvalidNetwork(String),
    #[error("no API endpoint configured for {0}")] NoEndpoint(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Network the wallet operates on.
    pub network: Network,
    /// Mainnet indexer endpoints, in preference order.
    pub api_urls: Vec<String>,
    /// Testnet indexer endpoints, in preference order.
    pub api_urls_test: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            api_urls: vec![DEFAULT_MAINNET_URL.to_string()],
            api_urls_test: vec![DEFAULT_TESTNET_URL.to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup("XEC_NETWORK") {
            Some(raw) => Network::parse(&raw).ok_or(ConfigError::InvalidNetwork(raw))?,
            None => Network::Mainnet,
        };

        let api_urls = lookup("XEC_API_URLS")
            .map(|s| split_urls(&s))
            .unwrap_or_else(|| vec![DEFAULT_MAINNET_URL.to_string()]);

        let api_urls_test = lookup("XEC_API_URLS_TEST")
            .map(|s| split_urls(&s))
            .unwrap_or_else(|| vec![DEFAULT_TESTNET_URL.to_string()]);

        Ok(Config {
            network,
            api_urls,
            api_urls_test,
        })
    }

    /// Endpoints for the configured network.
    pub fn urls(&self) -> &[String] {
        match self.network {
            Network::Mainnet => &self.api_urls,
            Network::Testnet => &self.api_urls_test,
        }
    }

    /// The `index`-th endpoint for the configured network.
    pub fn rest_url(&self, index: usize) -> Option<&str> {
        self.urls().get(index).map(String::as_str)
    }

    /// The preferred endpoint, or an error when the list is empty.
    pub fn primary_url(&self) -> Result<&str, ConfigError> {
        self.rest_url(0)
            .ok_or(ConfigError::NoEndpoint(self.network.name()))
    }
}

// Entries are kept as given; endpoint validity is only checked on use.
fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MAINNET_LIST: &str =
        "https://rest.kingbch.com/v3/,https://wallet-service-prod.bitframe.org/v3/,notevenaurl,https://rest.kingbch.com/v3/";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn testnet_uses_test_list() {
        let config = Config::from_lookup(lookup(&[
            ("XEC_NETWORK", "testnet"),
            ("XEC_API_URLS", MAINNET_LIST),
            ("XEC_API_URLS_TEST", "https://free-test.fullstack.cash/v3/"),
        ]))
        .unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.rest_url(0), Some("https://free-test.fullstack.cash/v3/"));
    }

    #[test]
    fn mainnet_primary_url() {
        let config = Config::from_lookup(lookup(&[
            ("XEC_NETWORK", "mainnet"),
            ("XEC_API_URLS", MAINNET_LIST),
        ]))
        .unwrap();
        assert_eq!(config.rest_url(0), Some("https://rest.kingbch.com/v3/"));
        assert_eq!(config.rest_url(2), Some("notevenaurl"));
        assert_eq!(config.rest_url(4), None);
    }

    #[test]
    fn defaults_without_env() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.primary_url().unwrap(), DEFAULT_MAINNET_URL);
    }

    #[test]
    fn invalid_network_rejected() {
        let err = Config::from_lookup(lookup(&[("XEC_NETWORK", "regtest")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidNetwork("regtest".into()));
    }

    #[test]
    fn empty_list_has_no_primary() {
        let config = Config::from_lookup(lookup(&[("XEC_API_URLS", "")])).unwrap();
        assert_eq!(config.rest_url(0), None);
        assert!(matches!(config.primary_url(), Err(ConfigError::NoEndpoint(_))));
    }
}
