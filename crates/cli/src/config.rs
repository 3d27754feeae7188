//! Connection settings, merged from flags, the environment and defaults.

use clap::Args;
use easydefi_execution::config::SessionConfig;
use std::env;
use std::path::PathBuf;

const DEFAULT_STATE_FILE: &str = "easydefi-state.json";

/// Flags shared by every subcommand. Each falls back to an `EASYDEFI_*`
/// variable, then to the built-in default.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Simulated chain state file [env: EASYDEFI_STATE]
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Connected account [env: EASYDEFI_ACCOUNT]
    #[arg(long, global = true)]
    pub account: Option<String>,

    /// Platform contract address [env: EASYDEFI_CONTRACT]
    #[arg(long, global = true)]
    pub contract: Option<String>,

    /// Block explorer base URL [env: EASYDEFI_EXPLORER_URL]
    #[arg(long, global = true)]
    pub explorer_url: Option<String>,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub state_path: PathBuf,
    pub session: SessionConfig,
}

impl ConnectionArgs {
    pub fn resolve(self) -> CliConfig {
        let mut session = SessionConfig::default();
        if let Some(account) = self.account.or_else(|| from_env("EASYDEFI_ACCOUNT")) {
            session.account = account;
        }
        if let Some(contract) = self.contract.or_else(|| from_env("EASYDEFI_CONTRACT")) {
            session.contract = contract;
        }
        if let Some(url) = self.explorer_url.or_else(|| from_env("EASYDEFI_EXPLORER_URL")) {
            session.explorer_url = url;
        }
        let state_path = self
            .state
            .or_else(|| from_env("EASYDEFI_STATE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));

        CliConfig {
            state_path,
            session,
        }
    }
}

impl CliConfig {
    /// Maps a symbol of a configured token (case-insensitive) to its address.
    /// Anything else is taken as an address.
    pub fn token_address(&self, token: &str) -> String {
        self.session
            .tokens
            .iter()
            .find(|known| known.symbol.eq_ignore_ascii_case(token) || known.address == token)
            .map_or_else(|| token.to_string(), |known| known.address.clone())
    }

    pub fn symbol(&self, address: &str) -> String {
        self.session.symbol_of(address).to_string()
    }
}

fn from_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConnectionArgs {
        ConnectionArgs {
            state: Some(PathBuf::from("/tmp/chain.json")),
            account: Some("0xbob".to_string()),
            contract: None,
            explorer_url: None,
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = args().resolve();
        assert_eq!(config.state_path, PathBuf::from("/tmp/chain.json"));
        assert_eq!(config.session.account, "0xbob");
        assert_eq!(config.session.activity_limit, 5);
    }

    #[test]
    fn test_token_lookup_by_symbol() {
        let config = args().resolve();
        let aly = config.session.tokens[0].address.clone();
        assert_eq!(config.token_address("aly"), aly);
        assert_eq!(config.token_address(&aly), aly);
        assert_eq!(config.token_address("0xother"), "0xother");
        assert_eq!(config.symbol(&aly), "ALY");
    }
}
