//! Bot configuration files
//!
//! A config file is named `{token}_bots.json` and looks like:
//!
//! ```json
//! {
//!   "token": "toad",
//!   "bots": {
//!     "toad_mexc": { "trading_pair": "TOAD/USDT", "exchange_set": "main", "exchange": "binance" }
//!   },
//!   "exchanges": {
//!     "main": { "binance": { "api_key": "...", "api_secret": "..." } }
//!   }
//! }
//! ```
//!
//! Bots keep the order they have in the file so index selection is stable.
//! Credentials can be overridden from the environment after loading.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::types::TradingPair;

/// Environment variable overriding the resolved bot's API key
pub const ENV_API_KEY: &str = "MARKET_BOTS_API_KEY";
/// Environment variable overriding the resolved bot's API secret
pub const ENV_API_SECRET: &str = "MARKET_BOTS_API_SECRET";
/// Environment variable overriding the resolved bot's API passphrase
pub const ENV_API_PASSWORD: &str = "MARKET_BOTS_API_PASSWORD";

/// Default directory holding `{token}_bots.json` files
pub const DEFAULT_CONFIG_DIR: &str = "configs";

/// Path of the config file for a token, e.g. `configs/toad_bots.json`
pub fn config_path_for_token(dir: impl AsRef<Path>, token: &str) -> PathBuf {
    dir.as_ref().join(format!("{}_bots.json", token))
}

/// `token` is either a single name or a list of names sharing the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenField {
    One(String),
    Many(Vec<String>),
}

impl TokenField {
    pub fn contains(&self, token: &str) -> bool {
        match self {
            TokenField::One(name) => name == token,
            TokenField::Many(names) => names.iter().any(|n| n == token),
        }
    }
}

/// One named bot entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Unified symbol, `BASE/QUOTE`
    pub trading_pair: String,
    /// Key into the top-level `exchanges` map
    pub exchange_set: String,
    /// Exchange name inside the exchange set; also selects the adapter
    pub exchange: String,
}

/// API credentials for one exchange account
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
    /// Passphrase, required by some exchanges (OKX)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_password: Option<String>,
}

impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &"***")
            .field("api_password", &self.api_password.as_ref().map(|_| "***"))
            .finish()
    }
}

fn redact(key: &str) -> String {
    if key.chars().count() <= 4 {
        "***".to_string()
    } else {
        format!("{}***", key.chars().take(4).collect::<String>())
    }
}

/// Parsed `{token}_bots.json`
#[derive(Debug, Clone, Deserialize)]
pub struct BotsConfig {
    #[serde(default)]
    pub token: Option<TokenField>,
    #[serde(default, deserialize_with = "deserialize_ordered_bots")]
    pub bots: Vec<(String, BotConfig)>,
    #[serde(default)]
    pub exchanges: HashMap<String, HashMap<String, ExchangeCredentials>>,
}

/// A bot entry joined with its credentials and parsed trading pair
#[derive(Debug, Clone)]
pub struct ResolvedBot {
    pub name: String,
    pub bot: BotConfig,
    pub credentials: ExchangeCredentials,
    pub pair: TradingPair,
}

impl BotsConfig {
    /// Load a config file; a missing file is reported as [`ConfigError::NotFound`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json_str(&contents)?;
        debug!(
            "Loaded {} bot(s) from {}",
            config.bots.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Load `{dir}/{token}_bots.json` and check that it is declared for `token`
    pub fn load_for_token(dir: impl AsRef<Path>, token: &str) -> Result<Self, ConfigError> {
        let path = config_path_for_token(dir, token);
        let config = Self::from_file(&path)?;
        config.ensure_token(token)?;
        Ok(config)
    }

    pub fn ensure_token(&self, token: &str) -> Result<(), ConfigError> {
        match &self.token {
            Some(field) if field.contains(token) => Ok(()),
            _ => Err(ConfigError::UnknownToken(token.to_string())),
        }
    }

    /// Bot names in file order
    pub fn bot_names(&self) -> Vec<&str> {
        self.bots.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn bot(&self, name: &str) -> Option<&BotConfig> {
        self.bots
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, bot)| bot)
    }

    /// Look up a bot, its exchange credentials and its trading pair
    pub fn resolve(&self, name: &str) -> Result<ResolvedBot, ConfigError> {
        let bot = self
            .bot(name)
            .ok_or_else(|| ConfigError::UnknownBot(name.to_string()))?;

        let set = self.exchanges.get(&bot.exchange_set).ok_or_else(|| {
            ConfigError::UnknownExchangeSet {
                bot: name.to_string(),
                exchange_set: bot.exchange_set.clone(),
            }
        })?;

        let credentials = set
            .get(&bot.exchange)
            .ok_or_else(|| ConfigError::UnknownExchange {
                exchange_set: bot.exchange_set.clone(),
                exchange: bot.exchange.clone(),
            })?;

        let pair: TradingPair = bot.trading_pair.parse()?;

        Ok(ResolvedBot {
            name: name.to_string(),
            bot: bot.clone(),
            credentials: credentials.clone(),
            pair,
        })
    }
}

impl ResolvedBot {
    /// Replace credentials with values from `lookup` where present
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.credentials.api_key = api_key;
            info!("API key overridden from {}", ENV_API_KEY);
        }
        if let Some(api_secret) = lookup(ENV_API_SECRET) {
            self.credentials.api_secret = api_secret;
            info!("API secret overridden from {}", ENV_API_SECRET);
        }
        if let Some(password) = lookup(ENV_API_PASSWORD) {
            self.credentials.api_password = Some(password);
            info!("API password overridden from {}", ENV_API_PASSWORD);
        }
    }

    /// Apply `MARKET_BOTS_API_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }
}

fn deserialize_ordered_bots<'de, D>(deserializer: D) -> Result<Vec<(String, BotConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedBots;

    impl<'de> Visitor<'de> for OrderedBots {
        type Value = Vec<(String, BotConfig)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of bot name to bot config")
        }

        fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut bots = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, bot)) = access.next_entry::<String, BotConfig>()? {
                match bots.iter_mut().find(|(existing, _)| *existing == name) {
                    // Later duplicates win, matching JSON object semantics
                    Some(entry) => entry.1 = bot,
                    None => bots.push((name, bot)),
                }
            }
            Ok(bots)
        }
    }

    deserializer.deserialize_map(OrderedBots)
}
