//! Request signing for authenticated exchange endpoints
//!
//! Binance and CoinDCX sign with hex-encoded HMAC-SHA256; OKX uses the
//! same MAC but base64-encodes it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ExchangeCredentials;

type HmacSha256 = Hmac<Sha256>;

fn mac(payload: &str, secret: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, so new_from_slice cannot fail here
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any size"),
    };
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// HMAC-SHA256 of `payload`, hex encoded
pub fn sign_hex(payload: &str, secret: &str) -> String {
    hex::encode(mac(payload, secret))
}

/// HMAC-SHA256 of `payload`, base64 encoded
pub fn sign_base64(payload: &str, secret: &str) -> String {
    STANDARD.encode(mac(payload, secret))
}

/// API credentials held by an adapter
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
    passphrase: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// True when key and secret are both set
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// Hex signature using the API secret
    pub fn sign(&self, payload: &str) -> String {
        sign_hex(payload, &self.api_secret)
    }
}

impl From<&ExchangeCredentials> for Credentials {
    fn from(config: &ExchangeCredentials) -> Self {
        let creds = Credentials::new(&config.api_key, &config.api_secret);
        match &config.api_password {
            Some(pass) => creds.with_passphrase(pass),
            None => creds,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_hex_known_vector() {
        // Example from the Binance API documentation
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = concat!(
            "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1",
            "&recvWindow=5000&timestamp=1499827319559"
        );
        assert_eq!(
            sign_hex(query, secret),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_sign_hex_shape() {
        let signature = sign_hex(r#"{"timestamp":1234567890}"#, "test_secret");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sign_base64_matches_hex_bytes() {
        let payload = "2020-12-08T09:08:57.715ZGET/api/v5/account/balance";
        let b64 = sign_base64(payload, "secret");
        let decoded = STANDARD.decode(b64).unwrap();
        assert_eq!(hex::encode(decoded), sign_hex(payload, "secret"));
    }

    #[test]
    fn test_different_secrets_produce_different_signatures() {
        let body = r#"{"timestamp":1234567890}"#;
        assert_ne!(sign_hex(body, "secret1"), sign_hex(body, "secret2"));
    }

    #[test]
    fn test_credentials_from_config() {
        let config = ExchangeCredentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            api_password: Some("pass".to_string()),
        };
        let creds = Credentials::from(&config);
        assert_eq!(creds.api_key(), "key");
        assert_eq!(creds.passphrase(), Some("pass"));
        assert!(creds.is_complete());
        assert_eq!(creds.sign("x"), sign_hex("x", "secret"));
    }

    #[test]
    fn test_incomplete_credentials() {
        assert!(!Credentials::new("", "secret").is_complete());
        assert!(!Credentials::new("key", "").is_complete());
    }
}
