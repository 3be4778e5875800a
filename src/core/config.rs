use secrecy::{ExposeSecret, Secret};
use std::env;

/// Regional API domain selector.
///
/// Bybit serves several regulated regional deployments from dedicated
/// domains; the region only changes the host, never the request format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Global,
    Netherlands,
    Turkey,
    Kazakhstan,
    Georgia,
    UnitedArabEmirates,
}

impl Region {
    /// Parse a region code as accepted in configuration (`nl`, `tr`, `kz`,
    /// `ge`, `ae`); anything else maps to the global deployment.
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "nl" => Self::Netherlands,
            "tr" => Self::Turkey,
            "kz" => Self::Kazakhstan,
            "ge" => Self::Georgia,
            "ae" => Self::UnitedArabEmirates,
            _ => Self::Global,
        }
    }

    pub(crate) fn rest_host(self) -> &'static str {
        match self {
            Self::Global => "https://api.bybit.com",
            Self::Netherlands => "https://api.bybit.nl",
            Self::Turkey => "https://api.bybit-tr.com",
            Self::Kazakhstan => "https://api.bybit.kz",
            Self::Georgia => "https://api.bybitgeorgia.ge",
            Self::UnitedArabEmirates => "https://api.bybit.ae",
        }
    }

    pub(crate) fn stream_host(self) -> &'static str {
        match self {
            Self::Global => "wss://stream.bybit.com",
            Self::Netherlands => "wss://stream.bybit.nl",
            Self::Turkey => "wss://stream.bybit-tr.com",
            Self::Kazakhstan => "wss://stream.bybit.kz",
            Self::Georgia => "wss://stream.bybitgeorgia.ge",
            Self::UnitedArabEmirates => "wss://stream.bybit.ae",
        }
    }
}

/// Signature scheme for REST request authentication.
///
/// The scheme is fixed for the lifetime of a client; selecting `Rsa` without
/// parseable key material fails at client construction rather than silently
/// falling back to HMAC.
#[derive(Debug, Clone)]
pub enum SigningScheme {
    Hmac,
    Rsa { private_key_pem: Secret<String> },
}

#[derive(Debug, Clone)]
pub struct BybitConfig {
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    pub testnet: bool,
    pub region: Region,
    pub recv_window: u64,
    pub scheme: SigningScheme,
    pub base_url: Option<String>,
}

impl BybitConfig {
    /// Create a new configuration with API credentials (HMAC signing).
    #[must_use]
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            api_secret: Secret::new(api_secret),
            testnet: false,
            region: Region::Global,
            recv_window: 5000,
            scheme: SigningScheme::Hmac,
            base_url: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `BYBIT_API_KEY`
    /// - `BYBIT_API_SECRET`
    /// - `BYBIT_TESTNET` (optional, defaults to false)
    /// - `BYBIT_REGION` (optional, region code such as `nl`)
    /// - `BYBIT_RECV_WINDOW` (optional, milliseconds)
    /// - `BYBIT_RSA_PRIVATE_KEY` (optional, selects RSA signing)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("BYBIT_API_KEY")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("BYBIT_API_KEY".to_string()))?;
        let api_secret = env::var("BYBIT_API_SECRET")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("BYBIT_API_SECRET".to_string()))?;

        let testnet = env::var("BYBIT_TESTNET")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let region = env::var("BYBIT_REGION")
            .map(|code| Region::from_code(&code))
            .unwrap_or_default();

        let recv_window = env::var("BYBIT_RECV_WINDOW")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);

        let scheme = env::var("BYBIT_RSA_PRIVATE_KEY").map_or(SigningScheme::Hmac, |pem| {
            SigningScheme::Rsa {
                private_key_pem: Secret::new(pem),
            }
        });

        Ok(Self {
            api_key: Secret::new(api_key),
            api_secret: Secret::new(api_secret),
            testnet,
            region,
            recv_window,
            scheme,
            base_url: None,
        })
    }

    /// Create configuration from a .env file and environment variables.
    ///
    /// **Security Warning**: never commit .env files to version control.
    #[cfg(feature = "env-file")]
    pub fn from_env_file(env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // Missing .env file is fine, fall through to process env
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env()
    }

    /// Create configuration for public endpoints only (no credentials).
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Check if this configuration carries credentials for authenticated calls.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.api_secret.expose_secret().is_empty()
    }

    /// Set testnet mode.
    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Set the regional deployment.
    #[must_use]
    pub const fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Set the server-side staleness tolerance in milliseconds.
    #[must_use]
    pub const fn recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = recv_window;
        self
    }

    /// Select RSA request signing with the given PEM private key.
    #[must_use]
    pub fn rsa_key(mut self, private_key_pem: String) -> Self {
        self.scheme = SigningScheme::Rsa {
            private_key_pem: Secret::new(private_key_pem),
        };
        self
    }

    /// Override the REST base URL (takes precedence over testnet/region).
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get API secret (use carefully - exposes secret)
    pub fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    /// REST base URL for this configuration.
    pub fn rest_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.clone();
        }
        if self.testnet {
            return "https://api-testnet.bybit.com".to_string();
        }
        self.region.rest_host().to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
