use crate::auth::{timestamp_ms, RequestAuth, RequestSigner};
use crate::core::config::BybitConfig;
use crate::core::errors::BybitError;
use crate::core::params::Params;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{instrument, trace};

/// Authenticated REST client for the Bybit V5 API.
///
/// Every call signs a fresh timestamp; REST calls are stateless and can run
/// concurrently from any number of tasks. If the configuration selects RSA
/// signing, the private key must parse here or construction fails - there is
/// no fallback to HMAC.
#[derive(Debug)]
pub struct BybitClient {
    http: reqwest::Client,
    auth: RequestAuth,
    base_url: String,
}

impl BybitClient {
    pub fn new(config: BybitConfig) -> Result<Self, BybitError> {
        let signer = RequestSigner::from_config(&config)?;
        let auth = RequestAuth::new(config.api_key().to_string(), config.recv_window, signer);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("bybitx/0.1")
            .build()?;

        Ok(Self {
            http,
            auth,
            base_url: config.rest_base_url(),
        })
    }

    /// The REST endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    /// Issue one signed request.
    ///
    /// GET parameters travel in the query string using the same sorted
    /// encoding that was signed; other methods send the exact JSON body the
    /// signature covers (`{}` when there are no parameters). A response body
    /// that is not valid JSON is surfaced as `{"raw": <text>}` instead of an
    /// error.
    #[instrument(skip(self, params), fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Value, BybitError> {
        let timestamp = timestamp_ms();
        let headers = self.auth.headers(method.as_str(), params, timestamp)?;

        let mut url = format!("{}{}", self.base_url, path);
        if method == Method::GET && !params.is_empty() {
            url.push('?');
            url.push_str(&params.to_query());
        }

        let mut request = self.http.request(method.clone(), &url);
        for (key, value) in headers {
            request = request.header(&key, &value);
        }
        if method != Method::GET {
            request = request.body(params.to_body());
        }

        let response = request.send().await?;
        let text = response.text().await?;
        trace!("response body: {}", text);

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(_) => Ok(json!({ "raw": text })),
        }
    }

    pub(crate) async fn get(&self, path: &str, params: &Params) -> Result<Value, BybitError> {
        self.request(Method::GET, path, params).await
    }

    pub(crate) async fn post(&self, path: &str, params: &Params) -> Result<Value, BybitError> {
        self.request(Method::POST, path, params).await
    }
}
