use std::env;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{LikertValue, QuestionId};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::bridge::{PersistError, PersistenceBridge};

/// Form field carrying the anti-forgery token.
pub const TOKEN_FIELD: &str = "csrfmiddlewaretoken";

/// Form field name for a single answer, e.g. `p12-valor`.
#[must_use]
pub fn answer_field(question_id: QuestionId) -> String {
    format!("p{question_id}-valor")
}

/// Where the bridge reads the anti-forgery token from on every write.
#[derive(Clone)]
pub enum TokenSource {
    Static(String),
    Dynamic(Arc<dyn Fn() -> String + Send + Sync>),
}

impl TokenSource {
    /// The token a write issued now would carry.
    #[must_use]
    pub fn read(&self) -> String {
        match self {
            TokenSource::Static(token) => token.clone(),
            TokenSource::Dynamic(read) => read(),
        }
    }
}

impl From<String> for TokenSource {
    fn from(token: String) -> Self {
        TokenSource::Static(token)
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::Dynamic(_) => f.write_str("TokenSource::Dynamic(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpBridgeConfig {
    pub endpoint: Url,
    pub token: TokenSource,
}

impl HttpBridgeConfig {
    #[must_use]
    pub fn new(endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            endpoint,
            token: TokenSource::Static(token.into()),
        }
    }

    /// Read `QUIZ_ENDPOINT_URL` and `QUIZ_CSRF_TOKEN`.
    ///
    /// Returns `None` when no endpoint is configured or it is not a valid URL.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("QUIZ_ENDPOINT_URL").ok()?;
        if raw.trim().is_empty() {
            return None;
        }
        let endpoint = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(%err, %raw, "ignoring invalid QUIZ_ENDPOINT_URL");
                return None;
            }
        };
        let token = env::var("QUIZ_CSRF_TOKEN").unwrap_or_default();
        Some(Self::new(endpoint, token))
    }
}

/// Posts each answer as a form-encoded AJAX request, the shape the survey
/// server's autosave handler expects.
#[derive(Clone, Debug)]
pub struct HttpBridge {
    client: Client,
    config: HttpBridgeConfig,
}

impl HttpBridge {
    #[must_use]
    pub fn new(config: HttpBridgeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint
    }
}

#[async_trait]
impl PersistenceBridge for HttpBridge {
    fn token(&self) -> String {
        self.config.token.read()
    }

    async fn post_answer(
        &self,
        question_id: QuestionId,
        value: LikertValue,
        token: &str,
    ) -> Result<(), PersistError> {
        let field = answer_field(question_id);
        let value = value.to_string();
        let form = [(TOKEN_FIELD, token), (field.as_str(), value.as_str())];

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PersistError::HttpStatus(status));
        }

        // The body is optional; only an explicit `"ok": false` counts as a rejection.
        let body = response.text().await?;
        if let Ok(ack) = serde_json::from_str::<AutosaveAck>(&body) {
            if ack.ok == Some(false) {
                return Err(PersistError::Rejected(
                    ack.error.unwrap_or_else(|| "server reported ok=false".into()),
                ));
            }
            tracing::debug!(%question_id, saved = ?ack.saved, "autosave acknowledged");
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AutosaveAck {
    ok: Option<bool>,
    #[serde(alias = "salvas")]
    saved: Option<u32>,
    error: Option<String>,
}
