use async_trait::async_trait;

use crate::resp::api::GatewayError;

/// Raw HTTP reply: status and undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Reply {
        Reply {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers a URL-encoded form POST.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(&self, url: &str, fields: &[(&str, String)]) -> Result<Reply, GatewayError>;
}

/// `reqwest` transport. Redirects are followed, no timeout is applied.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> HttpTransport {
        HttpTransport::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, fields: &[(&str, String)]) -> Result<Reply, GatewayError> {
        let response = self
            .http
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Reply { status, body })
    }
}
