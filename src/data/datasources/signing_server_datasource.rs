use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::constants::SIGNING_PATH;
use crate::errors::SigningError;

#[async_trait]
pub(crate) trait SigningServerDatasource: Send + Sync {
    /// POST a claim set to the signing server and return the serialized
    /// receipt token (`<issuer>~<jwt>`). Any transport problem, non-200
    /// status or malformed response is a [`SigningError`].
    async fn sign(&self, claims: &Value) -> Result<String, SigningError>;
}

pub(crate) struct SigningServerDatasourceImpl {
    client: reqwest::Client,
    sign_url: String,
}

#[async_trait]
impl SigningServerDatasource for SigningServerDatasourceImpl {
    async fn sign(&self, claims: &Value) -> Result<String, SigningError> {
        debug!(url = %self.sign_url, "requesting signature");
        let response = self
            .client
            .post(&self.sign_url)
            .json(claims)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "signing server unreachable");
                SigningError::from(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "signing server refused the request");
            return Err(SigningError::Status(status.as_u16()));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|err| SigningError::Response(format!("{err}")))?;
        if body.receipt.is_empty() {
            return Err(SigningError::Response("empty receipt field".to_string()));
        }
        Ok(body.receipt)
    }
}

impl SigningServerDatasourceImpl {
    /// `server` is the base URL of the signing service; the signing path is
    /// fixed. The timeout bounds the whole request.
    pub(crate) fn new(server: &str, timeout: Duration) -> Result<Self, SigningError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            sign_url: format!("{}{}", server.trim_end_matches('/'), SIGNING_PATH),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    receipt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_url_is_anchored_at_the_signing_path() {
        let datasource =
            SigningServerDatasourceImpl::new("https://signer.example.com/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(datasource.sign_url, "https://signer.example.com/1.0/sign");
    }

    #[test]
    fn response_parses_the_receipt_field() {
        let body: SignResponse =
            serde_json::from_str(r#"{"receipt": "issuer~abc.def.ghi"}"#).unwrap();
        assert_eq!(body.receipt, "issuer~abc.def.ghi");
    }
}
