//! Receipt signing and decoding, backed by a local RSA key or the remote
//! signing server.
//!
//! Locally signed tokens are bare RS512 JWTs. Remotely signed tokens carry
//! an issuer prefix, `<issuer>~<jwt>`, and verify against the public key on
//! disk for that issuer. Neither backend enforces `exp` at the crypto
//! layer; expiry is verifier policy.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use crate::constants::REMOTE_TOKEN_SEPARATOR;
use crate::data::datasources::signing_server_datasource::{
    SigningServerDatasource, SigningServerDatasourceImpl,
};
use crate::data::datasources::utils::decode_payload_unverified;
use crate::domain::entities::claims::{DecodedReceipt, ReceiptClaims};
use crate::errors::{DecodeError, SigningError};
use crate::settings::SigningSettings;

pub struct ReceiptSigner {
    backend: Backend,
}

enum Backend {
    Local {
        encoding: EncodingKey,
        decoding: DecodingKey,
    },
    Remote {
        datasource: Box<dyn SigningServerDatasource>,
        issuer_keys: HashMap<String, DecodingKey>,
    },
}

impl ReceiptSigner {
    pub fn from_settings(signing: &SigningSettings) -> Result<Self, SigningError> {
        match signing {
            SigningSettings::Local { key_path } => Self::local_from_pem_file(key_path),
            SigningSettings::Remote {
                server,
                timeout,
                valid_issuers,
                issuer_key_dir,
            } => Self::remote(server, *timeout, valid_issuers, issuer_key_dir),
        }
    }

    pub fn local_from_pem_file(path: &Path) -> Result<Self, SigningError> {
        let pem = std::fs::read(path)
            .map_err(|err| SigningError::Key(format!("{}: {err}", path.display())))?;
        Self::local_from_pem(&pem)
    }

    /// Builds the local backend from an RSA private key PEM. The public
    /// half used for verification is derived from the same material.
    pub fn local_from_pem(pem: &[u8]) -> Result<Self, SigningError> {
        let pkey = openssl::pkey::PKey::private_key_from_pem(pem)
            .map_err(|err| SigningError::Key(format!("not a private key PEM: {err}")))?;
        let rsa = pkey
            .rsa()
            .map_err(|err| SigningError::Key(format!("not an RSA key: {err}")))?;
        let public_pem = rsa
            .public_key_to_pem()
            .map_err(|err| SigningError::Key(format!("cannot derive public key: {err}")))?;
        let encoding = EncodingKey::from_rsa_pem(pem)
            .map_err(|err| SigningError::Key(format!("unusable for signing: {err}")))?;
        let decoding = DecodingKey::from_rsa_pem(&public_pem)
            .map_err(|err| SigningError::Key(format!("unusable for verification: {err}")))?;
        Ok(ReceiptSigner {
            backend: Backend::Local { encoding, decoding },
        })
    }

    fn remote(
        server: &str,
        timeout: Duration,
        valid_issuers: &[String],
        key_dir: &Path,
    ) -> Result<Self, SigningError> {
        let datasource = SigningServerDatasourceImpl::new(server, timeout)?;
        let mut issuer_keys = HashMap::new();
        for issuer in valid_issuers {
            let path = key_dir.join(format!("{issuer}.pem"));
            let pem = std::fs::read(&path)
                .map_err(|err| SigningError::Key(format!("{}: {err}", path.display())))?;
            let key = DecodingKey::from_rsa_pem(&pem)
                .map_err(|err| SigningError::Key(format!("{}: {err}", path.display())))?;
            issuer_keys.insert(issuer.clone(), key);
        }
        Ok(ReceiptSigner {
            backend: Backend::Remote {
                datasource: Box::new(datasource),
                issuer_keys,
            },
        })
    }

    #[cfg(test)]
    pub(crate) fn remote_with(
        datasource: Box<dyn SigningServerDatasource>,
        issuer_keys: HashMap<String, DecodingKey>,
    ) -> Self {
        ReceiptSigner {
            backend: Backend::Remote {
                datasource,
                issuer_keys,
            },
        }
    }

    pub async fn sign(&self, claims: &ReceiptClaims) -> Result<String, SigningError> {
        self.sign_value(&serde_json::to_value(claims)?).await
    }

    /// Signs an arbitrary claim map. The reissue path goes through here:
    /// its claims come from an existing token, not the typed builder.
    pub async fn sign_value(&self, claims: &Value) -> Result<String, SigningError> {
        match &self.backend {
            Backend::Local { encoding, .. } => {
                let header = Header::new(Algorithm::RS512);
                Ok(encode(&header, claims, encoding)?)
            }
            Backend::Remote { datasource, .. } => datasource.sign(claims).await,
        }
    }

    /// Verifies a presented token and returns its claim set.
    pub fn decode(&self, token: &str) -> Result<DecodedReceipt, DecodeError> {
        match &self.backend {
            Backend::Local { decoding, .. } => decode_with(token, decoding),
            Backend::Remote { issuer_keys, .. } => {
                let (issuer, jwt) = token
                    .split_once(REMOTE_TOKEN_SEPARATOR)
                    .ok_or_else(|| DecodeError::Malformed("missing issuer prefix".to_string()))?;
                let key = issuer_keys
                    .get(issuer)
                    .ok_or_else(|| DecodeError::UnknownIssuer(issuer.to_string()))?;
                decode_with(jwt, key)
            }
        }
    }
}

fn decode_with(jwt: &str, key: &DecodingKey) -> Result<DecodedReceipt, DecodeError> {
    let mut validation = Validation::new(Algorithm::RS512);
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();
    let data = decode::<Map<String, Value>>(jwt, key, &validation)?;
    Ok(DecodedReceipt::new(data.claims))
}

/// Decodes a token's claim set without verifying the signature, stripping
/// the remote issuer prefix when present. Only for flows that re-sign
/// receipts already verified once.
pub fn decode_unverified(token: &str) -> Result<DecodedReceipt, DecodeError> {
    let jwt = token
        .split_once(REMOTE_TOKEN_SEPARATOR)
        .map(|(_, jwt)| jwt)
        .unwrap_or(token);
    decode_payload_unverified(jwt).map(DecodedReceipt::new)
}
