//! Process configuration, read from `RECEIPTS_*` environment variables.
//! `from_env` validates everything up front: URLs must parse, numbers must
//! be numbers, and each signing backend must name its key material.

use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use url::Url;

use crate::constants::DEFAULT_EXPIRY_SECONDS;
use crate::errors::SettingsError;

/// Which backend turns claim sets into signed tokens.
#[derive(Clone, Debug)]
pub enum SigningSettings {
    /// Sign in-process with an RSA private key read from disk.
    Local { key_path: PathBuf },
    /// Delegate signing to the remote signing server. Tokens come back as
    /// `<issuer>~<jwt>`; verification trusts only `valid_issuers`, whose
    /// public keys are PEM files named `<issuer>.pem` under `issuer_key_dir`.
    Remote {
        server: String,
        timeout: Duration,
        valid_issuers: Vec<String>,
        issuer_key_dir: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Public site URL, e.g. `https://marketplace.example.com`.
    pub site_url: String,
    /// Absolute URL receipts are POSTed to for full verification.
    pub verify_url: String,
    /// Lifetime of purchase receipts, in seconds.
    pub expiry_seconds: i64,
    /// Attach a re-signed receipt when an expired one is presented.
    pub reissue_on_expiry: bool,
    pub signing: SigningSettings,
    /// SQLite database holding purchase records. `None` selects an
    /// in-memory database.
    pub database: Option<PathBuf>,
    pub bind_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let site_url = required("RECEIPTS_SITE_URL")?;
        let verify_url = required("RECEIPTS_VERIFY_URL")?;
        check_url("RECEIPTS_SITE_URL", &site_url)?;
        check_url("RECEIPTS_VERIFY_URL", &verify_url)?;

        let expiry_seconds = match optional("RECEIPTS_EXPIRY_SECONDS") {
            Some(raw) => parse_number("RECEIPTS_EXPIRY_SECONDS", &raw)?,
            None => DEFAULT_EXPIRY_SECONDS,
        };
        if expiry_seconds <= 0 {
            return Err(SettingsError::Invalid {
                var: "RECEIPTS_EXPIRY_SECONDS",
                problem: "expiry window must be positive".into(),
            });
        }

        let reissue_on_expiry = optional("RECEIPTS_EXPIRED_SEND")
            .map(|raw| matches!(raw.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let signing = match optional("RECEIPTS_SIGNING_MODE").as_deref() {
            None | Some("local") => SigningSettings::Local {
                key_path: PathBuf::from(required("RECEIPTS_SIGNING_KEY")?),
            },
            Some("server") => {
                let timeout_seconds = match optional("RECEIPTS_SIGNING_TIMEOUT_SECONDS") {
                    Some(raw) => parse_number("RECEIPTS_SIGNING_TIMEOUT_SECONDS", &raw)?,
                    None => 10,
                };
                let valid_issuers: Vec<String> = required("RECEIPTS_VALID_ISSUERS")?
                    .split(',')
                    .map(|issuer| issuer.trim().to_string())
                    .filter(|issuer| !issuer.is_empty())
                    .collect();
                if valid_issuers.is_empty() {
                    return Err(SettingsError::Invalid {
                        var: "RECEIPTS_VALID_ISSUERS",
                        problem: "at least one trusted issuer is required".into(),
                    });
                }
                SigningSettings::Remote {
                    server: required("RECEIPTS_SIGNING_SERVER")?,
                    timeout: Duration::from_secs(timeout_seconds),
                    valid_issuers,
                    issuer_key_dir: PathBuf::from(required("RECEIPTS_ISSUER_KEY_DIR")?),
                }
            }
            Some(other) => {
                return Err(SettingsError::Invalid {
                    var: "RECEIPTS_SIGNING_MODE",
                    problem: format!("unknown mode {other:?}, expected \"local\" or \"server\""),
                })
            }
        };

        let bind_addr = optional("RECEIPTS_BIND")
            .unwrap_or_else(|| "0.0.0.0:8000".to_string())
            .parse()
            .map_err(|err| SettingsError::Invalid {
                var: "RECEIPTS_BIND",
                problem: format!("{err}"),
            })?;

        Ok(Settings {
            site_url,
            verify_url,
            expiry_seconds,
            reissue_on_expiry,
            signing,
            database: optional("RECEIPTS_DATABASE").map(PathBuf::from),
            bind_addr,
        })
    }

    /// True when signing is delegated to the remote signing server, the
    /// expected production configuration.
    pub fn remote_signing(&self) -> bool {
        matches!(self.signing, SigningSettings::Remote { .. })
    }

    /// Verification URL for a developer or reviewer receipt of one app,
    /// served on the site domain.
    pub fn app_verify_url(&self, guid: &str) -> String {
        self.site_join(&format!("/receipts/verify/{guid}/"))
    }

    /// Verification URL a test receipt points at; the handler behind it
    /// reports `status` for any structurally sound test receipt.
    pub fn test_verify_url(&self, status: &str) -> String {
        self.site_join(&format!("/receipts/test/verify/{status}/"))
    }

    /// Where clients ask for an expired receipt to be replaced.
    pub fn reissue_url(&self) -> String {
        self.site_join("/receipts/reissue/")
    }

    fn site_join(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }
}

fn required(var: &'static str) -> Result<String, SettingsError> {
    optional(var).ok_or(SettingsError::Missing(var))
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}

fn check_url(var: &'static str, value: &str) -> Result<(), SettingsError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|err| SettingsError::Invalid {
            var,
            problem: format!("{err}"),
        })
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err| SettingsError::Invalid {
        var,
        problem: format!("{err}"),
    })
}
