//! Shared fixtures for the unit test suite.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::settings::{Settings, SigningSettings};
use crate::signer::ReceiptSigner;

pub(crate) struct TestKey {
    pub private_pem: Vec<u8>,
    pub public_pem: Vec<u8>,
}

/// One RSA key for the whole suite; generation is too slow to repeat per
/// test.
pub(crate) static RSA_KEY: Lazy<TestKey> = Lazy::new(|| {
    let rsa = openssl::rsa::Rsa::generate(2048).expect("rsa generation");
    TestKey {
        private_pem: rsa.private_key_to_pem().expect("private pem"),
        public_pem: rsa.public_key_to_pem().expect("public pem"),
    }
});

/// A second key, for signatures that must not verify.
pub(crate) static OTHER_RSA_KEY: Lazy<TestKey> = Lazy::new(|| {
    let rsa = openssl::rsa::Rsa::generate(2048).expect("rsa generation");
    TestKey {
        private_pem: rsa.private_key_to_pem().expect("private pem"),
        public_pem: rsa.public_key_to_pem().expect("public pem"),
    }
});

pub(crate) fn test_signer() -> ReceiptSigner {
    ReceiptSigner::local_from_pem(&RSA_KEY.private_pem).expect("local signer")
}

pub(crate) fn test_settings() -> Settings {
    Settings {
        site_url: "https://marketplace.example.com".to_string(),
        verify_url: "https://receipts.example.com/verifier/".to_string(),
        expiry_seconds: crate::constants::DEFAULT_EXPIRY_SECONDS,
        reissue_on_expiry: false,
        // The key path is never read: tests construct signers directly.
        signing: SigningSettings::Local {
            key_path: PathBuf::from("unused.pem"),
        },
        database: None,
        bind_addr: "127.0.0.1:0".parse().expect("bind addr"),
    }
}
