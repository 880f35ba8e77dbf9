pub(crate) mod data {
    pub(crate) mod datasources {
        pub(crate) mod signing_server_datasource;
        pub(crate) mod utils;
    }
    pub(crate) mod repositories {
        pub(crate) mod sqlite_purchase_store;
    }
}

pub mod domain {
    pub mod entities {
        pub mod claims;
        pub mod flavor;
        pub mod outcome;
        pub mod purchase;
        pub mod store_data;
    }
    pub mod repositories {
        pub mod purchase_store;
    }
}

pub(crate) mod cef;
pub(crate) mod constants;

pub mod builder;
pub mod errors;
pub mod service;
pub mod settings;
pub mod signer;
pub mod util;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use data::repositories::sqlite_purchase_store::SqlitePurchaseStore;
