use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::USER_TYPE_DIRECTED;
use crate::domain::entities::store_data::StoreData;

/// Claim set of a receipt as issued. The issue path is strictly typed; the
/// verify path goes through [`DecodedReceipt`] instead, because presented
/// tokens may be shaped however an attacker likes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptClaims {
    pub typ: String,
    pub product: ReceiptProduct,
    pub user: ReceiptUser,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub verify: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reissue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptProduct {
    pub url: String,
    pub storedata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ReceiptUser {
    pub fn directed(value: impl Into<String>) -> Self {
        ReceiptUser {
            kind: USER_TYPE_DIRECTED.to_string(),
            value: value.into(),
        }
    }
}

/// A decoded claim set on the verify path. Every accessor tolerates missing
/// or mistyped fields and answers `None` instead.
#[derive(Debug, Clone)]
pub struct DecodedReceipt {
    fields: Map<String, Value>,
}

impl DecodedReceipt {
    pub fn new(fields: Map<String, Value>) -> Self {
        DecodedReceipt { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn typ(&self) -> Option<&str> {
        self.fields.get("typ")?.as_str()
    }

    pub fn verify_url(&self) -> Option<&str> {
        self.fields.get("verify")?.as_str()
    }

    pub fn user_type(&self) -> Option<&str> {
        self.fields.get("user")?.as_object()?.get("type")?.as_str()
    }

    pub fn user_value(&self) -> Option<&str> {
        self.fields.get("user")?.as_object()?.get("value")?.as_str()
    }

    pub fn storedata(&self) -> Option<&str> {
        self.fields
            .get("product")?
            .as_object()?
            .get("storedata")?
            .as_str()
    }

    /// `exp` as unix seconds. Fractional values truncate; anything
    /// non-numeric is `None` and the verifier treats it as expired.
    pub fn expiry(&self) -> Option<i64> {
        let exp = self.fields.get("exp")?;
        exp.as_i64().or_else(|| exp.as_f64().map(|value| value as i64))
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.fields.get("iat")?.as_i64()
    }

    /// Best-effort app id for audit logs. Never used for authorization.
    pub fn app_id(&self) -> Option<i64> {
        let store_data = StoreData::decode(self.storedata()?)?;
        Some(store_data.app_id)
    }
}
