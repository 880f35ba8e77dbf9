use url::form_urlencoded;

/// The urlencoded `product.storedata` blob. `id` names the app; in-app
/// receipts add the backing contribution and the in-app product GUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreData {
    pub app_id: i64,
    pub contribution_id: Option<i64>,
    pub inapp_id: Option<String>,
}

impl StoreData {
    pub fn for_app(app_id: i64) -> Self {
        StoreData {
            app_id,
            contribution_id: None,
            inapp_id: None,
        }
    }

    pub fn for_inapp(app_id: i64, contribution_id: i64, inapp_id: String) -> Self {
        StoreData {
            app_id,
            contribution_id: Some(contribution_id),
            inapp_id: Some(inapp_id),
        }
    }

    pub fn encode(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("id", &self.app_id.to_string());
        if let Some(contribution_id) = self.contribution_id {
            query.append_pair("contrib", &contribution_id.to_string());
        }
        if let Some(inapp_id) = &self.inapp_id {
            query.append_pair("inapp_id", inapp_id);
        }
        query.finish()
    }

    /// Strict parse of attacker-controlled storedata. `None` means the blob
    /// is unusable: `id` missing or non-numeric, or `contrib` present but
    /// non-numeric. Repeated keys keep the last value.
    pub fn decode(raw: &str) -> Option<Self> {
        let mut app_id = None;
        let mut contribution_id = None;
        let mut inapp_id = None;
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "id" => app_id = Some(value.parse::<i64>().ok()?),
                "contrib" => contribution_id = Some(value.parse::<i64>().ok()?),
                "inapp_id" => inapp_id = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(StoreData {
            app_id: app_id?,
            contribution_id,
            inapp_id,
        })
    }
}
