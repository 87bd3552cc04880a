//! Wire shape of the SERP batch-result webhook (§6): the payload carries no
//! project id or date, so the HTTP layer supplies both out of band (from the
//! route path or the subscriber id the webhook was registered under).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RequestInfo {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Batch {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLinks {
    pub json: Option<String>,
    pub csv: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    pub id: i64,
    pub searches_completed: i64,
    pub searches_failed: i64,
    pub download_links: DownloadLinks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub request_info: RequestInfo,
    pub batch: Batch,
    pub result_set: ResultSet,
}

impl WebhookPayload {
    pub const EXPECTED_TYPE: &'static str = "batch_resultset_completed";

    pub fn is_recognized_type(&self) -> bool {
        self.request_info.kind == Self::EXPECTED_TYPE
    }
}
