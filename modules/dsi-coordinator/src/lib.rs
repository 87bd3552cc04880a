//! Webhook intake and start-gating for SERP batch results (§4.7). Sits
//! between the HTTP surface that receives webhooks and the pipeline
//! orchestrator: it decides *when* a run should start, not how it runs.

mod coordinator;
mod webhook;

pub use coordinator::{CoordinatorError, IntakeOutcome, SerpBatchCoordinator};
pub use webhook::{Batch, DownloadLinks, RequestInfo, ResultSet, WebhookPayload};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_expected_webhook_type() {
        let payload = WebhookPayload {
            request_info: RequestInfo { kind: "batch_resultset_completed".into() },
            batch: Batch { id: "b1".into(), name: "ORGANIC_2026-08-01".into() },
            result_set: ResultSet {
                id: 1,
                searches_completed: 10,
                searches_failed: 0,
                download_links: DownloadLinks { json: Some("https://x/1.json".into()), csv: None },
            },
        };
        assert!(payload.is_recognized_type());
        assert_eq!(
            dsi_common::ContentType::from_batch_name(&payload.batch.name),
            Some(dsi_common::ContentType::Organic)
        );
    }

    #[test]
    fn rejects_unrecognized_webhook_type() {
        let payload = WebhookPayload {
            request_info: RequestInfo { kind: "something_else".into() },
            batch: Batch { id: "b1".into(), name: "NEWS_2026-08-01".into() },
            result_set: ResultSet {
                id: 1,
                searches_completed: 1,
                searches_failed: 0,
                download_links: DownloadLinks { json: None, csv: None },
            },
        };
        assert!(!payload.is_recognized_type());
    }
}
