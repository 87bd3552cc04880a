//! Process-local TTL cache for keyword-metric lookups (§4.2). Keyed by
//! (keyword, country) with a 24h default TTL — short enough that a metrics
//! provider update is visible within a day, long enough that a pipeline run
//! touching the same keyword across phases only pays for one fetch.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dsi_common::HistoricalKeywordMetric;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    value: HistoricalKeywordMetric,
    expires_at: Instant,
}

pub struct KeywordMetricCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl KeywordMetricCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, keyword_id: &str, country: &str) -> Option<HistoricalKeywordMetric> {
        let mut entries = self.entries.lock().unwrap();
        let key = (keyword_id.to_string(), country.to_string());
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, keyword_id: &str, country: &str, value: HistoricalKeywordMetric) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            (keyword_id.to_string(), country.to_string()),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeywordMetricCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(keyword_id: &str) -> HistoricalKeywordMetric {
        HistoricalKeywordMetric {
            snapshot_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            keyword_id: keyword_id.to_string(),
            country: "us".to_string(),
            source: "test".to_string(),
            avg_monthly_searches: 1000,
            competition_level: "medium".to_string(),
            bid_low_cents: 10,
            bid_high_cents: 50,
        }
    }

    #[test]
    fn miss_then_hit_after_put() {
        let cache = KeywordMetricCache::new();
        assert!(cache.get("crm software", "us").is_none());
        cache.put("crm software", "us", sample("crm software"));
        assert!(cache.get("crm software", "us").is_some());
    }

    #[test]
    fn entry_expires_past_ttl() {
        let cache = KeywordMetricCache::with_ttl(Duration::from_millis(10));
        cache.put("crm software", "us", sample("crm software"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("crm software", "us").is_none());
    }

    #[test]
    fn keys_are_scoped_by_country() {
        let cache = KeywordMetricCache::new();
        cache.put("crm software", "us", sample("crm software"));
        assert!(cache.get("crm software", "gb").is_none());
    }
}
