//! §4.6.7: the terminal scoring phase. Computes per-company and per-page DSI
//! within each content type, then ranks companies densely with ties broken
//! by (keyword coverage desc, avg position asc).
//!
//! Organic: `DSI = sqrt(KeywordCoverage * TrafficShare * ContentRelevance)`.
//! News/video: `DSI = 0.40*KeywordCoverage + 0.30*ContentRelevance +
//! 0.20*MarketPresence + 0.10*PositionScore`. Both preserved per the source's
//! two formulas (§9); whether organic should also take the weighted form is
//! left as a config-level non-decision here — this worker only implements
//! the documented split.

use std::collections::HashMap;

use async_trait::async_trait;
use dsi_common::{
    ContentType, DsiCompanyScore, DsiPageScore, MarketPositionLabel, PipelineConfig, PipelineRunId,
};
use serde_json::json;

use super::{PhaseResult, PhaseWorker};
use crate::deps::PipelineDeps;

pub struct DsiCalculationWorker;

#[derive(Default)]
struct DomainAgg {
    keywords: std::collections::HashSet<String>,
    positions: Vec<i32>,
    traffic: f64,
    relevance_sum: f64,
    relevance_n: u32,
    pages: Vec<(String, f64, f64)>, // (url, content_relevance, position_score)
}

#[async_trait]
impl PhaseWorker for DsiCalculationWorker {
    async fn run(&self, run_id: PipelineRunId, _config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult {
        let analysis = match deps.store.content_analysis_for_run(run_id).await {
            Ok(rows) => rows,
            Err(e) => return PhaseResult::failed(format!("failed to read content analysis: {e}")),
        };
        // ContentRelevance per page (§4.6.7): sum of persona-alignment scores,
        // normalized to [0,1].
        let analysis_by_url: HashMap<String, f64> = analysis
            .into_iter()
            .map(|a| {
                let sum: f64 = a.persona_scores.iter().map(|p| p.score).sum();
                (a.url, sum.clamp(0.0, 1.0))
            })
            .collect();

        let mut company_written = false;
        let mut page_written = false;

        let mut per_type_serp: HashMap<ContentType, Vec<dsi_common::SerpResultRow>> = HashMap::new();

        for content_type in [ContentType::Organic, ContentType::News, ContentType::Video] {
            let rows = match deps.store.serp_results_for_run(run_id, content_type).await {
                Ok(rows) => rows,
                Err(e) => return PhaseResult::failed(format!("failed to read serp rows: {e}")),
            };
            per_type_serp.insert(content_type, rows);
        }

        for content_type in [ContentType::Organic, ContentType::News, ContentType::Video] {
            let rows = per_type_serp.remove(&content_type).unwrap_or_default();
            if rows.is_empty() {
                continue;
            }

            let total_keywords: std::collections::HashSet<&str> =
                rows.iter().map(|r| r.keyword_id.as_str()).collect();
            let keyword_count = total_keywords.len().max(1) as f64;
            let total_traffic: f64 = rows.iter().filter_map(|r| r.estimated_traffic).sum();

            let mut by_domain: HashMap<String, DomainAgg> = HashMap::new();
            for row in &rows {
                let position_score = position_proxy(row.position);
                let analyzed_relevance = analysis_by_url.get(&row.url).copied();

                let agg = by_domain.entry(row.domain.clone()).or_default();
                agg.keywords.insert(row.keyword_id.clone());
                agg.positions.push(row.position);
                agg.traffic += row.estimated_traffic.unwrap_or(0.0);
                if let Some(relevance) = analyzed_relevance {
                    agg.relevance_sum += relevance;
                    agg.relevance_n += 1;
                }
                agg.pages.push((row.url.clone(), analyzed_relevance.unwrap_or(0.5), position_score));
            }

            let mut scores = Vec::with_capacity(by_domain.len());
            let mut page_scores = Vec::new();

            for (domain, agg) in &by_domain {
                let keyword_coverage = agg.keywords.len() as f64 / keyword_count;
                let avg_position =
                    agg.positions.iter().sum::<i32>() as f64 / agg.positions.len().max(1) as f64;
                let position_score = position_proxy_f(avg_position);
                let traffic_share = if total_traffic > 0.0 {
                    agg.traffic / total_traffic
                } else {
                    position_score * keyword_coverage
                };
                let content_relevance = if agg.relevance_n > 0 {
                    agg.relevance_sum / agg.relevance_n as f64
                } else {
                    0.5
                };
                let market_presence = (agg.positions.len() as f64 / 20.0).min(1.0);

                let dsi = match content_type {
                    ContentType::Organic => {
                        (keyword_coverage * traffic_share * content_relevance).max(0.0).sqrt()
                    }
                    ContentType::News | ContentType::Video => {
                        0.40 * keyword_coverage
                            + 0.30 * content_relevance
                            + 0.20 * market_presence
                            + 0.10 * position_score
                    }
                };

                scores.push((
                    domain.clone(),
                    keyword_coverage,
                    avg_position,
                    traffic_share,
                    content_relevance,
                    market_presence,
                    position_score,
                    dsi,
                ));

                let page_count = agg.pages.len().max(1) as f64;
                for (url, relevance, pos_score) in &agg.pages {
                    page_scores.push(DsiPageScore {
                        pipeline_run_id: run_id,
                        content_type,
                        url: url.clone(),
                        root_domain: domain.clone(),
                        content_relevance: *relevance,
                        position_score: *pos_score,
                        contribution: (dsi / page_count).max(0.0),
                    });
                }
            }

            // Dense ranking, ties broken by (keyword coverage desc, avg position asc).
            scores.sort_by(|a, b| {
                b.7.partial_cmp(&a.7)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            });

            let mut company_scores = Vec::with_capacity(scores.len());
            let mut rank = 0i32;
            let mut prev_dsi: Option<f64> = None;
            for (idx, (domain, kc, _avg_pos, ts, cr, mp, ps, dsi)) in scores.into_iter().enumerate() {
                if prev_dsi.map(|p| (p - dsi).abs() > f64::EPSILON).unwrap_or(true) || idx == 0 {
                    rank += 1;
                }
                prev_dsi = Some(dsi);

                let dsi_pct = dsi * 100.0;
                company_scores.push(DsiCompanyScore {
                    pipeline_run_id: run_id,
                    content_type,
                    root_domain: domain,
                    keyword_coverage: kc,
                    traffic_share: ts,
                    content_relevance: cr,
                    market_presence: matches!(content_type, ContentType::News | ContentType::Video)
                        .then_some(mp),
                    position_score: matches!(content_type, ContentType::News | ContentType::Video)
                        .then_some(ps),
                    dsi,
                    rank,
                    label: MarketPositionLabel::from_dsi_pct(dsi_pct),
                });
            }

            if deps.store.replace_dsi_scores(run_id, content_type, &company_scores).await.is_ok() {
                company_written = true;
            }
            if deps.store.replace_page_scores(run_id, content_type, &page_scores).await.is_ok() {
                page_written = true;
            }
        }

        if !company_written && !page_written {
            return PhaseResult::failed("no company or page scores could be written");
        }

        // Terminal phase (§4.6.7): both levels must be written for success.
        if !company_written || !page_written {
            return PhaseResult::failed("partial score write: both company and page levels are required");
        }

        PhaseResult::completed(json!({ "company_scores_written": company_written, "page_scores_written": page_written }))
    }
}

/// Position-based traffic/content proxy from an integer SERP position
/// (§4.6.7): `clip((21 - position) / 20, 0, 1)`.
fn position_proxy(position: i32) -> f64 {
    position_proxy_f(position as f64)
}

fn position_proxy_f(position: f64) -> f64 {
    ((21.0 - position) / 20.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_proxy_clips_to_unit_interval() {
        assert_eq!(position_proxy(1), 1.0);
        assert_eq!(position_proxy(21), 0.0);
        assert_eq!(position_proxy(50), 0.0);
        assert!((position_proxy(11) - 0.5).abs() < 1e-9);
    }
}
