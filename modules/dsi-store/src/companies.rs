//! Company profile cache, historical keyword metric snapshots, and the
//! channel→company resolution map the Background Channel Resolver maintains
//! (§4.6.3, §4.10).

use anyhow::Result;
use chrono::{DateTime, Utc};
use dsi_common::{CompanyProfile, HistoricalKeywordMetric};

use crate::StateStore;

#[derive(Debug, Clone)]
pub struct ChannelCompanyMapping {
    pub channel_id: String,
    pub root_domain: String,
    pub source_type: String,
    pub attempt_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl StateStore {
    pub async fn fetch_company_profile(&self, root_domain: &str) -> Result<Option<CompanyProfile>> {
        let row = sqlx::query_as::<_, CompanyProfile>(
            r#"SELECT root_domain, company_name, industry, size, technologies, parent_company,
                      source_type, profile_updated_at
               FROM company_profiles WHERE root_domain = $1"#,
        )
        .bind(root_domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// A profile is fresh enough to skip re-enrichment when it is younger
    /// than `ttl_days` (§4.6.3's cache-before-call rule).
    pub async fn company_profile_is_fresh(&self, root_domain: &str, ttl_days: i64) -> Result<bool> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"SELECT profile_updated_at > now() - ($1 || ' days')::interval
               FROM company_profiles WHERE root_domain = $2"#,
        )
        .bind(ttl_days.to_string())
        .bind(root_domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0).unwrap_or(false))
    }

    pub async fn upsert_company_profile(&self, profile: &CompanyProfile) -> Result<()> {
        let technologies = serde_json::to_value(&profile.technologies)?;
        sqlx::query(
            r#"
            INSERT INTO company_profiles
                (root_domain, company_name, industry, size, technologies, parent_company,
                 source_type, profile_updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (root_domain) DO UPDATE SET
                company_name = EXCLUDED.company_name, industry = EXCLUDED.industry,
                size = EXCLUDED.size, technologies = EXCLUDED.technologies,
                parent_company = EXCLUDED.parent_company, source_type = EXCLUDED.source_type,
                profile_updated_at = now()
            "#,
        )
        .bind(&profile.root_domain)
        .bind(&profile.company_name)
        .bind(&profile.industry)
        .bind(&profile.size)
        .bind(technologies)
        .bind(&profile.parent_company)
        .bind(&profile.source_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_keyword_metric(&self, m: &HistoricalKeywordMetric) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO historical_keyword_metrics
                (snapshot_date, keyword_id, country, source, avg_monthly_searches,
                 competition_level, bid_low_cents, bid_high_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (snapshot_date, keyword_id, country, source) DO UPDATE SET
                avg_monthly_searches = EXCLUDED.avg_monthly_searches,
                competition_level = EXCLUDED.competition_level,
                bid_low_cents = EXCLUDED.bid_low_cents, bid_high_cents = EXCLUDED.bid_high_cents
            "#,
        )
        .bind(m.snapshot_date)
        .bind(&m.keyword_id)
        .bind(&m.country)
        .bind(&m.source)
        .bind(m.avg_monthly_searches)
        .bind(&m.competition_level)
        .bind(m.bid_low_cents)
        .bind(m.bid_high_cents)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest_keyword_metric(
        &self,
        keyword_id: &str,
        country: &str,
    ) -> Result<Option<HistoricalKeywordMetric>> {
        let row = sqlx::query_as::<_, HistoricalKeywordMetric>(
            r#"SELECT snapshot_date, keyword_id, country, source, avg_monthly_searches,
                      competition_level, bid_low_cents, bid_high_cents
               FROM historical_keyword_metrics
               WHERE keyword_id = $1 AND country = $2
               ORDER BY snapshot_date DESC LIMIT 1"#,
        )
        .bind(keyword_id)
        .bind(country)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn fetch_channel_mapping(&self, channel_id: &str) -> Result<Option<ChannelCompanyMapping>> {
        let row = sqlx::query_as::<_, ChannelCompanyMapping>(
            r#"SELECT channel_id, root_domain, source_type, attempt_count, updated_at
               FROM channel_company_map WHERE channel_id = $1"#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_channel_mapping(
        &self,
        channel_id: &str,
        root_domain: &str,
        source_type: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_company_map (channel_id, root_domain, source_type, attempt_count, updated_at)
            VALUES ($1, $2, $3, 0, now())
            ON CONFLICT (channel_id) DO UPDATE SET
                root_domain = EXCLUDED.root_domain, source_type = EXCLUDED.source_type,
                updated_at = now()
            "#,
        )
        .bind(channel_id)
        .bind(root_domain)
        .bind(source_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Channel ids seen in some run's video snapshots that still need a
    /// company-domain mapping: never attempted, or attempted but not yet at
    /// a terminal outcome (a real domain, or `no_domain_found`) and still
    /// under the retry ceiling.
    pub async fn unresolved_channel_ids(&self, max_attempts: i32, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT vs.channel_id
            FROM video_snapshots vs
            LEFT JOIN channel_company_map m ON m.channel_id = vs.channel_id
            WHERE vs.channel_id <> ''
              AND (
                m.channel_id IS NULL
                OR (m.root_domain = '' AND m.source_type <> 'no_domain_found' AND m.attempt_count < $1)
              )
            LIMIT $2
            "#,
        )
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn bump_channel_resolution_attempt(&self, channel_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_company_map (channel_id, source_type, attempt_count, updated_at)
            VALUES ($1, 'unresolved', 1, now())
            ON CONFLICT (channel_id) DO UPDATE SET
                attempt_count = channel_company_map.attempt_count + 1, updated_at = now()
            "#,
        )
        .bind(channel_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ChannelCompanyMapping {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(ChannelCompanyMapping {
            channel_id: row.try_get("channel_id")?,
            root_domain: row.try_get("root_domain")?,
            source_type: row.try_get("source_type")?,
            attempt_count: row.try_get("attempt_count")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
