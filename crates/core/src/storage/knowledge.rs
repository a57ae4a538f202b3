use crate::domain::profile::{EtfProfile, Holding, KnowledgeDocument, ScoredDocument};
use crate::store::{KnowledgeStore, ProfileStore};
use anyhow::Context;
use sqlx::PgPool;
use std::collections::HashSet;

/// Postgres-backed knowledge and profile store. Vector search runs on the
/// pgvector extension with cosine distance, the same metric the worker uses
/// when it writes embeddings.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// pgvector accepts its bracketed text form through a `::vector` cast, which
/// keeps the driver free of extension-specific types.
pub fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[async_trait::async_trait]
impl KnowledgeStore for PgStore {
    async fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredDocument>> {
        let rows = sqlx::query_as::<_, (String, String, String, String, f64)>(
            "SELECT code, name, theme, content, (embedding <=> $1::vector)::float8 AS distance \
             FROM knowledge_documents \
             ORDER BY distance ASC \
             LIMIT $2",
        )
        .persistent(false)
        .bind(vector_literal(vector))
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .context("knowledge document search failed")?;

        Ok(rows
            .into_iter()
            .map(|(code, name, theme, content, distance)| ScoredDocument {
                document: KnowledgeDocument {
                    code,
                    name,
                    theme,
                    content,
                },
                distance,
            })
            .collect())
    }

    async fn known_codes(&self) -> anyhow::Result<HashSet<String>> {
        let rows = sqlx::query_as::<_, (String,)>("SELECT code FROM etf_profiles")
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .context("loading ETF identity set failed")?;
        Ok(rows.into_iter().map(|(code,)| code).collect())
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgStore {
    async fn top_holdings(&self, code: &str) -> anyhow::Result<Vec<Holding>> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            "SELECT holding_name, weight_pct \
             FROM etf_holdings \
             WHERE code = $1 \
             ORDER BY position ASC",
        )
        .persistent(false)
        .bind(code)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("loading holdings for {code} failed"))?;

        Ok(rows
            .into_iter()
            .map(|(name, weight_pct)| Holding { name, weight_pct })
            .collect())
    }
}

/// Atomically replaces the knowledge base: profiles, holdings, and embedded
/// documents land in one transaction, so readers never observe a half-built
/// index.
pub async fn replace_knowledge_base(
    pool: &PgPool,
    profiles: &[EtfProfile],
    documents: &[(KnowledgeDocument, Vec<f32>)],
) -> anyhow::Result<u64> {
    anyhow::ensure!(!profiles.is_empty(), "profiles must be non-empty");
    anyhow::ensure!(
        profiles.len() == documents.len(),
        "profile/document count mismatch: {} vs {}",
        profiles.len(),
        documents.len()
    );

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    for profile in profiles {
        sqlx::query(
            "INSERT INTO etf_profiles \
               (code, name, theme, expense_ratio, custody_fee, net_asset_value, annualized_yield, \
                perf_1m, perf_3m, perf_6m, perf_1y, refreshed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now()) \
             ON CONFLICT (code) DO UPDATE SET \
               name = EXCLUDED.name, theme = EXCLUDED.theme, \
               expense_ratio = EXCLUDED.expense_ratio, custody_fee = EXCLUDED.custody_fee, \
               net_asset_value = EXCLUDED.net_asset_value, annualized_yield = EXCLUDED.annualized_yield, \
               perf_1m = EXCLUDED.perf_1m, perf_3m = EXCLUDED.perf_3m, \
               perf_6m = EXCLUDED.perf_6m, perf_1y = EXCLUDED.perf_1y, \
               refreshed_at = now()",
        )
        .persistent(false)
        .bind(&profile.code)
        .bind(&profile.name)
        .bind(&profile.theme)
        .bind(profile.expense_ratio)
        .bind(profile.custody_fee)
        .bind(profile.net_asset_value)
        .bind(profile.annualized_yield)
        .bind(profile.performance.one_month)
        .bind(profile.performance.three_months)
        .bind(profile.performance.six_months)
        .bind(profile.performance.one_year)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert etf_profiles failed for {}", profile.code))?;

        sqlx::query("DELETE FROM etf_holdings WHERE code = $1")
            .persistent(false)
            .bind(&profile.code)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("clearing holdings failed for {}", profile.code))?;

        for (position, holding) in profile.holdings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO etf_holdings (code, position, holding_name, weight_pct) \
                 VALUES ($1, $2, $3, $4)",
            )
            .persistent(false)
            .bind(&profile.code)
            .bind(position as i32)
            .bind(&holding.name)
            .bind(holding.weight_pct)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert etf_holdings failed for {}", profile.code))?;
        }
    }

    let mut affected: u64 = 0;
    for (document, embedding) in documents {
        let res = sqlx::query(
            "INSERT INTO knowledge_documents (code, name, theme, content, embedding, refreshed_at) \
             VALUES ($1, $2, $3, $4, $5::vector, now()) \
             ON CONFLICT (code) DO UPDATE SET \
               name = EXCLUDED.name, theme = EXCLUDED.theme, content = EXCLUDED.content, \
               embedding = EXCLUDED.embedding, refreshed_at = now()",
        )
        .persistent(false)
        .bind(&document.code)
        .bind(&document.name)
        .bind(&document.theme)
        .bind(&document.content)
        .bind(vector_literal(embedding))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert knowledge_documents failed for {}", document.code))?;
        affected += res.rows_affected();
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

pub async fn record_ingest_run(
    pool: &PgPool,
    started_at: chrono::DateTime<chrono::Utc>,
    source: &str,
    status: &str,
    error: Option<&str>,
    profile_count: i32,
) -> anyhow::Result<uuid::Uuid> {
    let id = uuid::Uuid::new_v4();
    let finished_at = chrono::Utc::now();

    sqlx::query(
        "INSERT INTO knowledge_ingest_runs (id, started_at, finished_at, source, status, error, profile_count) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .persistent(false)
    .bind(id)
    .bind(started_at)
    .bind(finished_at)
    .bind(source)
    .bind(status)
    .bind(error)
    .bind(profile_count)
    .execute(pool)
    .await
    .context("insert knowledge_ingest_runs failed")?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_is_bracketed_and_comma_separated() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.0]), "[0.5,-1,2]");
        assert_eq!(vector_literal(&[]), "[]");
    }
}
