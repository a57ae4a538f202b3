use advisor_core::domain::profile::{EtfProfile, KnowledgeDocument};
use advisor_core::embedding::EmbeddingClient;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod source;

#[derive(Debug, Parser)]
#[command(name = "advisor_worker")]
struct Args {
    /// Path to the profile source file (JSON array of ETF records).
    #[arg(long)]
    source: PathBuf,

    /// Parse, validate, and render documents, but skip embedding and writes.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = advisor_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let source_label = args.source.display().to_string();

    let profiles = source::load_profiles(&args.source)?;
    let documents: Vec<KnowledgeDocument> = profiles.iter().map(source::render_document).collect();

    if args.dry_run {
        tracing::info!(
            %source_label,
            dry_run = true,
            profiles = profiles.len(),
            "knowledge base rebuild (dry-run)"
        );
        return Ok(());
    }

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    advisor_core::storage::migrate(&pool).await?;

    let mut lock_conn = pool
        .acquire()
        .await
        .context("acquiring lock connection failed")?;
    let acquired = advisor_core::storage::lock::try_acquire_rebuild_lock(&mut lock_conn).await?;
    if !acquired {
        tracing::warn!("rebuild lock not acquired; another ingest in progress");
        return Ok(());
    }

    let embedding =
        advisor_core::embedding::openai::OpenAiEmbeddingClient::from_settings(&settings)?;

    let started_at = chrono::Utc::now();
    let result = rebuild(&pool, &embedding, &profiles, documents).await;

    match &result {
        Ok(affected) => {
            let run_id = advisor_core::storage::knowledge::record_ingest_run(
                &pool,
                started_at,
                &source_label,
                "success",
                None,
                profiles.len() as i32,
            )
            .await?;
            tracing::info!(%run_id, affected, profiles = profiles.len(), "knowledge base rebuilt");
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            let run_id = advisor_core::storage::knowledge::record_ingest_run(
                &pool,
                started_at,
                &source_label,
                "error",
                Some(&format!("{err:#}")),
                profiles.len() as i32,
            )
            .await?;
            tracing::error!(%run_id, error = %err, "knowledge base rebuild failed");
        }
    }

    let _ = advisor_core::storage::lock::release_rebuild_lock(&mut lock_conn).await;
    result.map(|_| ())
}

async fn rebuild(
    pool: &sqlx::PgPool,
    embedding: &impl EmbeddingClient,
    profiles: &[EtfProfile],
    documents: Vec<KnowledgeDocument>,
) -> anyhow::Result<u64> {
    let mut embedded = Vec::with_capacity(documents.len());
    for document in documents {
        let vector = embedding
            .embed(&document.content)
            .await
            .with_context(|| format!("embedding document for {} failed", document.code))?;
        tracing::debug!(code = %document.code, "document embedded");
        embedded.push((document, vector));
    }

    advisor_core::storage::knowledge::replace_knowledge_base(pool, profiles, &embedded).await
}

fn init_sentry(settings: &advisor_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
