use anyhow::Context;

// Advisory locks are scoped to the Postgres session, so both calls must run
// on the same pinned connection, not through the pool. This guards against
// two ingestion runs rebuilding the knowledge base at the same time; readers
// are unaffected.
const REBUILD_LOCK_KEY: i64 = 0x4144_5649_534F52; // "ADVISOR" as hex-ish namespace.

pub async fn try_acquire_rebuild_lock(conn: &mut sqlx::PgConnection) -> anyhow::Result<bool> {
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(REBUILD_LOCK_KEY)
        .fetch_one(conn)
        .await
        .context("failed to acquire knowledge rebuild lock")?;
    Ok(acquired.0)
}

pub async fn release_rebuild_lock(conn: &mut sqlx::PgConnection) -> anyhow::Result<()> {
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(REBUILD_LOCK_KEY)
        .execute(conn)
        .await
        .context("failed to release knowledge rebuild lock")?;
    Ok(())
}
