use sqlx::PgPool;

/// Whether the latch `key` has been set.
pub async fn is_set(pool: &PgPool, key: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM dispatch_latches WHERE key = $1)")
        .bind(key)
        .fetch_one(pool)
        .await
}

/// Set the latch `key`; a second call keeps the original timestamp.
pub async fn set(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO dispatch_latches (key) VALUES ($1) ON CONFLICT (key) DO NOTHING")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}
