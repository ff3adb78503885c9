use sqlx::postgres::PgPool;

pub async fn health_check(pool: &PgPool) -> anyhow::Result<bool> {
    let _result = sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await?;

    Ok(true)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))
}
