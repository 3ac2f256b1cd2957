use crate::db::DbPool;
use anyhow::Result;

pub async fn health_check(pool: &DbPool) -> Result<()> {
    // Check database
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}
