use sqlx::{FromRow, PgPool};

use super::RecipientList;

/// Database row projection for a mailing list entry.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Recipient {
    pub email: String,
}

/// All addresses on `list`, oldest signup first.
pub async fn list_recipients(
    pool: &PgPool,
    list: RecipientList,
) -> Result<Vec<Recipient>, sqlx::Error> {
    // Table names come from a closed enum, never from input.
    let sql = format!("SELECT email FROM {} ORDER BY id", list.table());
    sqlx::query_as::<_, Recipient>(&sql).fetch_all(pool).await
}

/// Insert `email` unless present. Returns whether a row was inserted.
pub async fn insert_subscriber(
    pool: &PgPool,
    list: RecipientList,
    email: &str,
) -> Result<bool, sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (email) VALUES ($1) ON CONFLICT (email) DO NOTHING",
        list.table()
    );
    let result = sqlx::query(&sql).bind(email).execute(pool).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn count_subscribers(pool: &PgPool, list: RecipientList) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", list.table());
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await
}
