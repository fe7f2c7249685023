use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use genielytics_core::analytics::{CreateFavoriteRequest, Favorite, UpdateFavoriteRequest};

use crate::PgBackend;

pub(crate) async fn create_favorite_inner(
    db: &PgBackend,
    user_id: &str,
    user_email: Option<&str>,
    req: &CreateFavoriteRequest,
) -> Result<Favorite> {
    let pool = db.pool().await;
    let row = sqlx::query(
        r#"INSERT INTO user_favorites (user_id, user_email, question, sql_query)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, user_email, question, sql_query, created_at, updated_at"#,
    )
    .bind(user_id)
    .bind(user_email)
    .bind(&req.question)
    .bind(&req.sql_query)
    .fetch_one(&pool)
    .await?;
    favorite_from_row(&row)
}

/// All favorites for a user, newest first.
pub(crate) async fn list_favorites_inner(db: &PgBackend, user_id: &str) -> Result<Vec<Favorite>> {
    let pool = db.pool().await;
    let rows = sqlx::query(
        "SELECT id, user_id, user_email, question, sql_query, created_at, updated_at \
         FROM user_favorites WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;
    rows.iter().map(favorite_from_row).collect()
}

/// Partial update; untouched fields keep their value. The user_id predicate
/// doubles as the ownership check — a non-owner gets `None`, not an error.
pub(crate) async fn update_favorite_inner(
    db: &PgBackend,
    id: i64,
    user_id: &str,
    req: &UpdateFavoriteRequest,
) -> Result<Option<Favorite>> {
    let pool = db.pool().await;
    let row = sqlx::query(
        r#"UPDATE user_favorites SET
            question   = COALESCE($3, question),
            sql_query  = COALESCE($4, sql_query),
            updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, user_email, question, sql_query, created_at, updated_at"#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&req.question)
    .bind(&req.sql_query)
    .fetch_optional(&pool)
    .await?;
    row.as_ref().map(favorite_from_row).transpose()
}

pub(crate) async fn delete_favorite_inner(db: &PgBackend, id: i64, user_id: &str) -> Result<bool> {
    let pool = db.pool().await;
    let result = sqlx::query("DELETE FROM user_favorites WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn favorite_from_row(row: &PgRow) -> Result<Favorite> {
    Ok(Favorite {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        question: row.try_get("question")?,
        sql_query: row.try_get("sql_query")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgBackend {
    pub async fn create_favorite(
        &self,
        user_id: &str,
        user_email: Option<&str>,
        req: &CreateFavoriteRequest,
    ) -> Result<Favorite> {
        create_favorite_inner(self, user_id, user_email, req).await
    }

    pub async fn list_favorites(&self, user_id: &str) -> Result<Vec<Favorite>> {
        list_favorites_inner(self, user_id).await
    }

    pub async fn update_favorite(
        &self,
        id: i64,
        user_id: &str,
        req: &UpdateFavoriteRequest,
    ) -> Result<Option<Favorite>> {
        update_favorite_inner(self, id, user_id, req).await
    }

    pub async fn delete_favorite(&self, id: i64, user_id: &str) -> Result<bool> {
        delete_favorite_inner(self, id, user_id).await
    }
}
