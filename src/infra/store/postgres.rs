use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use time::OffsetDateTime;

use super::{escape_like_pattern, AccountStore, FeedbackStore};
use crate::domain::account::{Account, NewAccount};
use crate::domain::feedback::{Feedback, FeedbackFilter, FeedbackPatch, NewFeedback};
use crate::domain::page::{Page, PageRequest};
use crate::infra::db::Db;

const FEEDBACK_COLUMNS: &str = "id, title, content, is_reviewed, created_at, reviewed_at";
const ACCOUNT_COLUMNS: &str = "id, username, password_hash, is_active, is_staff, created_at";

#[derive(Clone)]
pub struct PgFeedbackStore {
    db: Db,
}

impl PgFeedbackStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn feedback_from_row(row: &PgRow) -> Feedback {
    Feedback {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        is_reviewed: row.get("is_reviewed"),
        created_at: row.get("created_at"),
        reviewed_at: row.get("reviewed_at"),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &FeedbackFilter) {
    builder.push(" WHERE TRUE");
    if let Some(reviewed) = filter.is_reviewed {
        builder.push(" AND is_reviewed = ").push_bind(reviewed);
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like_pattern(term));
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR content ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn insert(&self, new: NewFeedback) -> Result<Feedback> {
        let row = sqlx::query(&format!(
            "INSERT INTO feedback (title, content) VALUES ($1, $2) RETURNING {}",
            FEEDBACK_COLUMNS
        ))
        .bind(new.title)
        .bind(new.content)
        .fetch_one(self.db.pool())
        .await?;

        Ok(feedback_from_row(&row))
    }

    async fn get(&self, id: i64) -> Result<Option<Feedback>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM feedback WHERE id = $1",
            FEEDBACK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(feedback_from_row))
    }

    async fn list(&self, filter: &FeedbackFilter, page: PageRequest) -> Result<Page<Feedback>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM feedback");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM feedback",
            FEEDBACK_COLUMNS
        ));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select.build().fetch_all(self.db.pool()).await?;
        let items = rows.iter().map(feedback_from_row).collect();

        Ok(Page { items, total })
    }

    async fn patch(&self, id: i64, patch: &FeedbackPatch) -> Result<Option<Feedback>> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {} FROM feedback WHERE id = $1 FOR UPDATE",
            FEEDBACK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut feedback = feedback_from_row(&row);
        feedback.apply(patch, OffsetDateTime::now_utc());

        sqlx::query(
            "UPDATE feedback \
             SET title = $2, content = $3, is_reviewed = $4, reviewed_at = $5 \
             WHERE id = $1",
        )
        .bind(feedback.id)
        .bind(&feedback.title)
        .bind(&feedback.content)
        .bind(feedback.is_reviewed)
        .bind(feedback.reviewed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(feedback))
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM feedback")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: Db,
}

impl PgAccountStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        is_staff: row.get("is_staff"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE username = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn upsert(&self, new: NewAccount) -> Result<Account> {
        let row = sqlx::query(&format!(
            "INSERT INTO accounts (username, password_hash, is_active, is_staff) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (username) DO UPDATE \
             SET password_hash = EXCLUDED.password_hash, \
                 is_active = EXCLUDED.is_active, \
                 is_staff = EXCLUDED.is_staff \
             RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.is_active)
        .bind(new.is_staff)
        .fetch_one(self.db.pool())
        .await?;

        Ok(account_from_row(&row))
    }
}
