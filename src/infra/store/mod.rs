//! Storage contracts for feedback and identity records.
//!
//! Production runs on Postgres; the in-memory backends serve local
//! development and the test suite.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::account::{Account, NewAccount};
use crate::domain::feedback::{Feedback, FeedbackFilter, FeedbackPatch, NewFeedback};
use crate::domain::page::{Page, PageRequest};

pub use memory::{MemoryAccountStore, MemoryFeedbackStore};
pub use postgres::{PgAccountStore, PgFeedbackStore};

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Inserts an unreviewed record; id and `created_at` are assigned here.
    async fn insert(&self, new: NewFeedback) -> Result<Feedback>;

    async fn get(&self, id: i64) -> Result<Option<Feedback>>;

    /// Matching records, newest first, with the total match count.
    async fn list(&self, filter: &FeedbackFilter, page: PageRequest) -> Result<Page<Feedback>>;

    /// Applies `patch` to one record. Returns `None` when the id is unknown.
    async fn patch(&self, id: i64, patch: &FeedbackPatch) -> Result<Option<Feedback>>;

    /// Removes every record and returns how many were deleted.
    async fn delete_all(&self) -> Result<u64>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>>;

    /// Creates the account, or overwrites password and flags when the
    /// username already exists.
    async fn upsert(&self, new: NewAccount) -> Result<Account>;
}

pub(crate) fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like_pattern;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like_pattern("100%_a\\b"), "100\\%\\_a\\\\b");
        assert_eq!(escape_like_pattern("crash"), "crash");
    }
}
