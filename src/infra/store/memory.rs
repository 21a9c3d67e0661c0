use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{AccountStore, FeedbackStore};
use crate::domain::account::{Account, NewAccount};
use crate::domain::feedback::{Feedback, FeedbackFilter, FeedbackPatch, NewFeedback};
use crate::domain::page::{Page, PageRequest};

#[derive(Default)]
struct FeedbackTable {
    next_id: i64,
    rows: BTreeMap<i64, Feedback>,
}

#[derive(Clone, Default)]
pub struct MemoryFeedbackStore {
    inner: Arc<RwLock<FeedbackTable>>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn insert(&self, new: NewFeedback) -> Result<Feedback> {
        let mut table = self.inner.write().await;
        table.next_id += 1;
        let feedback = Feedback {
            id: table.next_id,
            title: new.title,
            content: new.content,
            is_reviewed: false,
            created_at: OffsetDateTime::now_utc(),
            reviewed_at: None,
        };
        table.rows.insert(feedback.id, feedback.clone());
        Ok(feedback)
    }

    async fn get(&self, id: i64) -> Result<Option<Feedback>> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn list(&self, filter: &FeedbackFilter, page: PageRequest) -> Result<Page<Feedback>> {
        let table = self.inner.read().await;
        let mut matched: Vec<&Feedback> = table
            .rows
            .values()
            .filter(|feedback| filter.matches(feedback))
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    async fn patch(&self, id: i64, patch: &FeedbackPatch) -> Result<Option<Feedback>> {
        let mut table = self.inner.write().await;
        let Some(feedback) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        feedback.apply(patch, OffsetDateTime::now_utc());
        Ok(Some(feedback.clone()))
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut table = self.inner.write().await;
        let removed = table.rows.len() as u64;
        table.rows.clear();
        Ok(removed)
    }
}

#[derive(Default)]
struct AccountTable {
    next_id: i64,
    rows: BTreeMap<i64, Account>,
}

#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    inner: Arc<RwLock<AccountTable>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn upsert(&self, new: NewAccount) -> Result<Account> {
        let mut table = self.inner.write().await;
        if let Some(existing) = table
            .rows
            .values_mut()
            .find(|account| account.username == new.username)
        {
            existing.password_hash = new.password_hash;
            existing.is_active = new.is_active;
            existing.is_staff = new.is_staff;
            return Ok(existing.clone());
        }

        table.next_id += 1;
        let account = Account {
            id: table.next_id,
            username: new.username,
            password_hash: new.password_hash,
            is_active: new.is_active,
            is_staff: new.is_staff,
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.insert(account.id, account.clone());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(title: &str, content: &str) -> NewFeedback {
        NewFeedback {
            title: title.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn inserts_are_unreviewed_with_sequential_ids() {
        let store = MemoryFeedbackStore::new();
        let first = store.insert(submission("a", "b")).await.unwrap();
        let second = store.insert(submission("c", "d")).await.unwrap();

        assert_eq!((first.id, second.id), (1, 2));
        assert!(!first.is_reviewed);
        assert!(first.reviewed_at.is_none());
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_pages() {
        let store = MemoryFeedbackStore::new();
        for i in 0..5 {
            store
                .insert(submission(&format!("t{}", i), "body"))
                .await
                .unwrap();
        }

        let page = store
            .list(&FeedbackFilter::default(), PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<i64> = page.items.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![5, 4]);

        let last = store
            .list(&FeedbackFilter::default(), PageRequest::new(3, 2))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].id, 1);
    }

    #[tokio::test]
    async fn patch_unknown_id_returns_none() {
        let store = MemoryFeedbackStore::new();
        let patched = store
            .patch(42, &FeedbackPatch::default())
            .await
            .unwrap();
        assert!(patched.is_none());
    }

    #[tokio::test]
    async fn delete_all_reports_count() {
        let store = MemoryFeedbackStore::new();
        store.insert(submission("a", "b")).await.unwrap();
        store.insert(submission("c", "d")).await.unwrap();
        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_updates_existing_username() {
        let store = MemoryAccountStore::new();
        let created = store
            .upsert(NewAccount {
                username: "admin".into(),
                password_hash: "h1".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();
        let updated = store
            .upsert(NewAccount {
                username: "admin".into(),
                password_hash: "h2".into(),
                is_active: true,
                is_staff: true,
            })
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert!(updated.is_staff);
        assert_eq!(updated.password_hash, "h2");
    }
}
