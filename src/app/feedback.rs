use std::sync::Arc;

use anyhow::Result;
use rand::Rng;

use crate::domain::feedback::{Feedback, FeedbackFilter, FeedbackPatch, NewFeedback};
use crate::domain::page::{Page, PageRequest};
use crate::infra::store::FeedbackStore;

pub const SEED_ITEMS: usize = 65;

#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    pub async fn submit(&self, new: NewFeedback) -> Result<Feedback> {
        self.store.insert(new).await
    }

    pub async fn list_reviewed(&self, page: PageRequest) -> Result<Page<Feedback>> {
        self.store.list(&FeedbackFilter::reviewed_only(), page).await
    }

    pub async fn list_all(&self, filter: &FeedbackFilter, page: PageRequest) -> Result<Page<Feedback>> {
        self.store.list(filter, page).await
    }

    pub async fn update(&self, id: i64, patch: &FeedbackPatch) -> Result<Option<Feedback>> {
        if patch.is_empty() {
            return self.store.get(id).await;
        }
        self.store.patch(id, patch).await
    }

    pub async fn clear(&self) -> Result<u64> {
        self.store.delete_all().await
    }

    /// Replaces all feedback with demo items; roughly three in five are
    /// approved. Returns how many were created.
    pub async fn seed(&self, count: usize) -> Result<usize> {
        let removed = self.clear().await?;
        tracing::info!(removed, "existing feedback cleared");

        for i in 1..=count {
            let feedback = self
                .store
                .insert(NewFeedback {
                    title: format!("Feedback Title {}", i),
                    content: format!(
                        "This is the detailed content for feedback item number {}. \
                         It provides some example text to simulate real user input.",
                        i
                    ),
                })
                .await?;

            let approve = rand::thread_rng().gen_ratio(3, 5);
            if approve {
                let patch = FeedbackPatch {
                    is_reviewed: Some(true),
                    ..Default::default()
                };
                self.store.patch(feedback.id, &patch).await?;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::MemoryFeedbackStore;

    fn service() -> FeedbackService {
        FeedbackService::new(Arc::new(MemoryFeedbackStore::new()))
    }

    #[tokio::test]
    async fn empty_patch_returns_current_record() {
        let service = service();
        let created = service
            .submit(NewFeedback {
                title: "Bug".into(),
                content: "App crashes on save".into(),
            })
            .await
            .unwrap();

        let unchanged = service
            .update(created.id, &FeedbackPatch::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged, created);
        assert!(service
            .update(999, &FeedbackPatch::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn seeded_items_keep_review_invariant() {
        let service = service();
        let created = service.seed(20).await.unwrap();
        assert_eq!(created, 20);

        let all = service
            .list_all(&FeedbackFilter::default(), PageRequest::new(1, 100))
            .await
            .unwrap();
        assert_eq!(all.total, 20);
        for item in &all.items {
            assert_eq!(item.is_reviewed, item.reviewed_at.is_some());
        }

        let reviewed = service.list_reviewed(PageRequest::new(1, 100)).await.unwrap();
        assert!(reviewed.items.iter().all(|item| item.is_reviewed));
    }
}
