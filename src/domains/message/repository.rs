use crate::domains::message::types::Message;
use crate::errors::DomainResult;
use crate::store::{keys, RecordStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Chat history of one consultation, oldest first.
    async fn for_consultation(&self, consultation_id: &str) -> DomainResult<Vec<Message>>;

    /// Append one message to its consultation's history.
    async fn append(&self, message: &Message) -> DomainResult<()>;

    /// Replace the history wholesale (used to seed the first exchange).
    async fn replace_thread(
        &self,
        consultation_id: &str,
        messages: &[Message],
    ) -> DomainResult<()>;

    /// Drop a consultation's entire history.
    async fn remove_thread(&self, consultation_id: &str) -> DomainResult<()>;
}

/// Record-store implementation of MessageRepository
pub struct LocalMessageRepository {
    store: Arc<RecordStore>,
}

impl LocalMessageRepository {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageRepository for LocalMessageRepository {
    async fn for_consultation(&self, consultation_id: &str) -> DomainResult<Vec<Message>> {
        self.store.read_list(&keys::messages(consultation_id)).await
    }

    async fn append(&self, message: &Message) -> DomainResult<()> {
        let key = keys::messages(&message.consultation_id);
        let mut messages: Vec<Message> = self.store.read_list(&key).await?;
        messages.push(message.clone());
        self.store.write_list(&key, &messages).await
    }

    async fn replace_thread(
        &self,
        consultation_id: &str,
        messages: &[Message],
    ) -> DomainResult<()> {
        self.store
            .write_list(&keys::messages(consultation_id), messages)
            .await
    }

    async fn remove_thread(&self, consultation_id: &str) -> DomainResult<()> {
        self.store.remove(&keys::messages(consultation_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_message, test_store};

    #[tokio::test]
    async fn test_append_keeps_order() {
        let store = test_store().await;
        let repo = LocalMessageRepository::new(store);

        repo.append(&sample_message("m1", "c1", "d1", "hello"))
            .await
            .unwrap();
        repo.append(&sample_message("m2", "c1", "v1", "hi doctor"))
            .await
            .unwrap();

        let messages = repo.for_consultation("c1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[1].id, "m2");
    }

    #[tokio::test]
    async fn test_remove_thread() {
        let store = test_store().await;
        let repo = LocalMessageRepository::new(store);
        repo.append(&sample_message("m1", "c1", "d1", "hello"))
            .await
            .unwrap();

        repo.remove_thread("c1").await.unwrap();
        assert!(repo.for_consultation("c1").await.unwrap().is_empty());
    }
}
