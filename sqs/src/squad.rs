use crate::error::{Result, SqsError};
use crate::kv::{squad_received_key, DynIncrementer, DynKV};
use crate::queue::QueueManager;
use crate::types::{MessageId, UserId};

/// Last acknowledged message id per `(user, queue, squad)`.
///
/// Acks may arrive late and out of order from superseded client retry loops,
/// possibly through different nodes, so the stored id is only ever moved
/// forward with [`Incrementer::advance_to`](crate::kv::Incrementer::advance_to),
/// which is atomic on the shared store.
#[derive(Clone)]
pub struct SquadManager {
    meta: DynKV,
    incrementer: DynIncrementer,
    queue: QueueManager,
}

impl SquadManager {
    pub fn new(meta: DynKV, incrementer: DynIncrementer, queue: QueueManager) -> Self {
        Self { meta, incrementer, queue }
    }

    /// The queue's base id if nothing was acknowledged since the queue was created.
    pub async fn received_message_id(&self, user_id: UserId, queue: &str, squad: &str) -> Result<MessageId> {
        let base_id = self.queue.message_base_id(user_id, queue).await?;
        let key = squad_received_key(user_id, queue, squad);
        let received = match self.meta.get(&key).await {
            Ok(data) => data.trim().parse::<MessageId>().map_err(|e| SqsError::data_broken(key, e))?,
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(e),
        };
        Ok(received.max(base_id))
    }

    /// Returns `false` when `message_id` is not beyond the stored id, which is left unchanged.
    pub async fn report_received(
        &self,
        user_id: UserId,
        queue: &str,
        squad: &str,
        message_id: MessageId,
    ) -> Result<bool> {
        if message_id < 1 {
            return Err(SqsError::InvalidArgument(format!("message id must be positive, got {message_id}")));
        }
        let max_id = self.queue.message_max_id(user_id, queue).await?;
        if message_id > max_id {
            return Err(SqsError::InvalidArgument(format!(
                "message id {message_id} is beyond the queue high-water mark {max_id}"
            )));
        }

        let base_id = self.queue.message_base_id(user_id, queue).await?;
        let key = squad_received_key(user_id, queue, squad);
        if message_id <= base_id || !self.incrementer.advance_to(&key, message_id).await? {
            log::debug!("stale ack ignored, key: {key}, reported: {message_id}");
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backends;
    use crate::kv::queue_list_key;
    use crate::types::Queue;

    async fn manager() -> SquadManager {
        let backends = Backends::memory();
        backends.meta.put(&queue_list_key(1), "[]").await.unwrap();
        let qm = QueueManager::new(backends.meta.clone(), backends.incrementer.clone(), 8);
        qm.add(Queue::new(1, "q")).await.unwrap();
        qm.apply_message_id_range(1, "q", 10).await.unwrap();
        SquadManager::new(backends.meta, backends.incrementer, qm)
    }

    #[tokio::test]
    async fn stale_ack_does_not_regress() {
        let sm = manager().await;
        assert_eq!(sm.received_message_id(1, "q", "default").await.unwrap(), 0);
        assert!(sm.report_received(1, "q", "default", 5).await.unwrap());
        assert!(!sm.report_received(1, "q", "default", 3).await.unwrap());
        assert!(!sm.report_received(1, "q", "default", 5).await.unwrap());
        assert_eq!(sm.received_message_id(1, "q", "default").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn squads_are_independent() {
        let sm = manager().await;
        sm.report_received(1, "q", "blue", 7).await.unwrap();
        assert_eq!(sm.received_message_id(1, "q", "blue").await.unwrap(), 7);
        assert_eq!(sm.received_message_id(1, "q", "green").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ids_must_have_been_issued() {
        let sm = manager().await;
        assert_eq!(sm.report_received(1, "q", "default", 11).await.unwrap_err().status(), 400);
        assert_eq!(sm.report_received(1, "q", "default", 0).await.unwrap_err().status(), 400);
        assert!(sm.report_received(1, "missing", "default", 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reports_keep_the_maximum() {
        let sm = manager().await;
        let mut handles = Vec::new();
        for id in (1..=10).rev() {
            let sm = sm.clone();
            handles.push(tokio::spawn(async move { sm.report_received(1, "q", "default", id).await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(sm.received_message_id(1, "q", "default").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn re_created_queue_starts_after_its_base() {
        let sm = manager().await;
        sm.report_received(1, "q", "blue", 4).await.unwrap();
        sm.queue.remove(1, "q").await.unwrap();
        sm.queue.add(Queue::new(1, "q")).await.unwrap();

        assert_eq!(sm.received_message_id(1, "q", "blue").await.unwrap(), 10);
        assert_eq!(sm.received_message_id(1, "q", "green").await.unwrap(), 10);
        assert!(!sm.report_received(1, "q", "green", 9).await.unwrap());
        sm.queue.apply_message_id_range(1, "q", 1).await.unwrap();
        assert!(sm.report_received(1, "q", "green", 11).await.unwrap());
        assert_eq!(sm.received_message_id(1, "q", "green").await.unwrap(), 11);
    }
}
