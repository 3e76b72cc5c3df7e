//! Per-user queue directory and per-queue message id counters
//!
//! A user's queues are one JSON list under [`queue_list_key`], read and rewritten
//! as a whole on every change. Add and Remove for the same user are serialized
//! in process; across broker processes the last writer still wins.
//!
//! Removing a queue keeps its id counter. Creating it again records the counter
//! as the queue's base id, and ids up to the base are treated as gone, so the
//! new queue starts empty and never reissues an id.
use crate::error::{Result, SqsError};
use crate::kv::{queue_base_id_key, queue_list_key, queue_max_id_key, DynIncrementer, DynKV};
use crate::locks::KeyLocks;
use crate::types::{validate_name, MessageId, MessageIdRange, Queue, UserId};

#[derive(Clone)]
pub struct QueueManager {
    meta: DynKV,
    incrementer: DynIncrementer,
    max_queue_count: usize,
    max_apply_size: i64,
    locks: KeyLocks<UserId>,
}

impl QueueManager {
    pub const DEFAULT_MAX_APPLY_SIZE: i64 = 1000;

    pub fn new(meta: DynKV, incrementer: DynIncrementer, max_queue_count: usize) -> Self {
        Self {
            meta,
            incrementer,
            max_queue_count,
            max_apply_size: Self::DEFAULT_MAX_APPLY_SIZE,
            locks: KeyLocks::new(),
        }
    }

    #[inline]
    pub fn with_max_apply_size(mut self, max_apply_size: i64) -> Self {
        self.max_apply_size = max_apply_size.max(1);
        self
    }

    #[inline]
    pub fn max_queue_count(&self) -> usize {
        self.max_queue_count
    }

    pub async fn all(&self, user_id: UserId) -> Result<Vec<Queue>> {
        let key = queue_list_key(user_id);
        let data = self.meta.get(&key).await.map_err(|e| if e.is_not_found() { SqsError::UserNotFound } else { e })?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|e| SqsError::data_broken(key, e))
    }

    /// A list already above the quota is treated as inconsistent and no lookup is attempted.
    pub async fn one(&self, user_id: UserId, name: &str) -> Result<Queue> {
        let queues = self.all(user_id).await?;
        if queues.len() > self.max_queue_count {
            return Err(SqsError::CanNotCreateMoreQueue);
        }
        queues.into_iter().find(|q| q.name == name).ok_or(SqsError::QueueNotFound)
    }

    pub async fn add(&self, queue: Queue) -> Result<()> {
        validate_name("queue", &queue.name)?;
        let _guard = self.locks.lock(queue.user_id).await;

        let mut queues = self.all(queue.user_id).await?;
        if queues.iter().any(|q| q.name == queue.name) {
            return Err(SqsError::DuplicateQueue);
        }
        if queues.len() >= self.max_queue_count {
            return Err(SqsError::CanNotCreateMoreQueue);
        }

        self.init_message_max_id(queue.user_id, &queue.name, 0).await?;
        let base_id = self.message_max_id(queue.user_id, &queue.name).await?;
        self.meta.put(&queue_base_id_key(queue.user_id, &queue.name), &base_id.to_string()).await?;
        let (user_id, name) = (queue.user_id, queue.name.clone());
        queues.push(queue);
        self.save(user_id, &queues).await?;
        log::info!("queue added, user: {user_id}, name: {name}, base id: {base_id}, count: {}", queues.len());
        Ok(())
    }

    /// The message id counter is left in place, so a re-created queue never reissues ids.
    pub async fn remove(&self, user_id: UserId, name: &str) -> Result<()> {
        let _guard = self.locks.lock(user_id).await;

        let mut queues = self.all(user_id).await?;
        let idx = queues.iter().position(|q| q.name == name).ok_or(SqsError::QueueNotFound)?;
        queues.remove(idx);
        self.save(user_id, &queues).await?;
        log::info!("queue removed, user: {user_id}, name: {name}, count: {}", queues.len());
        Ok(())
    }

    #[inline]
    async fn save(&self, user_id: UserId, queues: &[Queue]) -> Result<()> {
        self.meta.put(&queue_list_key(user_id), &serde_json::to_string(queues)?).await
    }

    /// Reserves `size` ids and returns the new high-water mark, the end of the range.
    pub async fn apply_message_id_range(&self, user_id: UserId, name: &str, size: i64) -> Result<MessageId> {
        if size > self.max_apply_size {
            return Err(SqsError::InvalidArgument(format!(
                "at most {} message ids can be applied at once, got {size}",
                self.max_apply_size
            )));
        }
        self.incrementer.increment(&queue_max_id_key(user_id, name), size).await
    }

    #[inline]
    pub async fn apply_message_ids(&self, user_id: UserId, name: &str, size: i64) -> Result<MessageIdRange> {
        let end = self.apply_message_id_range(user_id, name, size).await?;
        MessageIdRange::from_end(end, size)
    }

    /// Writes the starting counter only if none exists yet.
    pub async fn init_message_max_id(&self, user_id: UserId, name: &str, id: MessageId) -> Result<()> {
        let key = queue_max_id_key(user_id, name);
        match self.meta.get(&key).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => self.meta.put(&key, &id.to_string()).await,
            Err(e) => Err(e),
        }
    }

    pub async fn message_max_id(&self, user_id: UserId, name: &str) -> Result<MessageId> {
        let key = queue_max_id_key(user_id, name);
        let data = self.meta.get(&key).await?;
        data.trim().parse::<MessageId>().map_err(|e| SqsError::data_broken(key, e))
    }

    /// Counter value when the queue was last created, 0 for a queue created only once.
    pub async fn message_base_id(&self, user_id: UserId, name: &str) -> Result<MessageId> {
        let key = queue_base_id_key(user_id, name);
        match self.meta.get(&key).await {
            Ok(data) => data.trim().parse::<MessageId>().map_err(|e| SqsError::data_broken(key, e)),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }
}
