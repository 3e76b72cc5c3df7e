use crate::error::{Result, SqsError};
use crate::kv::{message_key, DynKV};
use crate::queue::QueueManager;
use crate::squad::SquadManager;
use crate::types::{Message, UserId};

/// Message bodies keyed by `(user, queue, id)`.
///
/// Pull is a read of the ids after the squad's last acknowledged id, it does
/// not consume anything. The same batch is delivered again until an ack moves
/// the squad forward, which makes delivery at-least-once.
#[derive(Clone)]
pub struct MessageManager {
    messages: DynKV,
    queue: QueueManager,
    squad: SquadManager,
    batch_size: usize,
    scan_max: usize,
}

impl MessageManager {
    pub fn new(
        messages: DynKV,
        queue: QueueManager,
        squad: SquadManager,
        batch_size: usize,
        scan_max: usize,
    ) -> Self {
        Self { messages, queue, squad, batch_size: batch_size.max(1), scan_max: scan_max.max(1) }
    }

    /// Stores a message under an id previously issued for the queue. Pushing the
    /// same id again overwrites the content.
    pub async fn push(&self, user_id: UserId, queue: &str, msg: &Message) -> Result<()> {
        let max_id = self.queue.message_max_id(user_id, queue).await?;
        if msg.message_id < 1 || msg.message_id > max_id {
            return Err(SqsError::InvalidArgument(format!(
                "message id {} was not issued, high-water mark is {max_id}",
                msg.message_id
            )));
        }
        let base_id = self.queue.message_base_id(user_id, queue).await?;
        if msg.message_id <= base_id {
            return Err(SqsError::InvalidArgument(format!(
                "message id {} was issued before the queue was created again at {base_id}",
                msg.message_id
            )));
        }
        let key = message_key(user_id, queue, msg.message_id);
        self.messages.put(&key, &serde_json::to_string(msg)?).await?;
        log::trace!("message pushed, key: {key}");
        Ok(())
    }

    /// Ids that were issued but never pushed are skipped.
    pub async fn pull(&self, user_id: UserId, queue: &str, squad: &str) -> Result<Vec<Message>> {
        let received = self.squad.received_message_id(user_id, queue, squad).await?;
        let max_id = self.queue.message_max_id(user_id, queue).await?;

        let mut msgs = Vec::new();
        let mut next = received.checked_add(1);
        let mut scanned = 0;
        while let Some(id) = next.filter(|id| *id <= max_id) {
            if msgs.len() >= self.batch_size || scanned >= self.scan_max {
                break;
            }
            let key = message_key(user_id, queue, id);
            match self.messages.get(&key).await {
                Ok(data) => msgs.push(serde_json::from_str(&data).map_err(|e| SqsError::data_broken(key, e))?),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            next = id.checked_add(1);
            scanned += 1;
        }
        log::debug!(
            "pull, user: {user_id}, queue: {queue}, squad: {squad}, after: {received}, scanned: {scanned}, got: {}",
            msgs.len()
        );
        Ok(msgs)
    }
}
