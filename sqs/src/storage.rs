use std::ops::Deref;
use std::sync::Arc;

use sqs_conf::Settings;

use crate::backend::Backends;
use crate::error::Result;
use crate::message::MessageManager;
use crate::node::NodeManager;
use crate::queue::QueueManager;
use crate::squad::SquadManager;
use crate::user::UserManager;

/// Owns the store handles and every manager built on them. Built once at boot
/// and passed to whoever needs it.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

pub struct StorageInner {
    pub backends: Backends,
    pub queue: QueueManager,
    pub squad: SquadManager,
    pub message: MessageManager,
    pub node: NodeManager,
    pub user: UserManager,
}

impl Deref for Storage {
    type Target = StorageInner;
    #[inline]
    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Storage {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let backends = Backends::from_env(settings.env, &settings.storage).await?;
        Ok(Self::with_backends(backends, settings))
    }

    pub fn with_backends(backends: Backends, settings: &Settings) -> Self {
        let queue =
            QueueManager::new(backends.meta.clone(), backends.incrementer.clone(), settings.max_queue_count_per_user)
                .with_max_apply_size(settings.message.max_apply_size);
        let squad = SquadManager::new(backends.meta.clone(), backends.incrementer.clone(), queue.clone());
        let message = MessageManager::new(
            backends.message.clone(),
            queue.clone(),
            squad.clone(),
            settings.message.pull_batch_size,
            settings.message.pull_scan_max,
        );
        let node = NodeManager::new(backends.cluster_meta.clone(), backends.incrementer.clone(), queue.clone());
        let user = UserManager::new(backends.meta.clone(), backends.incrementer.clone());
        Self { inner: Arc::new(StorageInner { backends, queue, squad, message, node, user }) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Queue};

    #[tokio::test]
    async fn managers_share_one_store() {
        let settings = Settings::for_test();
        let storage = Storage::new(&settings).await.unwrap();
        let root = storage.user.ensure_root(&settings.root).await.unwrap();
        storage.queue.add(Queue::new(root.id, "q")).await.unwrap();
        storage.node.register("127.0.0.1:5446").await.unwrap();

        let (_, token) = storage.node.apply_node(root.id, "q", "").await.unwrap();
        let session = storage.node.session(&token).await.unwrap();
        let range = storage.queue.apply_message_ids(session.user_id, &session.queue_name, 1).await.unwrap();
        storage.message.push(session.user_id, "q", &Message::new(range.end, "hello")).await.unwrap();
        let msgs = storage.message.pull(session.user_id, "q", &session.squad_name).await.unwrap();
        assert_eq!(msgs, vec![Message::new(1, "hello")]);
    }
}
