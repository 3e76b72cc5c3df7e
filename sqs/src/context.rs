use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use sqs_conf::Settings;

use crate::storage::Storage;

#[derive(Clone)]
pub struct ServerContext {
    inner: Arc<ServerContextInner>,
}

pub struct ServerContextInner {
    pub settings: Settings,
    pub storage: Storage,
    /// Address this node registered in the cluster.
    pub node_addr: String,
}

impl Deref for ServerContext {
    type Target = ServerContextInner;
    #[inline]
    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerContext {{ node_addr: {} }}", self.node_addr)
    }
}

impl ServerContext {
    pub fn new(settings: Settings, storage: Storage) -> Self {
        let node_addr = settings.node.advertised_addr();
        Self { inner: Arc::new(ServerContextInner { settings, storage, node_addr }) }
    }

    /// Seeds the root user and registers this node in the cluster.
    pub async fn start(self) -> crate::Result<Self> {
        let root = self.storage.user.ensure_root(&self.settings.root).await?;
        log::info!("root user ready, id: {}", root.id);
        self.storage.node.register(&self.node_addr).await?;
        Ok(self)
    }

    pub async fn stop(&self) {
        if let Err(e) = self.storage.node.unregister(&self.node_addr).await {
            log::warn!("unregister node {} failed, {e}", self.node_addr);
        }
    }
}
