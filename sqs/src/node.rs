//! Cluster routing
//!
//! Serving nodes register their advertised address in a shared list. Each
//! `(user, queue, squad)` is pinned to one node on first application, chosen
//! round-robin, and keeps it while that node stays registered.
//!
//! Changes to the node list are serialized in process; nodes in different
//! processes sharing one store can still race on it at boot.
use uuid::Uuid;

use sqs_utils::timestamp_millis;

use crate::error::{Result, SqsError};
use crate::kv::{node_assign_seq_key, node_list_key, queue_node_key, session_key, DynIncrementer, DynKV};
use crate::locks::KeyLocks;
use crate::queue::QueueManager;
use crate::types::{squad_or_default, validate_name, Session, Token, UserId};

#[derive(Clone)]
pub struct NodeManager {
    cluster_meta: DynKV,
    incrementer: DynIncrementer,
    queue: QueueManager,
    locks: KeyLocks<String>,
}

impl NodeManager {
    pub fn new(cluster_meta: DynKV, incrementer: DynIncrementer, queue: QueueManager) -> Self {
        Self { cluster_meta, incrementer, queue, locks: KeyLocks::new() }
    }

    pub async fn nodes(&self) -> Result<Vec<String>> {
        let key = node_list_key();
        match self.cluster_meta.get(&key).await {
            Ok(data) => serde_json::from_str(&data).map_err(|e| SqsError::data_broken(key, e)),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn register(&self, addr: &str) -> Result<()> {
        let _guard = self.locks.lock(node_list_key()).await;
        let mut nodes = self.nodes().await?;
        if !nodes.iter().any(|n| n == addr) {
            nodes.push(addr.to_owned());
            self.cluster_meta.put(&node_list_key(), &serde_json::to_string(&nodes)?).await?;
        }
        log::info!("node registered, addr: {addr}, cluster size: {}", nodes.len());
        Ok(())
    }

    pub async fn unregister(&self, addr: &str) -> Result<()> {
        let _guard = self.locks.lock(node_list_key()).await;
        let mut nodes = self.nodes().await?;
        nodes.retain(|n| n != addr);
        self.cluster_meta.put(&node_list_key(), &serde_json::to_string(&nodes)?).await?;
        log::info!("node unregistered, addr: {addr}, cluster size: {}", nodes.len());
        Ok(())
    }

    /// Returns the serving node for the queue and squad together with a new session token.
    pub async fn apply_node(&self, user_id: UserId, queue_name: &str, squad_name: &str) -> Result<(String, Token)> {
        let squad_name = squad_or_default(squad_name);
        validate_name("squad", squad_name)?;
        self.queue.one(user_id, queue_name).await?;

        let node = self.assign(user_id, queue_name, squad_name).await?;
        let token = Uuid::new_v4().as_simple().to_string();
        let session = Session {
            user_id,
            queue_name: queue_name.to_owned(),
            squad_name: squad_name.to_owned(),
            node: node.clone(),
            created_at: timestamp_millis(),
        };
        self.cluster_meta.put(&session_key(&token), &serde_json::to_string(&session)?).await?;
        log::debug!("node applied, user: {user_id}, queue: {queue_name}, squad: {squad_name}, node: {node}");
        Ok((node, token))
    }

    async fn assign(&self, user_id: UserId, queue_name: &str, squad_name: &str) -> Result<String> {
        let nodes = self.nodes().await?;
        let key = queue_node_key(user_id, queue_name, squad_name);
        match self.cluster_meta.get(&key).await {
            Ok(node) if nodes.contains(&node) => return Ok(node),
            Ok(node) => log::info!("node {node} left the cluster, reassigning {key}"),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        if nodes.is_empty() {
            return Err(SqsError::Internal("no serving node registered".into()));
        }
        let seq = self.incrementer.increment(&node_assign_seq_key(), 1).await?;
        let node = nodes[((seq - 1) as usize) % nodes.len()].clone();
        self.cluster_meta.put(&key, &node).await?;
        Ok(node)
    }

    pub async fn session(&self, token: &str) -> Result<Session> {
        if token.is_empty() {
            return Err(SqsError::InvalidToken);
        }
        let key = session_key(token);
        let data =
            self.cluster_meta.get(&key).await.map_err(|e| if e.is_not_found() { SqsError::InvalidToken } else { e })?;
        serde_json::from_str(&data).map_err(|e| SqsError::data_broken(key, e))
    }
}
