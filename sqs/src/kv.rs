//! Storage capability contract
//!
//! Everything durable goes through two small traits:
//! - [`KV`]: `get` / `put` / `delete` of string values
//! - [`Incrementer`]: atomic reservation of consecutive integer ranges per key
//!
//! Backends live in [`crate::backend`]; the rest of the crate only sees
//! [`DynKV`] and [`DynIncrementer`].
//!
//! Counters are stored as decimal strings, so a counter key written with
//! [`KV::put`] can be advanced by [`Incrementer::increment`] or
//! [`Incrementer::advance_to`] on the same store.
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, SqsError};
use crate::types::UserId;

pub type DynKV = Arc<dyn KV>;
pub type DynIncrementer = Arc<dyn Incrementer>;

#[async_trait]
pub trait KV: Sync + Send {
    ///Fails with `SqsError::DataNotFound` if the key is absent.
    async fn get(&self, key: &str) -> Result<String>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    ///Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
pub trait Incrementer: Sync + Send {
    ///Atomically advances the counter stored under `key` by `size` and returns the new value,
    ///the caller owns the range `[end - size + 1, end]`. A missing counter starts at 0.
    async fn increment(&self, key: &str, size: i64) -> Result<i64>;

    ///Stores `value` only if it is greater than the counter under `key` (missing is 0),
    ///as one atomic step. Returns whether the counter moved. `value` must not be negative.
    async fn advance_to(&self, key: &str, value: i64) -> Result<bool>;
}

#[inline]
pub(crate) fn parse_counter(key: &str, val: Option<&[u8]>) -> Result<i64> {
    match val {
        None => Ok(0),
        Some(v) => std::str::from_utf8(v)
            .map_err(|e| SqsError::data_broken(key, e))?
            .trim()
            .parse::<i64>()
            .map_err(|e| SqsError::data_broken(key, e)),
    }
}

#[inline]
pub(crate) fn check_increment_size(size: i64) -> Result<()> {
    if size < 1 {
        return Err(SqsError::InvalidArgument(format!("increment size must be positive, got {size}")));
    }
    Ok(())
}

#[inline]
pub fn queue_list_key(user_id: UserId) -> String {
    format!("sqs.queue.list.{user_id}")
}

#[inline]
pub fn queue_max_id_key(user_id: UserId, queue_name: &str) -> String {
    format!("sqs.queue.max_id.{user_id}.{queue_name}")
}

///Counter value when the queue was last created, ids up to it belong to an earlier incarnation.
#[inline]
pub fn queue_base_id_key(user_id: UserId, queue_name: &str) -> String {
    format!("sqs.queue.base_id.{user_id}.{queue_name}")
}

#[inline]
pub fn message_key(user_id: UserId, queue_name: &str, message_id: i64) -> String {
    format!("sqs.message.{user_id}.{queue_name}.{message_id}")
}

#[inline]
pub fn squad_received_key(user_id: UserId, queue_name: &str, squad_name: &str) -> String {
    format!("sqs.squad.received.{user_id}.{queue_name}.{squad_name}")
}

#[inline]
pub fn session_key(token: &str) -> String {
    format!("sqs.session.{token}")
}

#[inline]
pub fn node_list_key() -> String {
    "sqs.cluster.nodes".into()
}

#[inline]
pub fn node_assign_seq_key() -> String {
    "sqs.cluster.assign_seq".into()
}

#[inline]
pub fn queue_node_key(user_id: UserId, queue_name: &str, squad_name: &str) -> String {
    format!("sqs.cluster.queue_node.{user_id}.{queue_name}.{squad_name}")
}

#[inline]
pub fn user_key(access_key: &str) -> String {
    format!("sqs.user.{access_key}")
}

#[inline]
pub fn user_max_id_key() -> String {
    "sqs.user.max_id".into()
}
