use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use sqs_conf::RedisConfig;

use crate::error::{Result, SqsError};
use crate::kv::{check_increment_size, Incrementer, KV};

/// Shared store for multi-node deployments, keys are prefixed with `prefix:`.
#[derive(Clone)]
pub struct RedisKV {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisKV {
    pub async fn connect(cfg: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(cfg.url.as_str())?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        log::info!("redis connected, url: {}, prefix: {}", cfg.url, cfg.prefix);
        Ok(Self { conn, prefix: cfg.prefix.clone() })
    }

    #[inline]
    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }
}

#[async_trait]
impl KV for RedisKV {
    #[inline]
    async fn get(&self, key: &str) -> Result<String> {
        let mut conn = self.conn.clone();
        let val: Option<String> = conn.get(self.key(key)).await?;
        val.ok_or(SqsError::DataNotFound)
    }

    #[inline]
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.key(key), value).await?;
        Ok(())
    }

    #[inline]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(key)).await?;
        Ok(())
    }
}

//Counters hold canonical non-negative decimals, so comparing by length then
//bytes orders them without going through Lua's floating point numbers.
const ADVANCE_SCRIPT: &str = r"
local cur = redis.call('GET', KEYS[1])
if cur and not string.match(cur, '^%d+$') then
  return redis.error_reply('ERR value is not an integer')
end
if cur and (#cur > #ARGV[1] or (#cur == #ARGV[1] and cur >= ARGV[1])) then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1])
return 1
";

/// `INCRBY` based counter, atomic across every broker process sharing the server.
#[derive(Clone)]
pub struct RedisIncrementer {
    kv: RedisKV,
    advance: redis::Script,
}

impl RedisIncrementer {
    #[inline]
    pub fn new(kv: &RedisKV) -> Self {
        Self { kv: kv.clone(), advance: redis::Script::new(ADVANCE_SCRIPT) }
    }
}

fn counter_error(key: &str, e: redis::RedisError) -> SqsError {
    if e.to_string().contains("not an integer") {
        SqsError::data_broken(key, e)
    } else {
        SqsError::from(e)
    }
}

#[async_trait]
impl Incrementer for RedisIncrementer {
    async fn increment(&self, key: &str, size: i64) -> Result<i64> {
        check_increment_size(size)?;
        let mut conn = self.kv.conn.clone();
        conn.incr(self.kv.key(key), size).await.map_err(|e| counter_error(key, e))
    }

    async fn advance_to(&self, key: &str, value: i64) -> Result<bool> {
        let mut conn = self.kv.conn.clone();
        let moved: i64 = self
            .advance
            .key(self.kv.key(key))
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| counter_error(key, e))?;
        Ok(moved == 1)
    }
}
