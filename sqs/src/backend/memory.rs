use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{Result, SqsError};
use crate::kv::{check_increment_size, parse_counter, Incrementer, KV};

type Map = Arc<DashMap<String, String>>;

/// In-process key-value store, used for tests and for the message store in development.
#[derive(Clone, Default)]
pub struct MemoryKV {
    map: Map,
}

impl MemoryKV {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl KV for MemoryKV {
    #[inline]
    async fn get(&self, key: &str) -> Result<String> {
        self.map.get(key).map(|v| v.value().clone()).ok_or(SqsError::DataNotFound)
    }

    #[inline]
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    #[inline]
    async fn delete(&self, key: &str) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }
}

/// Counter over a [`MemoryKV`], the map's entry lock makes each reservation atomic.
#[derive(Clone)]
pub struct MemoryIncrementer {
    map: Map,
}

impl MemoryIncrementer {
    #[inline]
    pub fn new(kv: &MemoryKV) -> Self {
        Self { map: kv.map.clone() }
    }
}

#[async_trait]
impl Incrementer for MemoryIncrementer {
    async fn increment(&self, key: &str, size: i64) -> Result<i64> {
        check_increment_size(size)?;
        let mut entry = self.map.entry(key.to_owned()).or_insert_with(|| "0".into());
        let current = parse_counter(key, Some(entry.value().as_bytes()))?;
        let end = current
            .checked_add(size)
            .ok_or_else(|| SqsError::internal(format!("counter overflow, key: {key}")))?;
        *entry.value_mut() = end.to_string();
        Ok(end)
    }

    async fn advance_to(&self, key: &str, value: i64) -> Result<bool> {
        let mut entry = self.map.entry(key.to_owned()).or_insert_with(|| "0".into());
        if parse_counter(key, Some(entry.value().as_bytes()))? >= value {
            return Ok(false);
        }
        *entry.value_mut() = value.to_string();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_put_delete() {
        let kv = MemoryKV::new();
        assert_eq!(kv.get("a").await, Err(SqsError::DataNotFound));
        kv.put("a", "1").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), "1");
        kv.put("a", "2").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), "2");
        kv.delete("a").await.unwrap();
        kv.delete("a").await.unwrap();
        assert!(kv.get("a").await.unwrap_err().is_not_found());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn increment_continues_from_stored_value() {
        let kv = MemoryKV::new();
        let inc = MemoryIncrementer::new(&kv);
        assert_eq!(inc.increment("c", 1).await.unwrap(), 1);
        kv.put("c", "100").await.unwrap();
        assert_eq!(inc.increment("c", 5).await.unwrap(), 105);
        assert_eq!(kv.get("c").await.unwrap(), "105");
        assert!(inc.increment("c", 0).await.is_err());

        kv.put("broken", "x").await.unwrap();
        assert!(matches!(inc.increment("broken", 1).await, Err(SqsError::DataBroken { .. })));
    }

    #[tokio::test]
    async fn advance_only_moves_forward() {
        let kv = MemoryKV::new();
        let inc = MemoryIncrementer::new(&kv);
        assert!(inc.advance_to("r", 5).await.unwrap());
        assert!(!inc.advance_to("r", 3).await.unwrap());
        assert!(!inc.advance_to("r", 5).await.unwrap());
        assert_eq!(kv.get("r").await.unwrap(), "5");
        kv.put("broken", "x").await.unwrap();
        assert!(matches!(inc.advance_to("broken", 1).await, Err(SqsError::DataBroken { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ranges_are_disjoint_and_contiguous() {
        let kv = MemoryKV::new();
        kv.put("ids", "10").await.unwrap();
        let inc = MemoryIncrementer::new(&kv);

        let mut handles = Vec::new();
        for i in 0..64i64 {
            let inc = inc.clone();
            let size = i % 5 + 1;
            handles.push(tokio::spawn(async move {
                let end = inc.increment("ids", size).await.unwrap();
                (end - size + 1, end)
            }));
        }
        let mut ranges = Vec::new();
        for h in handles {
            ranges.push(h.await.unwrap());
        }
        ranges.sort();

        let mut next = 11;
        for (begin, end) in ranges {
            assert_eq!(begin, next);
            next = end + 1;
        }
        let total: i64 = (0..64i64).map(|i| i % 5 + 1).sum();
        assert_eq!(next, 11 + total);
    }
}
