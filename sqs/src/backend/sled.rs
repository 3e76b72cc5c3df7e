use async_trait::async_trait;

use crate::error::{Result, SqsError};
use crate::kv::{check_increment_size, parse_counter, Incrementer, KV};

const TREE_NAME: &[u8] = b"sqs";

/// Embedded durable store for single node deployments.
#[derive(Clone)]
pub struct SledKV {
    tree: sled::Tree,
}

impl SledKV {
    #[inline]
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::Config::new().path(path).open()?;
        Self::from_db(&db)
    }

    ///Store removed from disk once dropped.
    #[inline]
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    #[inline]
    fn from_db(db: &sled::Db) -> Result<Self> {
        Ok(Self { tree: db.open_tree(TREE_NAME)? })
    }
}

#[async_trait]
impl KV for SledKV {
    #[inline]
    async fn get(&self, key: &str) -> Result<String> {
        match self.tree.get(key.as_bytes())? {
            None => Err(SqsError::DataNotFound),
            Some(v) => String::from_utf8(v.to_vec()).map_err(|e| SqsError::data_broken(key, e)),
        }
    }

    #[inline]
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    #[inline]
    async fn delete(&self, key: &str) -> Result<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }
}

/// Counter over a [`SledKV`] tree, advanced with compare-and-swap.
#[derive(Clone)]
pub struct SledIncrementer {
    tree: sled::Tree,
}

impl SledIncrementer {
    #[inline]
    pub fn new(kv: &SledKV) -> Self {
        Self { tree: kv.tree.clone() }
    }
}

#[async_trait]
impl Incrementer for SledIncrementer {
    async fn increment(&self, key: &str, size: i64) -> Result<i64> {
        check_increment_size(size)?;
        loop {
            let current = self.tree.get(key.as_bytes())?;
            let begin = parse_counter(key, current.as_deref())?;
            let end = begin
                .checked_add(size)
                .ok_or_else(|| SqsError::internal(format!("counter overflow, key: {key}")))?;
            match self.tree.compare_and_swap(key.as_bytes(), current, Some(end.to_string().into_bytes()))? {
                Ok(()) => return Ok(end),
                Err(e) => {
                    log::trace!("increment conflict on {key}, retry, {e:?}");
                    continue;
                }
            }
        }
    }

    async fn advance_to(&self, key: &str, value: i64) -> Result<bool> {
        loop {
            let current = self.tree.get(key.as_bytes())?;
            if parse_counter(key, current.as_deref())? >= value {
                return Ok(false);
            }
            match self.tree.compare_and_swap(key.as_bytes(), current, Some(value.to_string().into_bytes()))? {
                Ok(()) => return Ok(true),
                Err(e) => {
                    log::trace!("advance conflict on {key}, retry, {e:?}");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_put_delete() {
        let kv = SledKV::temporary().unwrap();
        assert_eq!(kv.get("a").await, Err(SqsError::DataNotFound));
        kv.put("a", "[]").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), "[]");
        kv.delete("a").await.unwrap();
        assert!(kv.get("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments() {
        let kv = SledKV::temporary().unwrap();
        let inc = SledIncrementer::new(&kv);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let inc = inc.clone();
            handles.push(tokio::spawn(async move { inc.increment("ids", 3).await.unwrap() }));
        }
        let mut ends = Vec::new();
        for h in handles {
            ends.push(h.await.unwrap());
        }
        ends.sort();
        let expected: Vec<i64> = (1..=32).map(|i| i * 3).collect();
        assert_eq!(ends, expected);
        assert_eq!(kv.get("ids").await.unwrap(), "96");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_advances_keep_the_maximum() {
        let kv = SledKV::temporary().unwrap();
        let inc = SledIncrementer::new(&kv);

        let mut handles = Vec::new();
        for v in (1..=32).rev() {
            let inc = inc.clone();
            handles.push(tokio::spawn(async move { inc.advance_to("received", v).await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(kv.get("received").await.unwrap(), "32");
        assert!(!inc.advance_to("received", 31).await.unwrap());
    }
}
