use sqs_conf::Root;

use crate::error::{Result, SqsError};
use crate::kv::{queue_list_key, user_key, user_max_id_key, DynIncrementer, DynKV};
use crate::types::{User, UserAuth, UserId};

#[derive(Clone)]
pub struct UserManager {
    meta: DynKV,
    incrementer: DynIncrementer,
}

impl UserManager {
    pub fn new(meta: DynKV, incrementer: DynIncrementer) -> Self {
        Self { meta, incrementer }
    }

    async fn get(&self, access_key: &str) -> Result<User> {
        let key = user_key(access_key);
        let data = self.meta.get(&key).await.map_err(|e| if e.is_not_found() { SqsError::UserNotFound } else { e })?;
        serde_json::from_str(&data).map_err(|e| SqsError::data_broken(key, e))
    }

    /// Creates a user with a fresh id and an empty queue list.
    pub async fn register(&self, auth: &UserAuth) -> Result<User> {
        if auth.access_key.is_empty() || auth.secret_key.is_empty() {
            return Err(SqsError::InvalidArgument("access key and secret key are required".into()));
        }
        match self.get(&auth.access_key).await {
            Ok(_) => {
                return Err(SqsError::InvalidArgument(format!("access key '{}' already registered", auth.access_key)))
            }
            Err(SqsError::UserNotFound) => {}
            Err(e) => return Err(e),
        }

        let id = self.incrementer.increment(&user_max_id_key(), 1).await?;
        let user = User { id, access_key: auth.access_key.clone(), secret_key: auth.secret_key.clone() };
        self.meta.put(&queue_list_key(id), "[]").await?;
        self.meta.put(&user_key(&user.access_key), &serde_json::to_string(&user)?).await?;
        log::info!("user registered, id: {id}, access_key: {}", user.access_key);
        Ok(user)
    }

    pub async fn authenticate(&self, auth: &UserAuth) -> Result<UserId> {
        let user = self.get(&auth.access_key).await?;
        if user.secret_key != auth.secret_key {
            return Err(SqsError::Unauthorized);
        }
        Ok(user.id)
    }

    /// Creates the configured root user on first boot, later boots only sync its secret.
    pub async fn ensure_root(&self, root: &Root) -> Result<User> {
        let auth = UserAuth { access_key: root.access_key.clone(), secret_key: root.secret_key.clone() };
        match self.get(&auth.access_key).await {
            Ok(mut user) => {
                if user.secret_key != auth.secret_key {
                    log::warn!("root secret key changed in configuration, updating");
                    user.secret_key = auth.secret_key;
                    self.meta.put(&user_key(&user.access_key), &serde_json::to_string(&user)?).await?;
                }
                Ok(user)
            }
            Err(SqsError::UserNotFound) => self.register(&auth).await,
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backends;

    fn auth(a: &str, s: &str) -> UserAuth {
        UserAuth { access_key: a.into(), secret_key: s.into() }
    }

    #[tokio::test]
    async fn register_and_authenticate() {
        let backends = Backends::memory();
        let um = UserManager::new(backends.meta.clone(), backends.incrementer.clone());

        let alice = um.register(&auth("alice", "s1")).await.unwrap();
        let bob = um.register(&auth("bob", "s2")).await.unwrap();
        assert_ne!(alice.id, bob.id);
        assert_eq!(backends.meta.get(&queue_list_key(alice.id)).await.unwrap(), "[]");

        assert_eq!(um.authenticate(&auth("alice", "s1")).await.unwrap(), alice.id);
        assert_eq!(um.authenticate(&auth("alice", "bad")).await, Err(SqsError::Unauthorized));
        assert_eq!(um.authenticate(&auth("carol", "s")).await, Err(SqsError::UserNotFound));
        assert_eq!(um.register(&auth("alice", "s3")).await.unwrap_err().status(), 400);
        assert_eq!(um.register(&auth("", "s3")).await.unwrap_err().status(), 400);
    }

    #[tokio::test]
    async fn root_is_seeded_once() {
        let backends = Backends::memory();
        let um = UserManager::new(backends.meta.clone(), backends.incrementer.clone());
        let root = Root::default();

        let first = um.ensure_root(&root).await.unwrap();
        let again = um.ensure_root(&root).await.unwrap();
        assert_eq!(first.id, again.id);

        let rotated = Root { access_key: root.access_key.clone(), secret_key: "rotated".into() };
        um.ensure_root(&rotated).await.unwrap();
        assert_eq!(um.authenticate(&auth(&root.access_key, "rotated")).await.unwrap(), first.id);
    }
}
