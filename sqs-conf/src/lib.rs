#![deny(unsafe_code)]

use std::fmt;
use std::net::SocketAddr;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use config::{Config, File};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use sqs_utils::deserialize_addr;

use self::logging::Log;

pub use self::options::Options;

pub mod logging;
pub mod options;

#[derive(Clone)]
pub struct Settings(Arc<Inner>);

#[derive(Debug, Clone, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub env: Env,
    #[serde(default = "Inner::max_queue_count_per_user_default")]
    pub max_queue_count_per_user: usize,
    #[serde(default)]
    pub node: Node,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub root: Root,
    #[serde(default)]
    pub log: Log,
    #[serde(default, skip)]
    pub opts: Options,
}

impl Inner {
    fn max_queue_count_per_user_default() -> usize {
        64
    }
}

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Settings {
    pub fn new(opts: Options) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("/etc/sqs/sqs").required(false))
            .add_source(File::with_name("sqs").required(false));

        if let Some(cfg) = opts.cfg_name.as_ref() {
            builder = builder.add_source(File::with_name(cfg).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("sqs").separator("__").try_parsing(true));

        let mut inner: Inner = builder.build()?.try_deserialize()?;

        //Command line configuration overriding file configuration
        if let Some(env) = opts.env {
            inner.env = env;
        }
        if let Some(laddr) = opts.laddr.as_ref() {
            inner.node.laddr = laddr.parse().map_err(|e| anyhow!("invalid --laddr {laddr}, {e}"))?;
        }
        if let Some(addr) = opts.addr.as_ref() {
            inner.node.addr.clone_from(addr);
        }

        inner.opts = opts;
        Ok(Self(Arc::new(inner)))
    }

    /// Settings built from defaults only, for the test environment.
    #[inline]
    pub fn for_test() -> Self {
        let mut inner = Inner {
            env: Env::Test,
            max_queue_count_per_user: Inner::max_queue_count_per_user_default(),
            node: Node::default(),
            storage: Storage::default(),
            message: Message::default(),
            root: Root::default(),
            log: Log::default(),
            opts: Options::default(),
        };
        inner.log.to = logging::To::Off;
        Self(Arc::new(inner))
    }

    /// Settings with the given modification applied to a copy of the current values.
    #[inline]
    pub fn with<F: FnOnce(&mut Inner)>(&self, f: F) -> Self {
        let mut inner = self.0.as_ref().clone();
        f(&mut inner);
        Self(Arc::new(inner))
    }

    #[inline]
    pub fn logs(&self) {
        log::debug!("Config info is {:?}", self.0);
        log::info!("env is {}", self.env);
        log::info!("node_id is {}", self.node.id);
        log::info!("node laddr is {}, advertised addr is {}", self.node.laddr, self.node.advertised_addr());
        log::info!("max_queue_count_per_user is {}", self.max_queue_count_per_user);
        log::info!("message config is: {:?}", self.message);
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Settings ...")?;
        Ok(())
    }
}

/// Deployment environment, selects the storage backends once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Env {
    Production,
    #[default]
    Development,
    Test,
}

impl Env {
    #[inline]
    pub fn is_production(&self) -> bool {
        matches!(self, Env::Production)
    }
    #[inline]
    pub fn is_development(&self) -> bool {
        matches!(self, Env::Development)
    }
    #[inline]
    pub fn is_test(&self) -> bool {
        matches!(self, Env::Test)
    }
}

impl FromStr for Env {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Env::Production),
            "development" | "develop" | "dev" => Ok(Env::Development),
            "test" => Ok(Env::Test),
            _ => Err(anyhow!("env '{s}' is not allowed")),
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Env::Production => "production",
            Env::Development => "development",
            Env::Test => "test",
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for Env {
    #[inline]
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Env::from_str(&String::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: u64,
    #[serde(default = "Node::laddr_default", deserialize_with = "deserialize_addr")]
    pub laddr: SocketAddr,
    //Address registered in the cluster, falls back to laddr when empty.
    #[serde(default)]
    pub addr: String,
}

impl Default for Node {
    #[inline]
    fn default() -> Self {
        Self { id: 0, laddr: Self::laddr_default(), addr: String::new() }
    }
}

impl Node {
    fn laddr_default() -> SocketAddr {
        ([0, 0, 0, 0], 5446).into()
    }

    #[inline]
    pub fn advertised_addr(&self) -> String {
        if self.addr.is_empty() {
            self.laddr.to_string()
        } else {
            self.addr.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    #[serde(default)]
    pub sled: SledConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SledConfig {
    #[serde(default = "SledConfig::path_default")]
    pub path: String,
}

impl Default for SledConfig {
    #[inline]
    fn default() -> Self {
        Self { path: Self::path_default() }
    }
}

impl SledConfig {
    fn path_default() -> String {
        "/var/lib/sqs/meta".into()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "RedisConfig::url_default")]
    pub url: String,
    #[serde(default = "RedisConfig::prefix_default")]
    pub prefix: String,
}

impl Default for RedisConfig {
    #[inline]
    fn default() -> Self {
        Self { url: Self::url_default(), prefix: Self::prefix_default() }
    }
}

impl RedisConfig {
    fn url_default() -> String {
        "redis://127.0.0.1:6379/".into()
    }
    fn prefix_default() -> String {
        "sqs".into()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    //Max number of messages returned by one pull.
    #[serde(default = "Message::pull_batch_size_default")]
    pub pull_batch_size: usize,
    //Max number of message ids examined by one pull, bounds the cost of skipping gaps.
    #[serde(default = "Message::pull_scan_max_default")]
    pub pull_scan_max: usize,
    //Max number of message ids one apply may reserve.
    #[serde(default = "Message::max_apply_size_default")]
    pub max_apply_size: i64,
}

impl Default for Message {
    #[inline]
    fn default() -> Self {
        Self {
            pull_batch_size: Self::pull_batch_size_default(),
            pull_scan_max: Self::pull_scan_max_default(),
            max_apply_size: Self::max_apply_size_default(),
        }
    }
}

impl Message {
    fn pull_batch_size_default() -> usize {
        10
    }
    fn pull_scan_max_default() -> usize {
        1000
    }
    fn max_apply_size_default() -> i64 {
        1000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Root {
    #[serde(default = "Root::access_key_default")]
    pub access_key: String,
    #[serde(default = "Root::secret_key_default")]
    pub secret_key: String,
}

impl Default for Root {
    #[inline]
    fn default() -> Self {
        Self { access_key: Self::access_key_default(), secret_key: Self::secret_key_default() }
    }
}

impl Root {
    fn access_key_default() -> String {
        "root".into()
    }
    fn secret_key_default() -> String {
        "sqsrootsecret".into()
    }
}
