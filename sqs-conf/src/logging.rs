use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// `[log]` section
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub to: To,
    #[serde(default)]
    pub level: Level,
    #[serde(default = "Log::dir_default")]
    pub dir: String,
    #[serde(default = "Log::file_default")]
    pub file: String,
}

impl Default for Log {
    #[inline]
    fn default() -> Self {
        Self { to: To::default(), level: Level::default(), dir: Self::dir_default(), file: Self::file_default() }
    }
}

impl Log {
    fn dir_default() -> String {
        "/var/log/sqs".into()
    }

    fn file_default() -> String {
        "sqs.log".into()
    }

    /// `dir` joined with `file`, empty when no file is configured.
    #[inline]
    pub fn filename(&self) -> String {
        if self.file.is_empty() {
            return String::new();
        }
        if self.dir.is_empty() {
            return self.file.clone();
        }
        format!("{}/{}", self.dir.trim_end_matches(['/', '\\']), self.file)
    }
}

/// Where log records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum To {
    Off,
    File,
    #[default]
    Console,
    Both,
}

impl To {
    #[inline]
    pub fn file(&self) -> bool {
        matches!(self, To::Both | To::File)
    }
    #[inline]
    pub fn console(&self) -> bool {
        matches!(self, To::Both | To::Console)
    }
    #[inline]
    pub fn off(&self) -> bool {
        matches!(self, To::Off)
    }
}

impl FromStr for To {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(To::Off),
            "file" => Ok(To::File),
            "console" => Ok(To::Console),
            "both" => Ok(To::Both),
            other => Err(format!("log.to '{other}' is not one of off, file, console, both")),
        }
    }
}

impl<'de> Deserialize<'de> for To {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        To::from_str(&String::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Level {
    inner: slog::Level,
}

impl Level {
    #[inline]
    pub fn new(inner: slog::Level) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn inner(&self) -> slog::Level {
        self.inner
    }
}

impl Default for Level {
    #[inline]
    fn default() -> Self {
        Self::new(slog::Level::Info)
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        slog::Level::from_str(s.trim()).map(Level::new).map_err(|_| format!("log.level '{s}' is not a log level"))
    }
}

impl<'de> Deserialize<'de> for Level {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Level::from_str(&String::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_targets() {
        assert_eq!("Both".parse::<To>().unwrap(), To::Both);
        assert!(To::Both.file() && To::Both.console());
        assert!("stdout".parse::<To>().is_err());
        assert_eq!(To::default(), To::Console);
    }

    #[test]
    fn levels() {
        assert_eq!("debug".parse::<Level>().unwrap().inner(), slog::Level::Debug);
        assert_eq!(Level::default().inner(), slog::Level::Info);
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn filename() {
        let mut log = Log::default();
        assert_eq!(log.filename(), "/var/log/sqs/sqs.log");
        log.dir = "/tmp/".into();
        assert_eq!(log.filename(), "/tmp/sqs.log");
        log.file.clear();
        assert_eq!(log.filename(), "");
    }
}
