//! GTK bookmark reading and share parsing.
//!
//! The bookmarks file holds one URI per line, optionally followed by a label
//! (`smb://host/share Label`). Only lines starting with a watched protocol
//! prefix are returned. The file is re-read on every mount cycle.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors while reading the bookmarks file
#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("Could not read the shared resources from {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors while turning a bookmark line into a share
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShareParseError {
    #[error("Empty bookmark line")]
    Empty,

    #[error("Invalid share URI {uri}: {message}")]
    InvalidUri { uri: String, message: String },

    #[error("Share URI {0} has no host")]
    MissingHost(String),
}

/// Reads the bookmarks file and filters it to watched protocols.
#[derive(Debug, Clone)]
pub struct BookmarkSource {
    path: PathBuf,
    watched_protocols: Vec<String>,
}

impl BookmarkSource {
    /// Create a source for the given file and protocol prefixes
    pub fn new(path: impl Into<PathBuf>, watched_protocols: Vec<String>) -> Self {
        Self {
            path: path.into(),
            watched_protocols,
        }
    }

    /// Path of the bookmarks file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the watched bookmark lines, in file order.
    ///
    /// An unreadable file is logged and yields no shares.
    pub async fn read_shares(&self) -> Vec<String> {
        match self.try_read_shares().await {
            Ok(shares) => shares,
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Like `read_shares`, but reports a missing or unreadable file.
    ///
    /// Bytes that are not valid UTF-8 are replaced, so a badly encoded label
    /// only affects its own line.
    pub async fn try_read_shares(&self) -> Result<Vec<String>, BookmarkError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| BookmarkError::SourceUnavailable {
                path: self.path.clone(),
                source,
            })?;
        Ok(filter_shares(
            &String::from_utf8_lossy(&bytes),
            &self.watched_protocols,
        ))
    }
}

/// Keep lines that start with one of the prefixes, with trailing whitespace trimmed.
pub fn filter_shares(contents: &str, watched_protocols: &[String]) -> Vec<String> {
    contents
        .lines()
        .filter(|line| {
            watched_protocols
                .iter()
                .any(|prefix| line.starts_with(prefix.as_str()))
        })
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// One bookmarked remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEntry {
    raw: String,
    uri: String,
    protocol: String,
    host: String,
}

impl ShareEntry {
    /// Parse a bookmark line into a share.
    ///
    /// The first whitespace-delimited token is the URI; anything after it is
    /// the bookmark label and is ignored.
    pub fn parse(line: &str) -> Result<Self, ShareParseError> {
        let raw = line.trim();
        let uri = raw.split_whitespace().next().ok_or(ShareParseError::Empty)?;

        let parsed = Url::parse(uri).map_err(|e| ShareParseError::InvalidUri {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ShareParseError::MissingHost(uri.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            uri: uri.to_string(),
            protocol: parsed.scheme().to_string(),
            host: host.to_string(),
        })
    }

    /// The bookmark line as read
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// URI handed to the mount command
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI scheme, e.g. `smb`
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Server host name
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for ShareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}
