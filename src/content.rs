// src/content.rs
//! Candidate items flowing through the pipeline and their dedup fingerprint.

use std::fmt;

use sha2::{Digest, Sha256};

/// Where a piece of content came from. Only used for provenance and logging;
/// both kinds carry the same fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Article,
    Alert,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Alert => "alert",
        }
    }
}

/// One candidate item. `description` is the only field processors rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    /// Kept as the upstream string (RFC 2822 for feeds, ISO 8601 for alerts).
    pub published_at: String,
    /// URL or a sentinel such as `System test`.
    pub link: String,
}

impl Content {
    pub fn article(
        title: impl Into<String>,
        description: impl Into<String>,
        published_at: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            kind: ContentKind::Article,
            title: title.into(),
            description: description.into(),
            published_at: published_at.into(),
            link: link.into(),
        }
    }

    pub fn alert(
        title: impl Into<String>,
        description: impl Into<String>,
        published_at: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            kind: ContentKind::Alert,
            ..Self::article(title, description, published_at, link)
        }
    }

    /// `"{title}: {description}"`, or whichever of the two is non-empty.
    /// Both sides are trimmed first, so surrounding whitespace never changes
    /// the fingerprint. Alerts append their start time so a later alert for the same region
    /// gets a fresh fingerprint.
    pub fn canonical(&self) -> String {
        let title = self.title.trim();
        let description = self.description.trim();
        let base = match (title.is_empty(), description.is_empty()) {
            (false, false) => format!("{title}: {description}"),
            (false, true) => title.to_string(),
            (true, false) => description.to_string(),
            (true, true) => String::new(),
        };
        match self.kind {
            ContentKind::Alert if !self.published_at.is_empty() => {
                format!("{base} published at {}", self.published_at)
            }
            _ => base,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.canonical())
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Lowercase hex SHA-256 of a canonical string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        Self(out)
    }

    /// Wrap an already-computed hex string (e.g. a line read from the store).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
