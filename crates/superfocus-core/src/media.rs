//! Data-URI handling for media carried inside JSON bodies.
//!
//! Homework photos and recorded audio arrive as
//! `data:<type>/<subtype>[;param=value]*;base64,<payload>`. Parsing checks the
//! shape, the MIME type, and that the payload decodes, without keeping the
//! decoded bytes around: providers accept the original URI as-is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Largest decoded payload accepted in a data URI (8 MiB).
pub const MAX_MEDIA_BYTES: usize = 8 * 1024 * 1024;

static DATA_URI: Lazy<Option<Regex>> = Lazy::new(|| {
    // group 1: type, group 2: subtype, group 3: params, group 4: payload
    Regex::new(
        r"^data:([a-zA-Z0-9][a-zA-Z0-9!#$&^_.+-]*)/([a-zA-Z0-9][a-zA-Z0-9!#$&^_.+-]*)((?:;[^;,]+)*?);base64,([A-Za-z0-9+/=\s]*)$",
    )
    .ok()
});

/// Top-level media category a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// `image/*`
    Image,
    /// `audio/*`
    Audio,
}

impl MediaKind {
    const fn top_level(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.top_level())
    }
}

/// Reasons a data URI is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    /// Not of the form `data:<mime>;base64,<payload>`.
    Malformed,
    /// The MIME type is not of the expected kind.
    WrongKind {
        /// Kind the field accepts.
        expected: MediaKind,
        /// MIME type that was supplied.
        actual: String,
    },
    /// The payload is empty.
    Empty,
    /// The payload is not valid base64.
    BadEncoding,
    /// The decoded payload exceeds [`MAX_MEDIA_BYTES`].
    TooLarge {
        /// Decoded size in bytes.
        size: usize,
    },
}

impl std::fmt::Display for DataUriError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => {
                write!(f, "must be a data URI of the form data:<type>/<subtype>;base64,<payload>")
            }
            Self::WrongKind { expected, actual } => {
                write!(f, "must have an {expected}/* MIME type, got '{actual}'")
            }
            Self::Empty => write!(f, "data URI payload is empty"),
            Self::BadEncoding => write!(f, "data URI payload is not valid base64"),
            Self::TooLarge { size } => write!(
                f,
                "media is {} KiB, the limit is {} KiB",
                size / 1024,
                MAX_MEDIA_BYTES / 1024
            ),
        }
    }
}

impl std::error::Error for DataUriError {}

/// A validated base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    uri: String,
    mime: String,
    decoded_len: usize,
}

impl DataUri {
    /// Parses and validates `uri`, requiring a MIME type of `kind`.
    pub fn parse(uri: &str, kind: MediaKind) -> Result<Self, DataUriError> {
        let re = DATA_URI.as_ref().ok_or(DataUriError::Malformed)?;
        let caps = re.captures(uri.trim()).ok_or(DataUriError::Malformed)?;

        let top = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let sub = caps.get(2).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let mime = format!("{top}/{sub}");
        if top != kind.top_level() {
            return Err(DataUriError::WrongKind {
                expected: kind,
                actual: mime,
            });
        }

        let payload: String = caps
            .get(4)
            .map_or("", |m| m.as_str())
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if payload.is_empty() {
            return Err(DataUriError::Empty);
        }

        // Cheap bound before decoding: 4 base64 chars carry 3 bytes.
        let estimated = payload.len() / 4 * 3;
        if estimated > MAX_MEDIA_BYTES + 3 {
            return Err(DataUriError::TooLarge { size: estimated });
        }

        let decoded = STANDARD
            .decode(payload.as_bytes())
            .map_err(|_| DataUriError::BadEncoding)?;
        if decoded.len() > MAX_MEDIA_BYTES {
            return Err(DataUriError::TooLarge {
                size: decoded.len(),
            });
        }

        Ok(Self {
            uri: uri.trim().to_string(),
            mime,
            decoded_len: decoded.len(),
        })
    }

    /// The full URI, suitable for forwarding to a provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Lower-cased MIME type, e.g. `image/png`.
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Subtype of the MIME type, e.g. `png` or `mpeg`.
    #[must_use]
    pub fn subtype(&self) -> &str {
        self.mime.split_once('/').map_or("", |(_, sub)| sub)
    }

    /// Size of the decoded payload in bytes.
    #[must_use]
    pub const fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// The raw base64 payload (everything after the comma).
    #[must_use]
    pub fn payload(&self) -> &str {
        self.uri.split_once(',').map_or("", |(_, data)| data)
    }
}
