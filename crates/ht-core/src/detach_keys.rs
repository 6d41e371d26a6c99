//! Detach key sequence
//!
//! Keys are written as a comma-separated list. Each item is either a single
//! literal character or `ctrl-<x>`, where `<x>` is a letter or one of
//! `@ [ \ ] ^ _`. The default sequence is `ctrl-p,ctrl-q`.

use std::fmt;

/// Default detach sequence as written in config files
pub const DEFAULT_DETACH_KEYS: &str = "ctrl-p,ctrl-q";

/// Ordered byte sequence that detaches from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachKeys {
    bytes: Vec<u8>,
    spec: String,
}

impl DetachKeys {
    /// Parse a comma-separated key list
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err("detach key sequence is empty".to_string());
        }

        let mut bytes = Vec::new();
        for key in spec.split(',') {
            let key = key.trim();
            bytes.push(parse_key(key).ok_or_else(|| format!("invalid detach key: {:?}", key))?);
        }

        Ok(Self {
            bytes,
            spec: spec.to_string(),
        })
    }

    /// Resolve the effective sequence: flag first, then config file, then default
    ///
    /// Empty or unparsable values fall through to the next source.
    pub fn resolve(flag: Option<&str>, configured: Option<&str>) -> Self {
        for (source, value) in [("flag", flag), ("config file", configured)] {
            let Some(value) = value else { continue };
            match Self::parse(value) {
                Ok(keys) => return keys,
                Err(e) => tracing::warn!("Ignoring detach keys from {}: {}", source, e),
            }
        }
        Self::default()
    }

    /// Raw bytes to match in the input stream
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The text this sequence was parsed from
    pub fn spec(&self) -> &str {
        &self.spec
    }
}

impl Default for DetachKeys {
    fn default() -> Self {
        Self {
            bytes: vec![0x10, 0x11],
            spec: DEFAULT_DETACH_KEYS.to_string(),
        }
    }
}

impl fmt::Display for DetachKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

fn parse_key(key: &str) -> Option<u8> {
    let lower = key.to_ascii_lowercase();
    if let Some(suffix) = lower.strip_prefix("ctrl-") {
        let mut chars = suffix.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        return match c {
            'a'..='z' => Some(c as u8 - b'a' + 1),
            '@' => Some(0x00),
            '[' => Some(0x1b),
            '\\' => Some(0x1c),
            ']' => Some(0x1d),
            '^' => Some(0x1e),
            '_' => Some(0x1f),
            _ => None,
        };
    }

    // A single printable ASCII character stands for itself
    match key.as_bytes() {
        [b] if b.is_ascii() && !b.is_ascii_control() => Some(*b),
        _ => None,
    }
}
