//! Version placeholders.
//!
//! While specifiers are rewritten no version is known yet, so each
//! versioned URL is referenced through a token `!~{xyz}~` (three base-36
//! digits). Tokens are exactly as long as a version, which keeps byte
//! offsets and sourcemaps valid when they are substituted.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Length of a token and of a version.
pub const PLACEHOLDER_LEN: usize = 8;

/// Version substituted for placeholders of cycle members while hashing.
pub const NEUTRAL_VERSION: &str = "00000000";

const PREFIX: &[u8] = b"!~{";
const SUFFIX: &[u8] = b"}~";
const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const CAPACITY: u32 = 36 * 36 * 36;

fn token(index: u32) -> String {
    let d0 = DIGITS[(index / (36 * 36)) as usize] as char;
    let d1 = DIGITS[((index / 36) % 36) as usize] as char;
    let d2 = DIGITS[(index % 36) as usize] as char;
    format!("!~{{{d0}{d1}{d2}}}~")
}

fn is_token_at(bytes: &[u8], at: usize) -> bool {
    let Some(candidate) = bytes.get(at..at + PLACEHOLDER_LEN) else {
        return false;
    };
    candidate.starts_with(PREFIX)
        && candidate.ends_with(SUFFIX)
        && candidate[3..6]
            .iter()
            .all(|byte| byte.is_ascii_digit() || byte.is_ascii_lowercase())
}

/// Offsets of every well-formed token in `content`, known or not.
pub fn find_all(content: &str) -> Vec<(usize, &str)> {
    let bytes = content.as_bytes();
    let mut found = Vec::new();
    let mut at = 0;
    while at + PLACEHOLDER_LEN <= bytes.len() {
        if is_token_at(bytes, at) {
            found.push((at, &content[at..at + PLACEHOLDER_LEN]));
            at += PLACEHOLDER_LEN;
        } else {
            at += 1;
        }
    }
    found
}

pub fn contains_placeholder(content: &str) -> bool {
    !find_all(content).is_empty()
}

/// Tokens handed out during one build.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderTable {
    by_url: BTreeMap<String, String>,
    by_token: FxHashMap<String, String>,
}

impl PlaceholderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of `url`, allocating the next free one on first use.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] once all 46656 tokens are taken.
    pub fn allocate(&mut self, url: &str) -> Result<String> {
        if let Some(existing) = self.by_url.get(url) {
            return Ok(existing.clone());
        }
        let index = self.by_url.len() as u32;
        if index >= CAPACITY {
            return Err(Error::InvalidState {
                expected: "a free version placeholder",
                found: "exhausted placeholder space",
            });
        }
        let token = token(index);
        self.by_url.insert(url.to_string(), token.clone());
        self.by_token.insert(token.clone(), url.to_string());
        Ok(token)
    }

    pub fn token_of(&self, url: &str) -> Option<&str> {
        self.by_url.get(url).map(String::as_str)
    }

    pub fn owner_of(&self, token: &str) -> Option<&str> {
        self.by_token.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Owners of the known tokens found in `content`, in order of
    /// appearance (repeats included).
    pub fn owners_in<'a>(&'a self, content: &str) -> Vec<&'a str> {
        find_all(content)
            .into_iter()
            .filter_map(|(_, token)| self.owner_of(token))
            .collect()
    }

    /// Replace every known token by `substitute(owner)`. Tokens with no
    /// substitute, and unknown tokens, are left in place.
    pub fn replace_all(&self, content: &str, substitute: impl Fn(&str) -> Option<String>) -> String {
        let mut output = String::with_capacity(content.len());
        let mut last = 0;
        for (at, token) in find_all(content) {
            let Some(replacement) = self.owner_of(token).and_then(&substitute) else {
                continue;
            };
            output.push_str(&content[last..at]);
            output.push_str(&replacement);
            last = at + PLACEHOLDER_LEN;
        }
        output.push_str(&content[last..]);
        output
    }
}
