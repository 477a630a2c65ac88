/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! IMAP-style content indexes (RFC 3501 section 6.4.5): a dot-separated path
//! of 1-based positions, e.g. `2.1` is the first child of the second child of
//! the root. An empty index denotes the root itself.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContentIndex {
    levels: Vec<u32>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContentIndexError {
    #[error("empty content index")]
    Empty,
    #[error("invalid index level `{0}`")]
    InvalidLevel(String),
}

impl ContentIndex {
    pub fn new() -> ContentIndex {
        ContentIndex::default()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// Descends one level: appends a 1-based position at the deep end.
    pub fn push(&mut self, level: u32) {
        self.levels.push(level);
    }

    /// Ascends one level, returning the position that was removed. Inverse
    /// of [`push`](Self::push).
    pub fn pop(&mut self) -> Option<u32> {
        self.levels.pop()
    }

    /// Alias of [`pop`](Self::pop), reading as tree navigation.
    pub fn up(&mut self) -> Option<u32> {
        self.pop()
    }
}

impl fmt::Display for ContentIndex {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for level in &self.levels {
            if !first {
                fmt.write_str(".")?;
            }
            write!(fmt, "{}", level)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for ContentIndex {
    type Err = ContentIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ContentIndexError::Empty);
        }
        let mut levels = Vec::new();
        for part in s.split('.') {
            // `parse::<u32>` rejects empty parts, signs and overflow.
            let level = part
                .parse::<u32>()
                .map_err(|_| ContentIndexError::InvalidLevel(part.to_string()))?;
            if level == 0 {
                return Err(ContentIndexError::InvalidLevel(part.to_string()));
            }
            levels.push(level);
        }
        Ok(ContentIndex { levels })
    }
}
