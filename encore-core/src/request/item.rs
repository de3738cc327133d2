use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{catalog::Song, util};

/// Unique, time-ordered request identifier, derived from the creation
/// timestamp in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_millis(millis: u64) -> Self {
        Self(millis.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A queued song request, aggregating every ask for the same song.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Songs are immutable, requests share them instead of copying.
    pub song: Arc<Song>,
    /// In ask order, duplicates included.  A requester listed twice asked
    /// twice.
    pub requesters: Vec<String>,
    pub created_at: u64,
}

/// Issues request ids.  Ids created within the same millisecond are advanced
/// past the previously issued value, so they stay unique and ordered.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Seed the generator past ids restored from storage, keeping ids issued
    /// later in the session sorted after the restored ones.
    pub fn seed_from<'a>(&mut self, ids: impl IntoIterator<Item = &'a RequestId>) {
        for id in ids {
            if let Ok(value) = id.as_str().parse::<u64>() {
                self.last = self.last.max(value);
            }
        }
    }

    /// Next id plus the creation timestamp it was derived from.
    pub fn next(&mut self) -> (RequestId, u64) {
        let now = util::unix_millis();
        let value = now.max(self.last + 1);
        self.last = value;
        (RequestId::from_millis(value), now)
    }
}
