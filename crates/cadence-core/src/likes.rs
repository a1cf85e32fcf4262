use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Track ids the user has liked.  Local only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LikedSongs(BTreeSet<String>);

impl LikedSongs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership; returns whether the track is liked afterwards.
    pub fn toggle(&mut self, track_id: &str) -> bool {
        if self.0.remove(track_id) {
            false
        } else {
            self.0.insert(track_id.to_string());
            true
        }
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.0.contains(track_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for LikedSongs {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
