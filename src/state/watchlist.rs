use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of asset ids the user follows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watchlist {
    ids: BTreeSet<String>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `asset_id` if absent, removes it if present. Returns whether the
    /// id is watched afterwards.
    pub fn toggle(&mut self, asset_id: &str) -> bool {
        if self.ids.remove(asset_id) {
            false
        } else {
            self.ids.insert(asset_id.to_string());
            true
        }
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.ids.contains(asset_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Watchlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}
