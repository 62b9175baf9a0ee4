// SecureDB: Feed document
//
// A small JSON file whose `data` array is re-randomized on every tick.
// `data` may hold any JSON numbers; after a tick it holds integers.
// Fields other than `data` (labels, colors, titles) pass through untouched.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::FeedError;

/// Exclusive upper bound of randomized values.
pub const VALUE_BOUND: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedDocument {
    pub data: Vec<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedDocument {
    /// Replace every value with a uniform draw from `[0, VALUE_BOUND)`.
    /// The length of `data` is unchanged.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for value in &mut self.data {
            *value = Number::from(rng.random_range(0..VALUE_BOUND));
        }
    }
}

/// The file backing the feed.
#[derive(Debug, Clone)]
pub struct FeedSource {
    path: PathBuf,
}

impl FeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<FeedDocument, FeedError> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write(&self, doc: &FeedDocument) -> Result<(), FeedError> {
        let bytes = serde_json::to_vec(doc)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Read the file, randomize it, write it back and return the result.
    /// The file is re-read every time, so external edits are picked up.
    pub fn tick(&self) -> Result<FeedDocument, FeedError> {
        let mut doc = self.read()?;
        doc.randomize(&mut rand::rng());
        self.write(&doc)?;
        Ok(doc)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
