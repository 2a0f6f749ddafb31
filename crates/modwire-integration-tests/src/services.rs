//! Search service components wired by [`crate::wiring`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::ensure;
use async_trait::async_trait;
use modwire::{EntryPoint, RuntimeArgs};
use tracing::{debug, info};

/// Documents the indexer seeds on a server pass.
const SEED_DOCUMENTS: [(&str, &str); 4] = [
    ("readme", "modwire search demo"),
    ("guide", "wiring a search index"),
    ("notes", "lazy singletons in practice"),
    ("faq", "replacing producers in tests"),
];

const DEFAULT_SEED_LIMIT: usize = 16;

/// Service settings derived from process arguments.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shard this instance serves; first argument, `main` by default.
    pub shard: String,
    /// Most documents a seeding pass may index.
    pub limit: usize,
}

impl Settings {
    pub fn from_args(args: &RuntimeArgs) -> Self {
        Self {
            shard: args
                .args
                .first()
                .cloned()
                .unwrap_or_else(|| "main".to_owned()),
            limit: DEFAULT_SEED_LIMIT,
        }
    }
}

/// Keyed document store with substring search.
pub trait SearchIndex: Send + Sync {
    /// Store `value` under `key`, replacing any previous document.
    fn put(&self, key: &str, value: &str);

    /// Keys of documents containing `needle`, sorted.
    fn grep(&self, needle: &str) -> Vec<String>;

    /// Number of stored documents.
    fn len(&self) -> usize;

    /// True when no documents are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash-map backed [`SearchIndex`].
#[derive(Default)]
pub struct InMemoryIndex {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchIndex for InMemoryIndex {
    fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn grep(&self, needle: &str) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut hits: Vec<String> = entries
            .iter()
            .filter(|(_, value)| value.contains(needle))
            .map(|(key, _)| key.clone())
            .collect();
        hits.sort_unstable();
        hits
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Seeds the index, up to the settings limit.
pub struct Indexer {
    pub index: Arc<dyn SearchIndex>,
    pub settings: Arc<Settings>,
}

impl Indexer {
    /// Index the seed documents; returns how many were stored.
    pub fn seed(&self) -> usize {
        let mut seeded = 0;
        for (key, value) in SEED_DOCUMENTS.iter().take(self.settings.limit).copied() {
            self.index.put(key, value);
            seeded += 1;
        }
        debug!(shard = %self.settings.shard, seeded, "index seeded");
        seeded
    }
}

/// Outcome of one server pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub shard: String,
    pub seeded: usize,
    pub hits: usize,
}

/// Program root: seeds the index and reports what a search finds.
pub struct Server {
    pub indexer: Arc<Indexer>,
    pub index: Arc<dyn SearchIndex>,
    pub settings: Arc<Settings>,
}

#[async_trait]
impl EntryPoint for Server {
    type Output = anyhow::Result<StatusReport>;

    async fn run(&self) -> anyhow::Result<StatusReport> {
        let seeded = self.indexer.seed();
        ensure!(seeded > 0, "no documents seeded for shard {}", self.settings.shard);
        let hits = self.index.grep("search").len();
        info!(shard = %self.settings.shard, seeded, hits, "server pass complete");
        Ok(StatusReport {
            shard: self.settings.shard.clone(),
            seeded,
            hits,
        })
    }
}
