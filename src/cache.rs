//! Path-keyed cache of loaded churn tables and recommender resources

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::{compute_churn_features, ChurnTable};
use crate::ids::CustomerId;
use crate::outcome::Outcome;
use crate::recommend::Recommendation;
use crate::resources::{load_recommender_resources, RecommenderResources};

#[derive(Default)]
struct CacheEntry {
    churn: Option<Arc<ChurnTable>>,
    resources: Option<Arc<RecommenderResources>>,
}

/// Memoizes expensive loads per input file.
///
/// Entries are immutable once built and stay until [`invalidate`] or
/// [`clear`] is called; the underlying file is not watched.
///
/// [`invalidate`]: ResourceCache::invalidate
/// [`clear`]: ResourceCache::clear
pub struct ResourceCache {
    config: PipelineConfig,
    entries: HashMap<PathBuf, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ResourceCache {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Churn features for `path`, computed on first use
    pub fn churn_features(&mut self, path: &Path) -> Result<Arc<ChurnTable>> {
        if let Some(table) = self.entries.get(path).and_then(|e| e.churn.clone()) {
            self.hits += 1;
            debug!(path = %path.display(), "Churn table cache hit");
            return Ok(table);
        }

        self.misses += 1;
        debug!(path = %path.display(), "Churn table cache miss");
        let table = Arc::new(compute_churn_features(path, &self.config.churn)?);
        self.entry_mut(path).churn = Some(Arc::clone(&table));
        Ok(table)
    }

    /// Recommender resources for `path`, built on first use
    pub fn recommender_resources(&mut self, path: &Path) -> Result<Arc<RecommenderResources>> {
        if let Some(resources) = self.entries.get(path).and_then(|e| e.resources.clone()) {
            self.hits += 1;
            debug!(path = %path.display(), "Recommender cache hit");
            return Ok(resources);
        }

        self.misses += 1;
        debug!(path = %path.display(), "Recommender cache miss");
        let resources = Arc::new(load_recommender_resources(path, self.config.value_column)?);
        self.entry_mut(path).resources = Some(Arc::clone(&resources));
        Ok(resources)
    }

    /// Only called after a successful load
    fn entry_mut(&mut self, path: &Path) -> &mut CacheEntry {
        self.entries.entry(path.to_path_buf()).or_default()
    }

    /// Load (or reuse) resources and recommend; load failures become
    /// `Outcome::Fatal`
    pub fn recommend(
        &mut self,
        path: &Path,
        customer_id: &CustomerId,
        top_n: usize,
    ) -> Outcome<Vec<Recommendation>> {
        match self.recommender_resources(path) {
            Ok(resources) => resources.recommend(customer_id, top_n),
            Err(error) => Outcome::Fatal(error),
        }
    }

    /// Drop everything cached for `path`; returns whether anything was cached
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.entries
            .get(path)
            .is_some_and(|e| e.churn.is_some() || e.resources.is_some())
    }

    /// Number of paths with something cached
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
