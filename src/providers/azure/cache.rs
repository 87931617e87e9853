use std::future::Future;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

use crate::error::{BuildLensError, Result};

use super::types::Build;

/// Latest completed build per source branch.
///
/// Keys are compared case-insensitively since the service is inconsistent about
/// ref casing. Inserts are first-wins: an existing entry is never replaced.
/// Lives for one resolution session; [`BranchCache::reset`] starts a new one.
#[derive(Default)]
pub struct BranchCache {
    builds: DashMap<String, Build>,
}

fn cache_key(branch: &str) -> String {
    branch.to_lowercase()
}

impl BranchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, branch: &str) -> Option<Build> {
        self.builds
            .get(&cache_key(branch))
            .map(|entry| entry.value().clone())
    }

    /// Stores `build` under its source branch unless that branch is already cached.
    ///
    /// Returns `true` when the build was stored.
    pub fn remember(&self, build: Build) -> bool {
        match self.builds.entry(cache_key(&build.source_branch)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(build);
                true
            }
        }
    }

    /// Returns the cached build for `branch`, running `populate` once on a miss.
    ///
    /// Every build `populate` yields is remembered in order, so the first build
    /// seen per branch wins.
    ///
    /// # Errors
    ///
    /// Propagates `populate`'s error, or returns `NotFound` when `branch` is still
    /// absent afterwards.
    pub async fn get_or_populate<F, Fut>(&self, branch: &str, populate: F) -> Result<Build>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Build>>>,
    {
        if let Some(build) = self.get(branch) {
            debug!("Branch cache hit for {branch}");
            return Ok(build);
        }

        debug!("Branch cache miss for {branch}");

        let stored = populate()
            .await?
            .into_iter()
            .map(|build| self.remember(build))
            .filter(|stored| *stored)
            .count();

        debug!("Cached {stored} new branches ({} total)", self.len());

        self.get(branch).ok_or_else(|| {
            BuildLensError::NotFound(format!("no completed build found for branch '{branch}'"))
        })
    }

    pub fn reset(&self) {
        self.builds.clear();
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }
}
