//! Known-local image identities.
//!
//! The set is only ever replaced whole: readers clone an `Arc` snapshot and
//! never see a half-refreshed set while another provisioning call refreshes.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::containers::{ContainerRuntimeInterface, Result};

#[derive(Debug, Default)]
pub struct ImageCache {
    images: RwLock<Arc<HashSet<String>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_images<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cache = Self::new();
        cache.replace(images.into_iter().map(Into::into).collect());
        cache
    }

    /// Query the runtime for every local `repo:tag`.
    pub fn query<R>(runtime: &R) -> Result<HashSet<String>>
    where
        R: ContainerRuntimeInterface + ?Sized,
    {
        Ok(runtime.list_local_images()?.into_iter().collect())
    }

    /// Re-query the runtime and swap in the new set. On failure the previous
    /// snapshot is left untouched.
    pub fn refresh<R>(&self, runtime: &R) -> Result<usize>
    where
        R: ContainerRuntimeInterface + ?Sized,
    {
        let images = Self::query(runtime)?;
        let count = images.len();
        self.replace(images);
        tracing::debug!("Image cache refreshed with {} images", count);
        Ok(count)
    }

    pub fn replace(&self, images: HashSet<String>) {
        let mut guard = self.images.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(images);
    }

    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        self.images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.snapshot().contains(identity)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
