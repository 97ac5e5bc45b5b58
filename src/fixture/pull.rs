//! Concurrent pulling of images missing from the local cache.

use std::collections::HashSet;
use std::thread;

use crate::containers::{ContainerRuntimeInterface, ImageRef, RuntimeError};
use crate::report::Reporter;

use super::cache::ImageCache;
use super::error::ProvisionError;

/// Images from `wanted` that the cache does not know, each identity once,
/// in first-seen order.
pub fn missing_images(wanted: &[ImageRef], cache: &ImageCache) -> Vec<ImageRef> {
    let snapshot = cache.snapshot();
    let mut seen = HashSet::new();
    wanted
        .iter()
        .filter(|image| {
            let identity = image.identity();
            !snapshot.contains(&identity) && seen.insert(identity)
        })
        .cloned()
        .collect()
}

/// Pull every missing image on its own thread and wait for all of them.
///
/// Returns whether anything was pulled. The cache is refreshed once, after
/// the last pull has finished, and only if every pull succeeded.
pub fn pull_missing<R>(
    runtime: &R,
    cache: &ImageCache,
    wanted: &[ImageRef],
    reporter: &dyn Reporter,
) -> Result<bool, ProvisionError>
where
    R: ContainerRuntimeInterface + ?Sized,
{
    let missing = missing_images(wanted, cache);
    if missing.is_empty() {
        return Ok(false);
    }

    let results: Vec<(String, Result<(), RuntimeError>)> = thread::scope(|scope| {
        let handles: Vec<_> = missing
            .iter()
            .map(|image| {
                let identity = image.identity();
                reporter.log(&format!("Pulling {identity}"));
                let handle = scope.spawn(move || {
                    let identity = image.identity();
                    runtime.pull_image(image, &mut |line: &str| {
                        reporter.log(&format!("{identity}: {line}"));
                    })
                });
                (identity, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(identity, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(RuntimeError::PullFailed(format!(
                        "{identity}: pull thread panicked"
                    )))
                });
                (identity, result)
            })
            .collect()
    });

    for (identity, result) in results {
        if let Err(source) = result {
            return Err(ProvisionError::Pull {
                image: identity,
                source,
            });
        }
        tracing::info!("Pulled {}", identity);
    }

    cache.refresh(runtime).map_err(ProvisionError::CacheQuery)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::fake::{Call, FakeRuntime};
    use crate::report::RecordingReporter;
    use std::time::Duration;

    fn refs(names: &[&str]) -> Vec<ImageRef> {
        names.iter().map(|n| ImageRef::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_missing_images_dedups_and_skips_cached() {
        let cache = ImageCache::from_images(["redis:6"]);
        let missing = missing_images(
            &refs(&["redis:6", "postgres:13", "postgres:13", "mongo"]),
            &cache,
        );
        assert_eq!(missing, refs(&["postgres:13", "mongo:latest"]));
    }

    #[test]
    fn test_nothing_missing_means_no_pull_and_no_refresh() {
        let runtime = FakeRuntime::new().with_local_image("redis:6", &["6379/tcp"]);
        let cache = ImageCache::from_images(["redis:6"]);
        let reporter = RecordingReporter::new();

        let pulled = pull_missing(&runtime, &cache, &refs(&["redis:6"]), &reporter).unwrap();

        assert!(!pulled);
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn test_pulls_run_concurrently_then_refresh_once() {
        let runtime = FakeRuntime::new()
            .with_remote_image("redis:6", &["6379/tcp"])
            .with_remote_image("postgres:13", &["5432/tcp"])
            .with_remote_image("mongo:latest", &["27017/tcp"])
            .with_pull_delay(Duration::from_millis(150));
        let cache = ImageCache::new();
        let reporter = RecordingReporter::new();

        let pulled = pull_missing(
            &runtime,
            &cache,
            &refs(&["redis:6", "postgres:13", "mongo"]),
            &reporter,
        )
        .unwrap();

        assert!(pulled);
        assert!(runtime.max_concurrent_pulls() > 1);
        let calls = runtime.calls();
        let lists = calls.iter().filter(|c| **c == Call::ListLocalImages).count();
        assert_eq!(lists, 1);
        assert_eq!(calls.last(), Some(&Call::ListLocalImages));
        assert!(cache.contains("redis:6"));
        assert!(cache.contains("postgres:13"));
        assert!(cache.contains("mongo:latest"));
        assert!(reporter
            .logs()
            .iter()
            .any(|l| l.starts_with("redis:6: ")));
    }

    #[test]
    fn test_shared_identity_is_pulled_once() {
        let runtime = FakeRuntime::new().with_remote_image("postgres:13", &["5432/tcp"]);
        let cache = ImageCache::new();
        let reporter = RecordingReporter::new();

        pull_missing(
            &runtime,
            &cache,
            &refs(&["postgres:13", "postgres:13"]),
            &reporter,
        )
        .unwrap();

        assert_eq!(runtime.pull_count("postgres:13"), 1);
    }

    #[test]
    fn test_pull_failure_carries_identity_and_skips_refresh() {
        let runtime = FakeRuntime::new()
            .with_remote_image("redis:6", &["6379/tcp"])
            .with_remote_image("broken:1", &[])
            .fail_pull("broken:1");
        let cache = ImageCache::new();
        let reporter = RecordingReporter::new();

        let err = pull_missing(&runtime, &cache, &refs(&["redis:6", "broken:1"]), &reporter)
            .unwrap_err();

        match err {
            ProvisionError::Pull { image, .. } => assert_eq!(image, "broken:1"),
            other => panic!("expected pull error, got {other:?}"),
        }
        // Both pulls still ran to completion.
        assert_eq!(runtime.pull_count("redis:6"), 1);
        assert!(!runtime.calls().contains(&Call::ListLocalImages));
    }

    #[test]
    fn test_refresh_failure_is_cache_query_error() {
        let runtime = FakeRuntime::new()
            .with_remote_image("redis:6", &["6379/tcp"])
            .fail_list_images();
        let cache = ImageCache::new();
        let reporter = RecordingReporter::new();

        let err = pull_missing(&runtime, &cache, &refs(&["redis:6"]), &reporter).unwrap_err();
        assert!(matches!(err, ProvisionError::CacheQuery(_)));
    }
}
