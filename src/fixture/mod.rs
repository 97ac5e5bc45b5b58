//! Container fixtures for integration tests.
//!
//! A [`Harness`] owns the runtime client and the image cache for a whole
//! test run. Each provisioning call goes through three steps:
//!
//! 1. every image missing locally is pulled, one thread per distinct image,
//!    and the cache is refreshed once after the last pull;
//! 2. containers are inspected, created and started one at a time, in
//!    declaration order;
//! 3. the harness sleeps once for the longest declared ready delay, then runs
//!    readiness callbacks.
//!
//! The resulting [`Fixture`] maps container ports to host ports and tears
//! everything down on `close`, `fail` or drop.

pub mod cache;
pub mod declaration;
pub mod error;
pub mod handle;
pub mod provision;
pub mod pull;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::containers::{ContainerRuntime, ContainerRuntimeInterface, ImageRef};
use crate::report::{LibtestReporter, Reporter};

pub use cache::ImageCache;
pub use declaration::{ContainerDecl, ReadyFn};
pub use error::{BoxError, ProvisionError, ReadyError, TeardownError, TeardownFailure};
pub use handle::{Fixture, ProvisionedContainer};
use provision::PortAllocator;

/// `container port -> host port`, both as strings (e.g. `"6379" -> "49153"`).
pub type PortMappings = HashMap<String, String>;

pub struct Harness<R: ContainerRuntimeInterface = ContainerRuntime> {
    runtime: Arc<R>,
    cache: ImageCache,
    settings: Settings,
    reporter: Arc<dyn Reporter>,
}

impl Harness<ContainerRuntime> {
    /// Harness for the runtime named in the loaded [`Settings`].
    pub fn new() -> Result<Self, ProvisionError> {
        let settings = Settings::load().map_err(ProvisionError::Settings)?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Settings) -> Result<Self, ProvisionError> {
        let runtime = ContainerRuntime::from_name(settings.runtime);
        Self::with_runtime(runtime, settings)
    }
}

impl<R: ContainerRuntimeInterface> Harness<R> {
    /// Build a harness around `runtime`, populating the image cache.
    /// Fails if the runtime cannot list its local images.
    pub fn with_runtime(runtime: R, settings: Settings) -> Result<Self, ProvisionError> {
        let cache = ImageCache::new();
        let count = cache.refresh(&runtime).map_err(ProvisionError::CacheQuery)?;
        tracing::debug!("Harness ready, {} images available locally", count);
        Ok(Self {
            runtime: Arc::new(runtime),
            cache,
            settings,
            reporter: Arc::new(LibtestReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn with_shared_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// Provision `decls`, returning every failure as an error.
    ///
    /// No container is created before all pulls have finished. If an
    /// infrastructure step fails after some containers started, those are
    /// torn down before the error is returned. A failing readiness callback
    /// also tears the containers down and yields [`ProvisionError::Ready`].
    pub fn provision(&self, decls: Vec<ContainerDecl>) -> Result<Fixture<R>, ProvisionError> {
        let images = decls
            .iter()
            .map(|decl| {
                decl.image().map_err(|source| ProvisionError::InvalidImage {
                    name: decl.name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<ImageRef>, _>>()?;

        pull::pull_missing(
            self.runtime.as_ref(),
            &self.cache,
            &images,
            self.reporter.as_ref(),
        )?;

        let mut fixture = Fixture::new(
            self.runtime.clone(),
            self.reporter.clone(),
            self.settings.stop_timeout(),
            self.settings.remove_on_close,
        );
        let mut allocator = PortAllocator::new();
        let mut max_delay = Duration::ZERO;
        let mut callbacks = Vec::new();

        for (decl, image) in decls.into_iter().zip(images) {
            let container = match provision::provision_one(
                self.runtime.as_ref(),
                &self.settings,
                self.reporter.as_ref(),
                &mut allocator,
                &decl,
                &image,
            ) {
                Ok(container) => container,
                Err(e) => {
                    let _ = fixture.close();
                    return Err(e);
                }
            };
            fixture.push(container);

            max_delay = max_delay.max(decl.ready_delay);
            if let Some(on_ready) = decl.on_ready {
                callbacks.push((image, on_ready));
            }
        }

        if !max_delay.is_zero() {
            tracing::debug!("Waiting {:?} for containers to become ready", max_delay);
            std::thread::sleep(max_delay);
        }

        for (image, on_ready) in callbacks {
            if let Err(source) = on_ready(fixture.port_mappings()) {
                let _ = fixture.close();
                return Err(ReadyError {
                    image: image.identity(),
                    source,
                }
                .into());
            }
        }

        Ok(fixture)
    }

    /// Provision `decls`. Infrastructure failures are reported through
    /// `Reporter::fatal`; only a readiness-callback failure is returned.
    pub fn with_container_cfgs(&self, decls: Vec<ContainerDecl>) -> Result<Fixture<R>, ReadyError> {
        match self.provision(decls) {
            Ok(fixture) => Ok(fixture),
            Err(ProvisionError::Ready(e)) => Err(e),
            Err(e) => self.reporter.fatal(&e.to_string()),
        }
    }

    /// Provision containers by name using the harness defaults for ready
    /// delay and port randomization.
    pub fn with_containers<S: AsRef<str>>(&self, names: &[S]) -> Fixture<R> {
        let decls = names
            .iter()
            .map(|name| ContainerDecl::with_defaults(name.as_ref(), &self.settings))
            .collect();
        match self.with_container_cfgs(decls) {
            Ok(fixture) => fixture,
            Err(e) => self.reporter.fatal(&e.to_string()),
        }
    }

    /// Log every container created by this tool that the runtime still knows.
    pub fn dump_running(&self) {
        let mut states: Vec<_> = self
            .runtime
            .running_containers(&self.settings.name_prefix)
            .into_iter()
            .collect();
        states.sort();
        for (name, running) in states {
            let state = if running { "running" } else { "stopped" };
            self.reporter.log(&format!("Running {name} ({state})"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::fake::{Call, FakeRuntime};
    use crate::report::RecordingReporter;

    fn harness(runtime: FakeRuntime) -> (Harness<FakeRuntime>, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::new());
        let harness = Harness::with_runtime(runtime, Settings::default())
            .unwrap()
            .with_shared_reporter(reporter.clone());
        (harness, reporter)
    }

    #[test]
    fn test_with_runtime_fails_when_images_cannot_be_listed() {
        let result = Harness::with_runtime(FakeRuntime::new().fail_list_images(), Settings::default());
        assert!(matches!(result, Err(ProvisionError::CacheQuery(_))));
    }

    #[test]
    fn test_with_runtime_populates_cache() {
        let (harness, _) = harness(FakeRuntime::new().with_local_image("redis:6", &["6379/tcp"]));
        assert!(harness.cache().contains("redis:6"));
    }

    #[test]
    fn test_provision_rejects_empty_name_before_any_runtime_call() {
        let (harness, _) = harness(FakeRuntime::new());
        let err = harness.provision(vec![ContainerDecl::new("")]).unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidImage { .. }));
        assert_eq!(harness.runtime().calls(), vec![Call::ListLocalImages]);
    }

    #[test]
    fn test_later_failure_tears_down_earlier_containers() {
        let (harness, _) = harness(
            FakeRuntime::new()
                .with_local_image("redis:6", &["6379/tcp"])
                .with_local_image("postgres:13", &["5432/tcp"])
                .fail_create("postgres:13"),
        );

        let err = harness
            .provision(vec![
                ContainerDecl::new("redis:6"),
                ContainerDecl::new("postgres:13"),
            ])
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Create { .. }));
        assert!(harness.runtime().running_containers("itt-").is_empty());
    }

    #[test]
    fn test_dump_running_lists_prefixed_containers() {
        let (harness, reporter) =
            harness(FakeRuntime::new().with_local_image("redis:6", &["6379/tcp"]));
        let fixture = harness.provision(vec![ContainerDecl::new("redis:6")]).unwrap();

        harness.dump_running();

        let name = &fixture.containers()[0].name;
        assert!(reporter
            .logs()
            .contains(&format!("Running {name} (running)")));
        fixture.close().unwrap();
    }
}
