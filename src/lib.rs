//! Ephemeral container fixtures for integration tests.
//!
//! Declare the images a test needs, get back a [`Fixture`] that maps each
//! exposed container port to a reachable host port, and let the fixture
//! stop everything when the test is done.
//!
//! ```rust,ignore
//! use itt::Harness;
//!
//! #[test]
//! fn talks_to_redis() {
//!     let harness = Harness::new().unwrap();
//!     let fixture = harness.with_containers(&["redis:6-alpine"]);
//!     let port = fixture.host_port(6379).unwrap();
//!
//!     if let Err(e) = exercise_redis(port) {
//!         fixture.fail(format_args!("redis check failed: {e}"));
//!     }
//!     fixture.close().unwrap();
//! }
//! ```
//!
//! Failures while pulling, creating or starting containers abort the
//! current test through the harness [`Reporter`]. [`Fixture::fail`] attaches
//! the logs of every container to the failure report.

pub mod config;
pub mod containers;
pub mod fixture;
pub mod logging;
pub mod report;

pub use config::Settings;
pub use containers::{ContainerRuntime, ContainerRuntimeInterface, FakeRuntime, ImageRef};
pub use fixture::{
    ContainerDecl, Fixture, Harness, PortMappings, ProvisionError, ReadyError, TeardownError,
};
pub use report::{LibtestReporter, RecordingReporter, Reporter};
