//! Integration tests against a real Docker daemon
//!
//! These tests validate the fixture lifecycle end to end:
//! - Pulling a missing image and publishing its exposed ports
//! - Reaching the container through the mapped host port
//! - Container cleanup on close

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use itt::config::ContainerRuntimeName;
use itt::{
    ContainerDecl, ContainerRuntime, ContainerRuntimeInterface, Harness, RecordingReporter,
    Settings,
};

fn docker_available() -> bool {
    let runtime = ContainerRuntime::from_name(ContainerRuntimeName::Docker);
    runtime.is_available() && runtime.is_daemon_running()
}

fn docker_harness() -> (Harness, Arc<RecordingReporter>) {
    itt::logging::init_for_tests();
    let reporter = Arc::new(RecordingReporter::new());
    let settings = Settings {
        runtime: ContainerRuntimeName::Docker,
        ..Settings::default()
    };
    let harness = Harness::from_settings(settings)
        .unwrap()
        .with_shared_reporter(reporter.clone());
    (harness, reporter)
}

fn redis_ping(port: u16) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    stream.write_all(b"PING\r\n")?;
    let mut buf = [0u8; 16];
    let n = stream.read(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

#[test]
#[ignore = "requires Docker daemon"]
fn test_redis_fixture_lifecycle() {
    if !docker_available() {
        eprintln!("Skipping: Docker not available");
        return;
    }

    let (harness, reporter) = docker_harness();
    let fixture = harness
        .with_container_cfgs(vec![ContainerDecl::new("redis:6-alpine")
            .random_ports(true)
            .ready_delay(Duration::from_secs(1))
            .on_ready(|ports| {
                let port: u16 = ports["6379"].parse()?;
                let reply = redis_ping(port)?;
                if reply.starts_with("+PONG") {
                    Ok(())
                } else {
                    Err(format!("unexpected reply {reply:?}").into())
                }
            })])
        .unwrap();

    assert!(harness.cache().contains("redis:6-alpine"));
    let id = fixture.ids()[0].to_string();
    let name = fixture.containers()[0].name.clone();
    assert!(harness.runtime().running_containers("itt-")[&name]);

    fixture.close().unwrap();
    assert!(reporter.errors().is_empty());
    assert!(!harness.runtime().running_containers("itt-").contains_key(&name));
    assert!(harness.runtime().fetch_logs(&id).is_err());
}

#[test]
#[ignore = "requires Docker daemon"]
fn test_unknown_image_is_fatal() {
    if !docker_available() {
        eprintln!("Skipping: Docker not available");
        return;
    }

    let (harness, reporter) = docker_harness();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        harness.with_containers(&["itt-does-not-exist/nothing:0"])
    }));

    assert!(result.is_err());
    let fatals = reporter.fatals();
    assert_eq!(fatals.len(), 1);
    assert!(fatals[0].contains("Failed to pull image"));
}
