//! Sequential create/start of declared containers and host-port allocation.

use std::collections::HashSet;

use rand::Rng;

use crate::config::Settings;
use crate::containers::{
    generate_name, ContainerRuntimeInterface, CreateOptions, ExposedPort, ImageRef, PortBinding,
};
use crate::report::Reporter;

use super::declaration::ContainerDecl;
use super::error::ProvisionError;
use super::handle::ProvisionedContainer;

/// Lower bound (inclusive) of randomly drawn host ports.
pub const RANDOM_PORT_MIN: u16 = 1024;
/// Upper bound (exclusive) of randomly drawn host ports.
pub const RANDOM_PORT_MAX: u16 = 65535;

/// Hands out host ports for one provisioning call.
///
/// Random draws are re-drawn when they collide with a port already handed
/// out in the same call. Ports bound by other processes are not checked.
pub struct PortAllocator<G: Rng> {
    rng: G,
    used: HashSet<String>,
}

impl PortAllocator<rand::rngs::ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::rng())
    }
}

impl Default for PortAllocator<rand::rngs::ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Rng> PortAllocator<G> {
    pub fn with_rng(rng: G) -> Self {
        Self {
            rng,
            used: HashSet::new(),
        }
    }

    pub fn random(&mut self) -> String {
        loop {
            let port = self
                .rng
                .random_range(RANDOM_PORT_MIN..RANDOM_PORT_MAX)
                .to_string();
            if self.used.insert(port.clone()) {
                return port;
            }
        }
    }

    pub fn reserve(&mut self, port: &str) {
        self.used.insert(port.to_string());
    }

    /// Bindings for one declaration. Explicit bindings win; otherwise every
    /// exposed port is bound, on the same port number or a random one.
    pub fn bindings_for(&mut self, decl: &ContainerDecl, exposed: &[ExposedPort]) -> Vec<PortBinding> {
        if !decl.port_bindings.is_empty() {
            for binding in &decl.port_bindings {
                self.reserve(&binding.host_port);
            }
            return decl.port_bindings.clone();
        }

        exposed
            .iter()
            .map(|port| {
                let host_port = if decl.random_ports {
                    self.random()
                } else {
                    self.reserve(&port.port);
                    port.port.clone()
                };
                PortBinding {
                    container_port: port.port.clone(),
                    protocol: port.protocol.clone(),
                    host_port,
                }
            })
            .collect()
    }
}

/// Inspect, create and start one container.
///
/// A container that was created but refused to start is killed and removed
/// before the error is returned, so the caller only owns started containers.
pub fn provision_one<R, G>(
    runtime: &R,
    settings: &Settings,
    reporter: &dyn Reporter,
    allocator: &mut PortAllocator<G>,
    decl: &ContainerDecl,
    image: &ImageRef,
) -> Result<ProvisionedContainer, ProvisionError>
where
    R: ContainerRuntimeInterface + ?Sized,
    G: Rng,
{
    let identity = image.identity();

    let exposed = runtime
        .inspect_exposed_ports(&identity)
        .map_err(|source| ProvisionError::Inspect {
            image: identity.clone(),
            source,
        })?;

    let port_bindings = allocator.bindings_for(decl, &exposed);

    let options = CreateOptions {
        name: generate_name(&settings.name_prefix, image),
        image: image.clone(),
        port_bindings,
    };

    let id = runtime
        .create_container(&options)
        .map_err(|source| ProvisionError::Create {
            image: identity.clone(),
            source,
        })?;
    reporter.log(&format!("Created container {identity} - {id}"));

    if let Err(source) = runtime.start_container(&id) {
        if let Err(e) = runtime.kill_container(&id) {
            tracing::warn!("Failed to kill unstartable container {}: {}", id, e);
        }
        if let Err(e) = runtime.remove_container(&id, true) {
            tracing::warn!("Failed to remove unstartable container {}: {}", id, e);
        }
        return Err(ProvisionError::Start {
            image: identity,
            id,
            source,
        });
    }

    tracing::info!("Started container {} ({}) as {}", identity, id, options.name);
    reporter.log(&format!("Started container {identity}:{id}"));

    let ports = options
        .port_bindings
        .into_iter()
        .map(|b| (b.container_port, b.host_port))
        .collect();

    Ok(ProvisionedContainer {
        id,
        name: options.name,
        image: image.clone(),
        ports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::fake::{Call, FakeRuntime};
    use crate::report::RecordingReporter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn exposed(keys: &[&str]) -> Vec<ExposedPort> {
        keys.iter().filter_map(|k| ExposedPort::parse(k)).collect()
    }

    fn seeded() -> PortAllocator<StdRng> {
        PortAllocator::with_rng(StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_fixed_ports_mirror_container_ports() {
        let mut alloc = seeded();
        let decl = ContainerDecl::new("redis:6");
        let bindings = alloc.bindings_for(&decl, &exposed(&["6379/tcp", "16379/tcp"]));

        assert_eq!(bindings.len(), 2);
        for b in &bindings {
            assert_eq!(b.container_port, b.host_port);
        }
    }

    #[test]
    fn test_random_ports_stay_in_range_and_unique() {
        let mut alloc = seeded();
        let decl = ContainerDecl::new("app").random_ports(true);
        let keys: Vec<String> = (8000..8200).map(|p| format!("{p}/tcp")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

        let bindings = alloc.bindings_for(&decl, &exposed(&keys));

        assert_eq!(bindings.len(), 200);
        let mut seen = HashSet::new();
        for b in &bindings {
            let port: u16 = b.host_port.parse().unwrap();
            assert!((RANDOM_PORT_MIN..RANDOM_PORT_MAX).contains(&port));
            assert!(seen.insert(port), "duplicate host port {port}");
        }
    }

    #[test]
    fn test_explicit_bindings_override_exposed_ports() {
        let mut alloc = seeded();
        let decl = ContainerDecl::new("nginx").random_ports(true).bind_port(80, 8080);
        let bindings = alloc.bindings_for(&decl, &exposed(&["80/tcp", "443/tcp"]));

        assert_eq!(bindings, vec![PortBinding::new(80, 8080)]);
    }

    #[test]
    fn test_random_draw_avoids_reserved_port() {
        let mut alloc = seeded();
        let first = alloc.random();
        let mut again = PortAllocator::with_rng(StdRng::seed_from_u64(7));
        again.reserve(&first);
        assert_ne!(again.random(), first);
    }

    #[test]
    fn test_provision_one_records_ports() {
        let runtime = FakeRuntime::new().with_local_image("redis:6", &["6379/tcp"]);
        let reporter = RecordingReporter::new();
        let image = ImageRef::parse("redis:6").unwrap();

        let container = provision_one(
            &runtime,
            &Settings::default(),
            &reporter,
            &mut seeded(),
            &ContainerDecl::new("redis:6"),
            &image,
        )
        .unwrap();

        assert_eq!(container.ports.get("6379").map(String::as_str), Some("6379"));
        assert!(container.name.starts_with("itt-redis-"));
        assert!(reporter
            .logs()
            .contains(&format!("Started container redis:6:{}", container.id)));
    }

    #[test]
    fn test_start_failure_kills_container_once() {
        let runtime = FakeRuntime::new()
            .with_local_image("redis:6", &["6379/tcp"])
            .fail_start("redis:6");
        let reporter = RecordingReporter::new();
        let image = ImageRef::parse("redis:6").unwrap();

        let err = provision_one(
            &runtime,
            &Settings::default(),
            &reporter,
            &mut seeded(),
            &ContainerDecl::new("redis:6"),
            &image,
        )
        .unwrap_err();

        let id = match err {
            ProvisionError::Start { id, .. } => id,
            other => panic!("expected start error, got {other:?}"),
        };
        let kills = runtime
            .calls()
            .into_iter()
            .filter(|c| *c == Call::Kill(id.clone()))
            .count();
        assert_eq!(kills, 1);
        assert_eq!(runtime.container_state(&id), None);
    }

    #[test]
    fn test_inspect_failure_stops_before_create() {
        let runtime = FakeRuntime::new()
            .with_local_image("redis:6", &["6379/tcp"])
            .fail_inspect("redis:6");
        let reporter = RecordingReporter::new();
        let image = ImageRef::parse("redis:6").unwrap();

        let err = provision_one(
            &runtime,
            &Settings::default(),
            &reporter,
            &mut seeded(),
            &ContainerDecl::new("redis:6"),
            &image,
        )
        .unwrap_err();

        assert!(matches!(err, ProvisionError::Inspect { .. }));
        assert!(!runtime
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Create { .. })));
    }
}
