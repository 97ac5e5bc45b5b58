use std::collections::HashMap;
use std::time::Duration;

use super::container_interface::{ContainerRuntimeInterface, CreateOptions, ExposedPort};
use super::error::Result;
use super::image::ImageRef;
use super::runtime_base::RuntimeBase;

pub struct Podman {
    base: RuntimeBase,
}

impl Default for Podman {
    fn default() -> Self {
        Self {
            base: RuntimeBase::PODMAN,
        }
    }
}

impl ContainerRuntimeInterface for Podman {
    fn is_available(&self) -> bool {
        self.base.is_available()
    }

    fn is_daemon_running(&self) -> bool {
        self.base.is_daemon_running()
    }

    fn get_version(&self) -> Result<String> {
        self.base.get_version()
    }

    fn list_local_images(&self) -> Result<Vec<String>> {
        self.base.list_local_images()
    }

    fn pull_image(&self, image: &ImageRef, on_output: &mut dyn FnMut(&str)) -> Result<()> {
        self.base.pull_image(image, on_output)
    }

    fn inspect_exposed_ports(&self, identity: &str) -> Result<Vec<ExposedPort>> {
        self.base.inspect_exposed_ports(identity)
    }

    fn create_container(&self, options: &CreateOptions) -> Result<String> {
        self.base.create_container(options)
    }

    fn start_container(&self, id: &str) -> Result<()> {
        self.base.start_container(id)
    }

    fn stop_container(&self, id: &str, timeout: Duration) -> Result<()> {
        self.base.stop_container(id, timeout)
    }

    fn kill_container(&self, id: &str) -> Result<()> {
        self.base.kill_container(id)
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.base.remove_container(id, force)
    }

    fn fetch_logs(&self, id: &str) -> Result<String> {
        self.base.fetch_logs(id)
    }

    fn running_containers(&self, prefix: &str) -> HashMap<String, bool> {
        self.base.running_containers(prefix)
    }
}
