use std::collections::HashMap;
use std::time::Duration;

use super::container_interface::{ContainerRuntimeInterface, CreateOptions, ExposedPort};
use super::error::Result;
use super::image::ImageRef;
use super::runtime_base::RuntimeBase;

pub struct Docker {
    base: RuntimeBase,
}

impl Default for Docker {
    fn default() -> Self {
        Self {
            base: RuntimeBase::DOCKER,
        }
    }
}

impl ContainerRuntimeInterface for Docker {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn get_docker_runtime_if_available() -> Option<Docker> {
        let docker = Docker::default();
        if !docker.is_available() || !docker.is_daemon_running() {
            None
        } else {
            Some(docker)
        }
    }

    #[test]
    fn test_docker_list_local_images_includes_pulled_image() {
        if let Some(docker) = get_docker_runtime_if_available() {
            // hello-world is a tiny image that's commonly available or quick to pull
            let image = ImageRef::parse("hello-world").unwrap();
            docker.pull_image(&image, &mut |_: &str| {}).unwrap();

            let images = docker.list_local_images().unwrap();
            assert!(images.contains(&"hello-world:latest".to_string()));
        }
    }

    #[test]
    fn test_docker_pull_nonexistent_fails() {
        if let Some(docker) = get_docker_runtime_if_available() {
            let image = ImageRef::parse("nonexistent-image-that-does-not-exist:v999").unwrap();
            assert!(docker.pull_image(&image, &mut |_: &str| {}).is_err());
        }
    }

    #[test]
    fn test_docker_inspect_nonexistent_fails() {
        if let Some(docker) = get_docker_runtime_if_available() {
            let result = docker.inspect_exposed_ports("nonexistent-image-that-does-not-exist:v999");
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_docker_stop_unknown_container_is_not_found() {
        if let Some(docker) = get_docker_runtime_if_available() {
            let result = docker.stop_container("itt-no-such-container", Duration::from_secs(1));
            assert!(matches!(
                result,
                Err(crate::containers::RuntimeError::ContainerNotFound(_))
            ));
        }
    }
}
