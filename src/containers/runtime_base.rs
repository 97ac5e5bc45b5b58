use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use super::container_interface::{CreateOptions, ExposedPort};
use super::error::{Result, RuntimeError};
use super::image::ImageRef;

/// Shared implementation for CLI-driven container runtimes.
///
/// Captures the behavioral differences between runtimes (Docker, Podman)
/// as configuration, then provides a single implementation of all the shared logic.
pub(crate) struct RuntimeBase {
    /// CLI binary name (e.g., "docker", "podman")
    pub binary: &'static str,
    /// Human-readable name for log messages (e.g., "Docker", "Podman")
    pub name: &'static str,
    /// Args to check if daemon is running (e.g., ["info"])
    pub daemon_check_args: &'static [&'static str],
    /// Args preceding the image name when pulling (e.g., ["pull"] or ["image", "pull"])
    pub pull_prefix: &'static [&'static str],
    /// Subcommand for removing containers
    pub remove_subcommand: &'static str,
}

impl RuntimeBase {
    pub const DOCKER: Self = Self {
        binary: "docker",
        name: "Docker",
        daemon_check_args: &["info"],
        pull_prefix: &["pull"],
        remove_subcommand: "rm",
    };

    pub const PODMAN: Self = Self {
        binary: "podman",
        name: "Podman",
        daemon_check_args: &["info"],
        pull_prefix: &["image", "pull"],
        remove_subcommand: "rm",
    };

    pub fn command(&self) -> Command {
        Command::new(self.binary)
    }

    pub fn is_available(&self) -> bool {
        self.command()
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub fn is_daemon_running(&self) -> bool {
        self.command()
            .args(self.daemon_check_args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub fn get_version(&self) -> Result<String> {
        let output = self.command().arg("--version").output()?;

        if !output.status.success() {
            return Err(RuntimeError::NotInstalled);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Map well-known daemon failures onto dedicated variants, otherwise
    /// wrap the stderr with `fallback`.
    fn classify(&self, output: &Output, fallback: fn(String) -> RuntimeError) -> RuntimeError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!("{} stderr: {}", self.name, stderr.trim());
        if stderr.contains("permission denied") {
            return RuntimeError::PermissionDenied;
        }
        if stderr.contains("Cannot connect to the Docker daemon")
            || stderr.contains("Cannot connect to Podman")
        {
            return RuntimeError::DaemonNotRunning;
        }
        fallback(stderr.trim().to_string())
    }

    pub fn list_local_images(&self) -> Result<Vec<String>> {
        let output = self
            .command()
            .args(["images", "--format", "{{.Repository}}:{{.Tag}}"])
            .output()?;

        if !output.status.success() {
            return Err(self.classify(&output, RuntimeError::CommandFailed));
        }

        Ok(parse_image_list(&String::from_utf8_lossy(&output.stdout)))
    }

    pub fn pull_image(&self, image: &ImageRef, on_output: &mut dyn FnMut(&str)) -> Result<()> {
        let identity = image.identity();
        tracing::info!("Pulling {} image '{}'", self.name, identity);

        let mut child = self
            .command()
            .args(self.pull_prefix)
            .arg(&identity)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RuntimeError::CommandFailed("pull stdout was not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RuntimeError::CommandFailed("pull stderr was not captured".into()))?;

        // Drain stderr concurrently so a chatty pull cannot fill the pipe and stall.
        let stderr_handle = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        });

        stream_lines(BufReader::new(stdout), on_output);

        let status = child.wait()?;
        let stderr = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            if stderr.contains("not found") || stderr.contains("manifest unknown") {
                return Err(RuntimeError::ImageNotFound(format!(
                    "{}: {}",
                    identity,
                    stderr.trim()
                )));
            }
            return Err(RuntimeError::PullFailed(format!(
                "{}: {}",
                identity,
                stderr.trim()
            )));
        }

        Ok(())
    }

    pub fn inspect_exposed_ports(&self, identity: &str) -> Result<Vec<ExposedPort>> {
        let output = self
            .command()
            .args([
                "image",
                "inspect",
                "--format",
                "{{json .Config.ExposedPorts}}",
                identity,
            ])
            .output()?;

        if !output.status.success() {
            return Err(self.classify(&output, |e| {
                if e.contains("No such image") {
                    RuntimeError::ImageNotFound(e)
                } else {
                    RuntimeError::InspectFailed(e)
                }
            }));
        }

        parse_exposed_ports(&String::from_utf8_lossy(&output.stdout))
    }

    pub fn build_create_args(&self, options: &CreateOptions) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            options.name.clone(),
        ];

        for binding in &options.port_bindings {
            args.push("-p".to_string());
            args.push(binding.publish_arg());
        }

        args.push(options.image.identity());
        args
    }

    pub fn create_container(&self, options: &CreateOptions) -> Result<String> {
        let args = self.build_create_args(options);
        tracing::debug!("{} create args: {}", self.name, args.join(" "));
        let output = self.command().args(&args).output()?;

        if !output.status.success() {
            return Err(self.classify(&output, |e| {
                if e.contains("No such image") || e.contains("Unable to find image") {
                    RuntimeError::ImageNotFound(e)
                } else if e.contains("is already in use") {
                    RuntimeError::ContainerAlreadyExists(e)
                } else {
                    RuntimeError::CreateFailed(e)
                }
            }));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(container_id)
    }

    pub fn start_container(&self, id: &str) -> Result<()> {
        let output = self.command().args(["start", id]).output()?;

        if !output.status.success() {
            return Err(self.classify(&output, RuntimeError::StartFailed));
        }

        Ok(())
    }

    pub fn stop_container(&self, id: &str, timeout: Duration) -> Result<()> {
        let output = self
            .command()
            .args(["stop", "-t", &timeout.as_secs().to_string(), id])
            .output()?;

        if !output.status.success() {
            return Err(self.classify(&output, |e| not_found_or(e, RuntimeError::StopFailed)));
        }

        Ok(())
    }

    pub fn kill_container(&self, id: &str) -> Result<()> {
        let output = self.command().args(["kill", id]).output()?;

        if !output.status.success() {
            return Err(self.classify(&output, |e| not_found_or(e, RuntimeError::KillFailed)));
        }

        Ok(())
    }

    pub fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut args = vec![self.remove_subcommand.to_string()];
        if force {
            args.push("-f".to_string());
        }
        args.push(id.to_string());

        let output = self.command().args(&args).output()?;

        if !output.status.success() {
            return Err(self.classify(&output, |e| not_found_or(e, RuntimeError::RemoveFailed)));
        }

        Ok(())
    }

    pub fn fetch_logs(&self, id: &str) -> Result<String> {
        let output = self.command().args(["logs", id]).output()?;

        if !output.status.success() {
            return Err(self.classify(&output, |e| not_found_or(e, RuntimeError::LogsFailed)));
        }

        // `logs` replays the container's stdout and stderr on our own pipes.
        let mut log = String::from_utf8_lossy(&output.stdout).to_string();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(log)
    }

    pub fn running_containers(&self, prefix: &str) -> HashMap<String, bool> {
        let output = self
            .command()
            .args([
                "ps",
                "-a",
                "--filter",
                &format!("name={}", prefix),
                "--format",
                "{{.Names}}\t{{.State}}",
            ])
            .output();

        let output = match output {
            Ok(o) if o.status.success() => o,
            _ => return HashMap::new(),
        };

        parse_running_states(&String::from_utf8_lossy(&output.stdout), prefix)
    }
}

fn not_found_or(stderr: String, other: fn(String) -> RuntimeError) -> RuntimeError {
    if stderr.contains("No such container") || stderr.contains("no such container") {
        RuntimeError::ContainerNotFound(stderr)
    } else {
        other(stderr)
    }
}

/// Feed each output line to `on_output` until EOF. Invalid UTF-8 is replaced
/// rather than ending the read, so the child never sees a closed pipe.
fn stream_lines<B: BufRead>(mut reader: B, on_output: &mut dyn FnMut(&str)) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_output(line.trim_end_matches(['\r', '\n']));
            }
        }
    }
}

/// Registry prefixes podman prints that short names resolve through.
const SHORT_NAME_PREFIXES: &[&str] = &["docker.io/library/", "docker.io/", "localhost/"];

/// Every listed `repo:tag`, plus its short form when the runtime printed a
/// fully-qualified name (`docker.io/library/redis:6` is also `redis:6`).
fn parse_image_list(stdout: &str) -> Vec<String> {
    let mut images = Vec::new();
    for line in stdout.lines().map(str::trim) {
        if line.is_empty() || line.contains("<none>") {
            continue;
        }
        images.push(line.to_string());
        if let Some(short) = SHORT_NAME_PREFIXES
            .iter()
            .find_map(|prefix| line.strip_prefix(prefix))
        {
            images.push(short.to_string());
        }
    }
    images
}

/// `{{json .Config.ExposedPorts}}` prints either `null` or an object keyed by `port/proto`.
fn parse_exposed_ports(stdout: &str) -> Result<Vec<ExposedPort>> {
    let parsed: Option<HashMap<String, serde_json::Value>> =
        serde_json::from_str(stdout.trim())
            .map_err(|e| RuntimeError::InspectFailed(format!("unexpected inspect output: {e}")))?;

    let mut ports: Vec<ExposedPort> = parsed
        .unwrap_or_default()
        .keys()
        .filter_map(|key| {
            let port = ExposedPort::parse(key);
            if port.is_none() {
                tracing::warn!("Ignoring unparseable exposed port '{}'", key);
            }
            port
        })
        .collect();
    ports.sort();
    Ok(ports)
}

fn parse_running_states(stdout: &str, prefix: &str) -> HashMap<String, bool> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(2, '\t');
            let name = parts.next()?.trim();
            let state = parts.next()?.trim();
            // `--filter name=` does substring matching, so
            // post-filter to ensure we only include exact prefix matches.
            if name.is_empty() || !name.starts_with(prefix) {
                return None;
            }
            Some((name.to_string(), state == "running"))
        })
        .collect()
}
