//! Docker-backed plugin runtime.
//!
//! Per run: pull the image if missing, create a uniquely named
//! container with the serialized input as its command argument, start
//! it, wait for exit, collect both log streams, and force-remove the
//! container. Removal happens on every path once the container exists,
//! including wait/log failures, so no run leaks a container.
//!
//! No timeout is applied to the wait: the platform defines none, so a
//! plugin that never exits blocks its executor slot indefinitely.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;

use crate::outcome::ExecutionOutcome;
use crate::PluginRuntime;

/// Client for the local Docker daemon.
///
/// Safe for concurrent use: each call operates on its own container and
/// `bollard::Docker` is internally shareable, so one client serves the
/// whole executor pool.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the daemon's local defaults (`DOCKER_HOST` or the
    /// platform socket).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(RuntimeError::Daemon)?;
        Ok(Self { docker })
    }

    /// Pull `image` unless it is already present locally.
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        tracing::info!(image, "Pulling plugin image");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|source| RuntimeError::ImagePull {
                image: image.to_string(),
                source,
            })?;
        }

        Ok(())
    }

    /// Wait for the container to exit and collect its output.
    ///
    /// Split out from [`run_plugin`](PluginRuntime::run_plugin) so the
    /// caller can remove the container regardless of how this part
    /// ends.
    async fn wait_and_collect(&self, container_id: &str) -> Result<ExecutionOutcome, RuntimeError> {
        let wait_options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut wait_stream = self.docker.wait_container(container_id, Some(wait_options));
        let exit_code = match wait_stream.next().await {
            Some(Ok(response)) => response.status_code,
            // bollard reports a nonzero exit through this variant; it
            // is a normal outcome here, not a runtime failure.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => return Err(RuntimeError::Execution(e)),
            None => return Err(RuntimeError::WaitEnded),
        };

        // The container has exited, so a non-following log read drains
        // everything it wrote.
        let logs_options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut logs = self.docker.logs(container_id, Some(logs_options));
        while let Some(chunk) = logs.next().await {
            match chunk? {
                LogOutput::StdOut { message } | LogOutput::Console { message } => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdErr { message } => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdIn { .. } => {}
            }
        }

        Ok(ExecutionOutcome {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Force-remove a container, logging rather than propagating
    /// failures so cleanup can never mask the run's outcome.
    async fn remove(&self, container_id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        if let Err(e) = self.docker.remove_container(container_id, Some(options)).await {
            tracing::error!(container_id, error = %e, "Failed to remove container");
        }
    }
}

#[async_trait]
impl PluginRuntime for DockerRuntime {
    async fn run_plugin(
        &self,
        image: &str,
        input_json: &str,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        self.ensure_image(image).await?;

        let name = format!("plugrid-{}", uuid::Uuid::new_v4());
        let config = Config {
            image: Some(image.to_string()),
            // The serialized input is the container's single argument;
            // the plugin image's entrypoint receives it as argv[1].
            cmd: Some(vec![input_json.to_string()]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await?;

        tracing::debug!(image, container_id = %created.id, "Container created");

        // The container exists from here on: whatever happens below, it
        // is removed before this function returns.
        let result = async {
            self.docker
                .start_container(&created.id, None::<StartContainerOptions<String>>)
                .await?;
            self.wait_and_collect(&created.id).await
        }
        .await;

        self.remove(&created.id).await;

        if let Ok(outcome) = &result {
            tracing::debug!(
                image,
                exit_code = outcome.exit_code,
                "Container run finished",
            );
        }

        result
    }
}

/// Errors from the container runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The Docker daemon could not be reached.
    #[error("Docker daemon unavailable: {0}")]
    Daemon(#[source] bollard::errors::Error),

    /// The plugin image could not be pulled.
    #[error("Failed to pull image `{image}`: {source}")]
    ImagePull {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The daemon closed the wait stream without reporting an exit.
    #[error("Container wait stream ended without an exit status")]
    WaitEnded,

    /// Any other daemon-side failure during create/start/wait/logs.
    #[error("Container execution failed: {0}")]
    Execution(#[from] bollard::errors::Error),
}
