//! Docker log source using the Engine API.

use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use bollard::Docker;
use bollard::container::{ListContainersOptions, LogOutput, LogsOptions};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::source::{ContainerEntry, ContainerList, LogSource, Tail};

/// Options for [`DockerSource::connect`].
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Include stopped containers.
    pub all_containers: bool,
    /// Ask the engine to prefix every line with its timestamp.
    pub timestamps: bool,
    /// Name or id prefix of the container to show first.
    pub initial: Option<String>,
}

/// Streams container logs from the local Docker daemon.
pub struct DockerSource {
    docker: Docker,
    runtime: Handle,
    timestamps: bool,
    containers: Mutex<ContainerList>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DockerSource {
    /// Connect to Docker and snapshot the container list.
    ///
    /// Must be called from inside a tokio runtime; streaming tasks are
    /// spawned on that runtime even when `load` is later called from a
    /// blocking thread.
    pub async fn connect(options: SourceOptions) -> Result<Self, SourceError> {
        let docker = connect_docker().await?;

        let summaries = docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: options.all_containers,
                ..Default::default()
            }))
            .await
            .map_err(|e| SourceError::ListFailed {
                reason: e.to_string(),
            })?;

        let entries = summaries
            .into_iter()
            .filter_map(|summary| {
                let id = summary.id?;
                let name = summary
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.chars().take(12).collect());
                Some(ContainerEntry::new(id, name))
            })
            .collect();

        let mut containers = ContainerList::new(entries).ok_or(SourceError::NoContainers)?;
        if let Some(ref initial) = options.initial
            && !containers.select(initial)
        {
            return Err(SourceError::ContainerNotFound {
                name: initial.clone(),
            });
        }

        tracing::info!(
            "Found {} containers, starting with '{}'",
            containers.len(),
            containers.current().name
        );

        Ok(Self {
            docker,
            runtime: Handle::current(),
            timestamps: options.timestamps,
            containers: Mutex::new(containers),
            task: Mutex::new(None),
        })
    }

    fn current(&self) -> ContainerEntry {
        match self.containers.lock() {
            Ok(list) => list.current().clone(),
            Err(poisoned) => poisoned.into_inner().current().clone(),
        }
    }

    fn with_list(&self, f: impl FnOnce(&mut ContainerList)) {
        match self.containers.lock() {
            Ok(mut list) => f(&mut list),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn replace_task(&self, task: Option<JoinHandle<()>>) {
        let previous = match self.task.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, task),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), task),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl LogSource for DockerSource {
    fn load(&self, scope: &CancellationToken, sink: File, tail: Tail) {
        let container = self.current();
        tracing::debug!("Loading logs for '{}' (tail={})", container.name, tail);

        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            timestamps: self.timestamps,
            tail: tail.as_docker_arg(),
            ..Default::default()
        };

        let task = self.runtime.spawn(stream_logs(
            self.docker.clone(),
            container,
            options,
            tokio::fs::File::from_std(sink),
            scope.clone(),
        ));
        self.replace_task(Some(task));
    }

    fn stop(&self) {
        self.replace_task(None);
    }

    fn set_prev_container(&self) {
        self.with_list(ContainerList::prev);
    }

    fn set_next_container(&self) {
        self.with_list(ContainerList::next);
    }

    fn name(&self) -> String {
        self.current().name
    }
}

impl Drop for DockerSource {
    fn drop(&mut self) {
        self.replace_task(None);
    }
}

/// Stream one container's logs into `sink`.
async fn stream_logs(
    docker: Docker,
    container: ContainerEntry,
    options: LogsOptions<String>,
    sink: tokio::fs::File,
    scope: CancellationToken,
) {
    let stream = docker.logs(&container.id, Some(options));
    copy_frames(stream, &container.name, sink, &scope).await;
}

/// Copy log frames into `sink` until cancelled, the stream ends or a write
/// fails. Returns the number of bytes written.
async fn copy_frames<S, W>(
    stream: S,
    name: &str,
    mut sink: W,
    scope: &CancellationToken,
) -> u64
where
    S: Stream<Item = Result<LogOutput, bollard::errors::Error>>,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    let mut written = 0u64;

    loop {
        tokio::select! {
            _ = scope.cancelled() => {
                tracing::debug!("Log stream for '{}' cancelled", name);
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(output)) => {
                    let bytes = output.into_bytes();
                    let result = match sink.write_all(&bytes).await {
                        Ok(()) => sink.flush().await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        tracing::debug!("Log destination for '{}' closed: {}", name, e);
                        break;
                    }
                    written += bytes.len() as u64;
                }
                Some(Err(e)) => {
                    tracing::warn!("Log stream error for '{}': {}", name, e);
                    break;
                }
                None => {
                    tracing::debug!("Log stream for '{}' ended", name);
                    break;
                }
            }
        }
    }

    written
}

/// Connect to the Docker daemon, trying the usual socket locations.
///
/// `DOCKER_HOST` and the platform default come first; after that the Docker
/// Desktop socket under the home directory and the rootless socket under
/// `XDG_RUNTIME_DIR` are tried.
pub async fn connect_docker() -> Result<Docker, SourceError> {
    let mut last_error = match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => return Ok(docker),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        let Some(path) = socket.to_str() else {
            continue;
        };
        match Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION) {
            Ok(docker) => match docker.ping().await {
                Ok(_) => {
                    tracing::debug!("Connected to Docker via {}", path);
                    return Ok(docker);
                }
                Err(e) => last_error = e.to_string(),
            },
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(SourceError::DockerNotAvailable { reason: last_error })
}

fn fallback_sockets() -> Vec<PathBuf> {
    sockets_for(std::env::var_os("HOME"), std::env::var_os("XDG_RUNTIME_DIR"))
}

fn sockets_for(home: Option<OsString>, runtime_dir: Option<OsString>) -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Some(home) = home {
        sockets.push(PathBuf::from(home).join(".docker/run/docker.sock"));
    }
    if let Some(runtime_dir) = runtime_dir {
        sockets.push(PathBuf::from(runtime_dir).join("docker.sock"));
    }
    sockets
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::Bytes;
    use futures::stream;
    use tokio_test::io::Builder;

    use super::*;

    type Frame = Result<LogOutput, bollard::errors::Error>;

    fn stdout(line: &'static str) -> Frame {
        Ok(LogOutput::StdOut {
            message: Bytes::from_static(line.as_bytes()),
        })
    }

    #[tokio::test]
    async fn test_copy_frames_writes_stdout_and_stderr() {
        let frames = stream::iter(vec![
            stdout("one\n"),
            Ok(LogOutput::StdErr {
                message: Bytes::from_static(b"two\n"),
            }),
        ]);
        let sink = Builder::new().write(b"one\n").write(b"two\n").build();

        let written = copy_frames(frames, "api", sink, &CancellationToken::new()).await;

        assert_eq!(written, 8);
    }

    #[tokio::test]
    async fn test_copy_frames_stops_on_stream_error() {
        let frames = stream::iter(vec![
            stdout("one\n"),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "boom".to_string(),
            }),
            stdout("never\n"),
        ]);
        let sink = Builder::new().write(b"one\n").build();

        let written = copy_frames(frames, "api", sink, &CancellationToken::new()).await;

        assert_eq!(written, 4);
    }

    #[tokio::test]
    async fn test_copy_frames_stops_when_sink_fails() {
        let frames = stream::iter(vec![stdout("one\n"), stdout("two\n")]);
        let sink = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            .build();

        let written = copy_frames(frames, "api", sink, &CancellationToken::new()).await;

        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_copy_frames_honours_cancelled_scope() {
        let scope = CancellationToken::new();
        scope.cancel();

        let sink = Builder::new().build();
        let written = copy_frames(stream::pending::<Frame>(), "api", sink, &scope).await;

        assert_eq!(written, 0);
    }

    #[test]
    fn test_fallback_sockets_follow_home_then_runtime_dir() {
        let sockets = sockets_for(Some("/home/ada".into()), Some("/run/user/1000".into()));
        assert_eq!(
            sockets,
            vec![
                PathBuf::from("/home/ada/.docker/run/docker.sock"),
                PathBuf::from("/run/user/1000/docker.sock"),
            ]
        );
        assert!(sockets_for(None, None).is_empty());
    }
}
