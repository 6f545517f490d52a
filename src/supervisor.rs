/// Single-shot supervisor: bind the liveness endpoint, launch the bot once,
/// and hand back the bot's exit code when it ends.
///
/// The lifecycle is encoded as a typestate: `Idle -> Listening ->
/// ChildRunning`, with the terminal state being the returned exit code.
/// `launch` only exists on `Supervisor<Listening>`, so the bot can never be
/// spawned before the port is bound.
use crate::bot::{self, SpawnError};
use crate::config::ShellConfig;
use crate::health;
use crate::signals::{self, TerminationSignals};
use nix::sys::signal::Signal;
use std::net::SocketAddr;
use tokio::process::Child;
use tokio::task::JoinHandle;

pub struct Supervisor<S> {
    config: ShellConfig,
    state: S,
}

/// Nothing bound, nothing running.
pub struct Idle;

/// Port bound and liveness route being served.
pub struct Listening {
    local_addr: SocketAddr,
    server: JoinHandle<std::io::Result<()>>,
}

/// Bot spawned; the liveness route is still served.
pub struct ChildRunning {
    local_addr: SocketAddr,
    server: JoinHandle<std::io::Result<()>>,
    child: Child,
    sigterm: TerminationSignals,
}

/// Errors that end the supervisor before the bot's exit can be observed.
#[derive(Debug)]
pub enum SupervisorError {
    /// Could not bind the liveness port.
    Bind {
        addr: String,
        source: std::io::Error,
    },
    /// Could not register the SIGTERM handler.
    Signals { source: std::io::Error },
    /// Could not start the bot.
    Spawn(SpawnError),
    /// Lost track of the bot while waiting for it.
    Wait { source: std::io::Error },
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::Bind { addr, source } => {
                write!(f, "failed to bind {}: {}", addr, source)
            }
            SupervisorError::Signals { source } => {
                write!(f, "failed to install signal handler: {}", source)
            }
            SupervisorError::Spawn(e) => write!(f, "{}", e),
            SupervisorError::Wait { source } => {
                write!(f, "failed waiting for bot: {}", source)
            }
        }
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::Bind { source, .. } => Some(source),
            SupervisorError::Signals { source } => Some(source),
            SupervisorError::Spawn(e) => Some(e),
            SupervisorError::Wait { source } => Some(source),
        }
    }
}

impl From<SpawnError> for SupervisorError {
    fn from(e: SpawnError) -> Self {
        SupervisorError::Spawn(e)
    }
}

/// Line logged when the bot's exit has been observed.
pub fn exit_message(code: i32) -> String {
    format!("Bot exited with code {code}")
}

impl Supervisor<Idle> {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            config,
            state: Idle,
        }
    }

    /// Bind the liveness port and start serving it in the background.
    pub async fn listen(self) -> Result<Supervisor<Listening>, SupervisorError> {
        let server_config = &self.config.server;
        let bind_err = |source| SupervisorError::Bind {
            addr: format!("{}:{}", server_config.bind, server_config.port),
            source,
        };

        let listener = health::bind(server_config).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        tracing::info!(
            port = local_addr.port(),
            "Web server serving on port {}",
            local_addr.port()
        );

        let server = tokio::spawn(health::serve(listener));
        tracing::debug!("supervisor: idle -> listening");

        Ok(Supervisor {
            config: self.config,
            state: Listening { local_addr, server },
        })
    }
}

impl Supervisor<Listening> {
    #[allow(dead_code)]
    pub fn local_addr(&self) -> SocketAddr {
        self.state.local_addr
    }

    /// Spawn the bot. SIGTERM forwarding is armed before the spawn so there
    /// is no window where a stop request would bypass the child.
    pub fn launch(self) -> Result<Supervisor<ChildRunning>, SupervisorError> {
        let Listening { local_addr, server } = self.state;

        tracing::info!(command = %self.config.bot.command, "Starting bot...");
        let launched = TerminationSignals::install()
            .map_err(|source| SupervisorError::Signals { source })
            .and_then(|sigterm| {
                let child = bot::spawn(&self.config.bot)?;
                Ok((child, sigterm))
            });

        let (child, sigterm) = match launched {
            Ok(parts) => parts,
            Err(e) => {
                server.abort();
                return Err(e);
            }
        };
        tracing::debug!(pid = ?child.id(), "supervisor: listening -> child running");

        Ok(Supervisor {
            config: self.config,
            state: ChildRunning {
                local_addr,
                server,
                child,
                sigterm,
            },
        })
    }
}

impl Supervisor<ChildRunning> {
    #[allow(dead_code)]
    pub fn local_addr(&self) -> SocketAddr {
        self.state.local_addr
    }

    /// Wait for the bot's single exit event and return the code to exit with.
    ///
    /// A failing liveness server is logged but does not end the wait; only
    /// the bot's exit is terminal.
    pub async fn wait(self) -> Result<i32, SupervisorError> {
        let ChildRunning {
            mut server,
            mut child,
            mut sigterm,
            ..
        } = self.state;
        let pid = child.id();
        let mut server_running = true;

        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.map_err(|source| SupervisorError::Wait { source })?;
                }
                Some(()) = sigterm.recv() => {
                    tracing::info!("received SIGTERM, forwarding to bot");
                    if let Some(pid) = pid {
                        if let Err(e) = signals::forward(pid, Signal::SIGTERM) {
                            tracing::debug!(pid, error = %e, "SIGTERM forward failed");
                        }
                    }
                }
                result = &mut server, if server_running => {
                    server_running = false;
                    match result {
                        Ok(Ok(())) => tracing::warn!("liveness server stopped"),
                        Ok(Err(e)) => tracing::error!(error = %e, "liveness server failed"),
                        Err(e) => tracing::error!(error = %e, "liveness server task aborted"),
                    }
                }
            }
        };

        server.abort();
        let code = bot::exit_code(status);
        tracing::info!(code, "{}", exit_message(code));
        tracing::debug!("supervisor: child running -> terminated");
        Ok(code)
    }
}

/// Full lifecycle: listen, launch, wait. Returns the bot's exit code.
pub async fn run(config: ShellConfig) -> Result<i32, SupervisorError> {
    Supervisor::new(config).listen().await?.launch()?.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BotConfig, ServerConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn config(script: &str) -> ShellConfig {
        ShellConfig {
            server: ServerConfig {
                bind: "127.0.0.1".to_string(),
                port: 0,
            },
            bot: BotConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
            },
        }
    }

    async fn http_get(addr: SocketAddr) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_exit_message() {
        assert_eq!(exit_message(0), "Bot exited with code 0");
        assert_eq!(exit_message(3), "Bot exited with code 3");
    }

    #[tokio::test]
    async fn test_run_child_exit_zero() {
        assert_eq!(run(config("exit 0")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_child_exit_three() {
        assert_eq!(run(config("exit 3")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_child_killed_by_signal_exits_zero() {
        assert_eq!(run(config("kill -KILL $$")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_endpoint_ready_before_launch() {
        let listening = Supervisor::new(config("exit 0")).listen().await.unwrap();

        let response = http_get(listening.local_addr()).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with(health::LIVENESS_BODY));

        assert_eq!(listening.launch().unwrap().wait().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_endpoint_served_while_child_runs() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("release");
        let script = format!(
            "while [ ! -e '{}' ]; do sleep 0.05; done; exit 5",
            release.display()
        );

        let running = Supervisor::new(config(&script))
            .listen()
            .await
            .unwrap()
            .launch()
            .unwrap();

        let response = http_get(running.local_addr()).await;
        assert!(response.ends_with(health::LIVENESS_BODY));

        std::fs::write(&release, "").unwrap();
        assert_eq!(running.wait().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_port_from_env_is_bound() {
        let free = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = free.local_addr().unwrap().port();
        drop(free);

        let mut cfg = config("exit 0");
        cfg.server.bind = "0.0.0.0".to_string();
        let port_value = port.to_string();
        cfg.apply_env(|key| (key == "PORT").then(|| port_value.clone()))
            .unwrap();

        let listening = Supervisor::new(cfg).listen().await.unwrap();
        assert_eq!(listening.local_addr().port(), port);

        let response = http_get(SocketAddr::from(([127, 0, 0, 1], port))).await;
        assert!(response.ends_with("Slack Bot is running!"));

        assert_eq!(listening.launch().unwrap().wait().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("launched");

        let held = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut cfg = config(&format!("touch '{}'", marker.display()));
        cfg.server.port = held.local_addr().unwrap().port();

        let err = run(cfg).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Bind { .. }));
        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mut cfg = config("exit 0");
        cfg.bot.command = "nonexistent-binary-xyz".to_string();

        let err = run(cfg).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn(_)));
        assert!(err.to_string().contains("nonexistent-binary-xyz"));
    }
}
