/// Termination forwarding.
///
/// Hosting platforms stop a service by sending SIGTERM to the top-level
/// process only. While the bot runs, the supervisor catches SIGTERM and
/// relays it to the child, then keeps waiting so the child's own exit code
/// is still the one reported. SIGINT is left at its default: a terminal
/// Ctrl-C already reaches the whole foreground process group.
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::signal::unix::{signal, SignalKind};

pub struct TerminationSignals {
    sigterm: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Register the SIGTERM handler. Takes effect immediately.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Resolve on the next SIGTERM delivered to this process.
    pub async fn recv(&mut self) -> Option<()> {
        self.sigterm.recv().await
    }
}

/// Send `sig` to `pid`. The child may already be gone, which is not an error
/// worth surfacing; callers log and move on.
pub fn forward(pid: u32, sig: Signal) -> nix::Result<()> {
    let pid = i32::try_from(pid).map_err(|_| nix::errno::Errno::ESRCH)?;
    kill(Pid::from_raw(pid), sig)
}
