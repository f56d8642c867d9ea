use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tracing::{error, instrument, trace, warn};

use crate::agent::Agent;
use crate::board::{Board, Side};
use crate::cgroup_manager::{LimitedProcess, ProcessLimits};
use crate::configuration::Configuration;
use crate::game_interface::{Capability, LaunchArgs};
use crate::turn_sandbox::{Turn, TurnError, TurnSandbox};

/// Sandbox of a process agent, connected over loopback TCP.
#[derive(Debug)]
pub struct ClientHandler {
    name: String,
    stream: TcpStream,
    process: LimitedProcess,
}

impl ClientHandler {
    const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);
    const KILL_TIMEOUT: Duration = Duration::from_secs(1);

    /// Launch a child process running `agent` within `limits` and wait for it to connect.
    ///
    /// Child process is killed on drop. Child process's cgroup is cleaned up on drop.
    #[instrument(skip_all, fields(agent = agent.name))]
    pub fn init(
        agent: &Agent,
        executable: &Path,
        side: Side,
        limits: &ProcessLimits,
        config: &Configuration,
        budget: Duration,
    ) -> anyhow::Result<ClientHandler> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .context("server error: could not create TcpListener")?;
        let port = listener.local_addr()?.port();

        let mut args = LaunchArgs { port, budget, side }.to_args();
        args.extend(agent.args.iter().cloned());

        let allow_stderr = config.debug_agent_stderr;
        let mut process = match LimitedProcess::launch(executable, &args, limits, allow_stderr) {
            Ok(process) => process,
            Err(e) if config.allow_uncontained => {
                warn!("running {} without limits: {e:#}", agent.name);
                LimitedProcess::launch_without_container(executable, &args, allow_stderr)?
            }
            Err(e) => return Err(e).context("server error: child + cgroup creation failed"),
        };

        listener
            .set_nonblocking(true)
            .context("server error: setting non-blocking to true")?;

        let deadline = Instant::now() + Self::CONNECTION_TIMEOUT;
        while Instant::now() < deadline {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream
                        .set_nonblocking(false)
                        .context("server error: setting blocking mode")?;
                    // turns are single short lines
                    let _ = stream.set_nodelay(true);
                    trace!(pid = process.id(), "agent connected");
                    return Ok(ClientHandler {
                        name: agent.name.clone(),
                        stream,
                        process,
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(e).context("server error: accepting connection"),
            }
            if process.has_exited() {
                return Err(anyhow!("agent exited before connecting"));
            }
            thread::sleep(Duration::from_millis(10));
        }

        if let Err(e) = process.try_kill(Self::KILL_TIMEOUT) {
            error!("could not kill silent agent: {e:#}");
        }
        Err(anyhow!("no connection made to server"))
    }

    /// Read one `'\n'` terminated line, giving up at `deadline`.
    fn read_line(&mut self, deadline: Instant, budget: Duration) -> Result<String, TurnError> {
        let mut line = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or(TurnError::Timeout { budget })?;
            self.stream
                .set_read_timeout(Some(remaining))
                .map_err(|e| TurnError::Failure(format!("server error: {e}")))?;

            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(TurnError::Failure("connection closed by agent".into())),
                Ok(n) => {
                    line.extend_from_slice(&chunk[..n]);
                    if let Some(end) = line.iter().position(|&b| b == b'\n') {
                        line.truncate(end);
                        return String::from_utf8(line)
                            .map_err(|_| TurnError::Failure("response is not UTF-8".into()));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TurnError::Timeout { budget })
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(TurnError::Failure(format!("I/O error: {e}"))),
            }
        }
    }

    fn exchange(
        &mut self,
        board: &Board,
        capability: Capability,
        budget: Duration,
    ) -> Result<Turn, TurnError> {
        let start = Instant::now();
        let request = format!("{capability} {board}\n");
        self.stream
            .write_all(request.as_bytes())
            .map_err(|e| TurnError::Failure(format!("could not send board: {e}")))?;

        let line = self.read_line(start + budget, budget)?;
        let elapsed = start.elapsed();
        if elapsed > budget {
            return Err(TurnError::Timeout { budget });
        }
        let column = line
            .trim()
            .parse::<usize>()
            .map_err(|_| TurnError::Failure(format!("invalid response '{}'", line.trim())))?;
        Ok(Turn { column, elapsed })
    }
}

impl TurnSandbox for ClientHandler {
    #[instrument(skip_all, fields(agent = self.name))]
    fn compute_move(
        &mut self,
        board: &Board,
        capability: Capability,
        budget: Duration,
    ) -> Result<Turn, TurnError> {
        let result = self.exchange(board, capability, budget);
        if let Err(e) = &result {
            trace!("{e}, killing agent");
            if let Err(e) = self.process.try_kill(Self::KILL_TIMEOUT) {
                error!("could not kill agent {}: {e:#}", self.name);
            }
        }
        result
    }
}
