// file: src/network/ssh.rs
// version: 2.1.0
// guid: t0u1v2w3-x4y5-6789-0123-456789tuvwxy

//! SSH client for remote provisioning operations

use super::executor::{CommandOutput, Connector, RemoteExecutor};
use crate::config::NodeConnection;
use crate::error::{ConnectionFailure, ProvisionError};
use crate::Result;
use ssh2::Session;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// libssh2 reports timeouts with this session error code
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// SSH client bound to a single node
pub struct SshClient {
    session: Option<Session>,
    node: String,
}

impl SshClient {
    /// Connect and authenticate with the node's password
    pub fn connect(node: &NodeConnection, timeout: Duration) -> Result<Self> {
        let label = node.to_string();
        info!("Connecting to {}", label);

        let tcp = open_tcp(node, timeout)?;

        let mut session = Session::new().map_err(|e| {
            ProvisionError::connection(&label, ConnectionFailure::Protocol, e.to_string())
        })?;
        session.set_tcp_stream(tcp);
        session.set_timeout(millis(timeout));

        session.handshake().map_err(|e| {
            let kind = if is_timeout(&e) {
                ConnectionFailure::TimedOut
            } else {
                ConnectionFailure::Protocol
            };
            ProvisionError::connection(&label, kind, format!("handshake failed: {}", e))
        })?;

        session
            .userauth_password(&node.user, &node.password)
            .map_err(|e| {
                let kind = if is_timeout(&e) {
                    ConnectionFailure::TimedOut
                } else {
                    ConnectionFailure::AuthenticationFailed
                };
                ProvisionError::connection(
                    &label,
                    kind,
                    format!("check the user name and password ({})", e.message()),
                )
            })?;

        if !session.authenticated() {
            return Err(ProvisionError::connection(
                &label,
                ConnectionFailure::AuthenticationFailed,
                "server did not accept the credentials",
            ));
        }

        debug!("SSH connection established to {}", label);
        Ok(Self {
            session: Some(session),
            node: label,
        })
    }

    fn run(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let node = self.node.clone();
        let session = self.session.as_mut().ok_or_else(|| {
            ProvisionError::connection(&node, ConnectionFailure::Protocol, "no active SSH session")
        })?;
        session.set_timeout(millis(timeout));

        let timed_out = || ProvisionError::CommandTimeout {
            node: node.clone(),
            timeout_secs: timeout.as_secs(),
        };
        let channel_err = |e: ssh2::Error| -> ProvisionError {
            if is_timeout(&e) {
                timed_out()
            } else {
                ProvisionError::connection(&node, ConnectionFailure::Protocol, e.to_string())
            }
        };

        let mut channel = session.channel_session().map_err(&channel_err)?;
        channel.exec(command).map_err(&channel_err)?;

        session.set_blocking(false);
        let drained = drain_streams(&mut channel, Instant::now() + timeout);
        session.set_blocking(true);
        let (stdout, stderr) = drained.map_err(|e| {
            if e.kind() == io::ErrorKind::TimedOut {
                timed_out()
            } else {
                ProvisionError::connection(
                    &node,
                    ConnectionFailure::Protocol,
                    format!("failed to read command output: {}", e),
                )
            }
        })?;

        channel.wait_close().map_err(&channel_err)?;
        let exit_code = channel.exit_status().map_err(&channel_err)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    /// Disconnect SSH session
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "", None);
            debug!("SSH session to {} disconnected", self.node);
        }
    }
}

#[async_trait::async_trait]
impl RemoteExecutor for SshClient {
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let output = self.run(command, timeout)?;
        if !output.success() {
            debug!("Command on {} exited with {}", self.node, output.exit_code);
        }
        Ok(output)
    }

    fn disconnect(&mut self) {
        self.close();
    }
}

impl Drop for SshClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connector that opens a fresh SSH session for every call
#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait::async_trait]
impl Connector for SshConnector {
    async fn connect(&self, node: &NodeConnection) -> Result<Box<dyn RemoteExecutor>> {
        let client = SshClient::connect(node, self.connect_timeout)?;
        Ok(Box::new(client))
    }
}

fn open_tcp(node: &NodeConnection, timeout: Duration) -> Result<TcpStream> {
    let label = node.to_string();
    let port = u16::try_from(node.port).map_err(|_| {
        ProvisionError::connection(
            &label,
            ConnectionFailure::HostUnreachable,
            format!("invalid port {}", node.port),
        )
    })?;

    let addrs: Vec<SocketAddr> = (node.host.trim(), port)
        .to_socket_addrs()
        .map_err(|e| {
            ProvisionError::connection(
                &label,
                ConnectionFailure::HostUnreachable,
                format!("cannot resolve {}: {}", node.host, e),
            )
        })?
        .collect();

    let mut last_error = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                warn!("Connection to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) if e.kind() == io::ErrorKind::TimedOut => ProvisionError::connection(
            &label,
            ConnectionFailure::TimedOut,
            format!("no response within {}s", timeout.as_secs()),
        ),
        Some(e) => ProvisionError::connection(
            &label,
            ConnectionFailure::HostUnreachable,
            format!("check that the host is reachable and sshd is running ({})", e),
        ),
        None => ProvisionError::connection(
            &label,
            ConnectionFailure::HostUnreachable,
            format!("{} resolved to no addresses", node.host),
        ),
    })
}

fn is_timeout(error: &ssh2::Error) -> bool {
    matches!(error.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT))
}

fn millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Both output streams of a running remote command
trait OutputStreams {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Remote side has closed its output
    fn finished(&self) -> bool;
}

impl OutputStreams for ssh2::Channel {
    fn read_stdout(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn read_stderr(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stderr().read(buf)
    }

    fn finished(&self) -> bool {
        self.eof()
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Read stdout and stderr in turns from a non-blocking channel.
///
/// Neither stream may stall the other, a full stderr window would
/// otherwise block the remote command.
fn drain_streams<S: OutputStreams>(
    streams: &mut S,
    deadline: Instant,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; 16 * 1024];

    loop {
        let read = streams.read_stdout(&mut buf);
        let mut progressed = collect(read, &buf, &mut stdout)?;
        let read = streams.read_stderr(&mut buf);
        progressed += collect(read, &buf, &mut stderr)?;

        if progressed > 0 {
            continue;
        }
        if streams.finished() {
            return Ok((stdout, stderr));
        }
        if Instant::now() >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "command did not finish in time",
            ));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn collect(read: io::Result<usize>, buf: &[u8], sink: &mut Vec<u8>) -> io::Result<usize> {
    match read {
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}
