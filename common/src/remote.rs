/*! Executing commands on the target device.

The target is reached over SSH using password authentication. A session is
opened per trial attempt and closed when it is dropped, whatever path the
trial takes.
 */

use std::error;
use std::fmt;
use std::fmt::{Debug, Display};
use std::io;
use std::io::{ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;
use ssh2::{Channel, Session};

/// Remote execution result type.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors from reaching or driving the target.
#[derive(Debug)]
pub enum RemoteError {
    /// Session could not be established (unreachable, handshake, authentication).
    Connection(String),
    /// Established session failed while running a command.
    Session(String),
}

impl error::Error for RemoteError {}

impl Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RemoteError::Connection(ref msg) => write!(f, "connection error: {}", msg),
            RemoteError::Session(ref msg) => write!(f, "remote session error: {}", msg),
        }
    }
}

/// Login details for the target.
#[derive(Clone, Deserialize, PartialEq)]
pub struct Credentials {
    pub hostname: String,
    pub username: String,
    pub password: String,
    #[serde(default = "Credentials::default_port")]
    pub port: u16,
}

impl Credentials {
    fn default_port() -> u16 {
        22
    }

    /// Returns `user@host:port` for display.
    pub fn destination(&self) -> String {
        format!("{}@{}:{}", self.username, self.hostname, self.port)
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Buffered outcome of one remote command.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionResult {
    pub exit_status: i32,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl SessionResult {
    /// Create a result from whole captured streams.
    pub fn new(exit_status: i32, stdout: &str, stderr: &str) -> SessionResult {
        SessionResult {
            exit_status,
            stdout_lines: stdout.lines().map(str::to_string).collect(),
            stderr_lines: stderr.lines().map(str::to_string).collect(),
        }
    }

    /// Returns a description of the failure if the command exited non-zero.
    pub fn failure(&self) -> Option<CommandFailure> {
        if self.exit_status == 0 {
            None
        } else {
            Some(CommandFailure {
                exit_status: self.exit_status,
                stderr_lines: self.stderr_lines.clone(),
            })
        }
    }
}

/** A remote command that exited non-zero.

This is diagnostic information, not an error: trial processing continues.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct CommandFailure {
    pub exit_status: i32,
    pub stderr_lines: Vec<String>,
}

impl Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "command exited with status {}", self.exit_status)?;
        if let Some(last) = self.stderr_lines.last() {
            write!(f, " ({})", last)?;
        }

        Ok(())
    }
}

/// An open session on the target.
pub trait RemoteSession {
    /// Run a command to completion and collect its exit status and output.
    fn execute(&mut self, command: &str) -> Result<SessionResult>;
}

/// Opens sessions on the target.
pub trait Connector: Debug {
    /// Establish a new session. The session is closed when dropped.
    fn open(&self) -> Result<Box<dyn RemoteSession>>;
}

/// Password-authenticated SSH connector.
#[derive(Debug)]
pub struct SshConnector {
    credentials: Credentials,
    connect_timeout: Duration,
}

impl SshConnector {
    const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a connector for the given target.
    pub fn new(credentials: Credentials) -> SshConnector {
        SshConnector {
            credentials,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound how long establishing the TCP connection may take.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> SshConnector {
        self.connect_timeout = timeout;
        self
    }

    fn connect_tcp(&self) -> Result<TcpStream> {
        let creds = &self.credentials;
        let addrs = (creds.hostname.as_str(), creds.port).to_socket_addrs()
            .map_err(|e| RemoteError::Connection(format!("cannot resolve '{}': {}", creds.hostname, e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        let reason = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses".to_string());
        Err(RemoteError::Connection(format!("cannot reach {}: {}", creds.destination(), reason)))
    }
}

impl Connector for SshConnector {
    fn open(&self) -> Result<Box<dyn RemoteSession>> {
        info!("remote: connecting to {}", self.credentials.destination());
        let tcp = self.connect_tcp()?;

        let mut session = Session::new()
            .map_err(|e| RemoteError::Connection(format!("cannot create session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session.handshake()
            .map_err(|e| RemoteError::Connection(format!("handshake failed: {}", e)))?;
        session.userauth_password(&self.credentials.username, &self.credentials.password)
            .map_err(|e| RemoteError::Connection(format!("authentication failed: {}", e)))?;
        if !session.authenticated() {
            return Err(RemoteError::Connection("authentication rejected".to_string()));
        }
        info!("remote: connection established");

        Ok(Box::new(SshSession { session }))
    }
}

struct SshSession {
    session: Session,
}

impl SshSession {
    fn run(&mut self, command: &str) -> std::result::Result<SessionResult, String> {
        let mut channel = self.session.channel_session()
            .map_err(|e| format!("cannot open channel: {}", e))?;
        channel.exec(command)
            .map_err(|e| format!("exec failed: {}", e))?;

        // Both streams are drained together so neither can fill the channel window.
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        self.session.set_blocking(false);
        let drained = drain(&mut channel, &mut stdout, &mut stderr);
        self.session.set_blocking(true);
        drained.map_err(|e| format!("reading output failed: {}", e))?;

        channel.wait_close()
            .map_err(|e| format!("waiting for close failed: {}", e))?;
        let exit_status = channel.exit_status()
            .map_err(|e| format!("no exit status: {}", e))?;

        Ok(SessionResult::new(exit_status,
                              &String::from_utf8_lossy(&stdout),
                              &String::from_utf8_lossy(&stderr)))
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Read stdout and stderr of a non-blocking channel until it reaches EOF.
fn drain(channel: &mut Channel, stdout: &mut Vec<u8>, stderr: &mut Vec<u8>) -> io::Result<()> {
    let mut buffer = [0u8; 8192];
    loop {
        let mut progressed = read_available(channel, &mut buffer, stdout)?;
        progressed |= read_available(&mut channel.stderr(), &mut buffer, stderr)?;

        if !progressed {
            if channel.eof() {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Move whatever `source` has ready into `sink`; `true` if anything was read.
fn read_available<R: Read>(source: &mut R, buffer: &mut [u8], sink: &mut Vec<u8>) -> io::Result<bool> {
    match source.read(buffer) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buffer[..n]);
            Ok(true)
        },
        Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

impl RemoteSession for SshSession {
    fn execute(&mut self, command: &str) -> Result<SessionResult> {
        debug!("remote: running '{}'", command);
        self.run(command)
            .map_err(|e| RemoteError::Session(format!("'{}': {}", command, e)))
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        match self.session.disconnect(None, "done", None) {
            Ok(()) => info!("remote: connection closed"),
            Err(e) => debug!("remote: disconnect failed: {}", e),
        }
    }
}
