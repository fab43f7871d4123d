//! Secure remote-shell transport abstraction
//!
//! This module defines the seam between the session core and whatever
//! SSH/transport implementation the host application links in. The session
//! drives it through a fixed sequence: connect, authenticate, open a channel,
//! request a pty, start an interactive shell, and eventually close everything
//! back down in the reverse order.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default remote port.
pub const DEFAULT_PORT: u16 = 22;

/// Deadline applied to the initial connect step.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("channel closed")]
    ChannelClosed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Error returned when session setup fails.
///
/// Each variant names the stage that failed; by the time the caller sees one
/// of these, everything opened by the earlier stages has already been torn
/// back down (best effort, failures logged).
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to connect: {0}")]
    Connect(#[source] TransportError),

    #[error("failed to authenticate: {0}")]
    Authenticate(#[source] TransportError),

    #[error("failed to open session channel: {0}")]
    OpenChannel(#[source] TransportError),

    #[error("failed to allocate pty: {0}")]
    RequestPty(#[source] TransportError),

    #[error("failed to start shell: {0}")]
    StartShell(#[source] TransportError),
}

/// Authentication credential.
///
/// Password is what the reference client used; key-file authentication is
/// the other common shape. Transports pick the variants they support.
pub enum Credential {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Credential::Password([REDACTED])"),
            Credential::PrivateKey { path, passphrase } => f
                .debug_struct("Credential::PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

/// Host-key trust policy, evaluated by the transport during connect.
///
/// `AlwaysAccept` skips verification entirely and must be an explicit
/// opt-in; it is never the default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept an unknown host on first contact, require the same key after.
    TrustOnFirstUse,
    /// Accept only the given key fingerprint.
    PinnedFingerprint(String),
    /// Accept any key without verification. Insecure.
    AlwaysAccept,
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        HostKeyPolicy::TrustOnFirstUse
    }
}

impl HostKeyPolicy {
    /// Decide whether a presented fingerprint is acceptable.
    ///
    /// `previously_seen` is the fingerprint recorded for this host on an
    /// earlier connection, if any.
    pub fn accepts(&self, fingerprint: &str, previously_seen: Option<&str>) -> bool {
        match self {
            HostKeyPolicy::TrustOnFirstUse => {
                previously_seen.map_or(true, |seen| seen == fingerprint)
            }
            HostKeyPolicy::PinnedFingerprint(pinned) => pinned == fingerprint,
            HostKeyPolicy::AlwaysAccept => true,
        }
    }
}

/// Everything needed to establish a session.
#[derive(Debug)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    pub host_key_policy: HostKeyPolicy,
    pub connect_timeout: Duration,
}

impl ConnectParams {
    pub fn new(host: impl Into<String>, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            credential,
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Pty allocation parameters, passed once at shell-open time.
#[derive(Clone, Debug)]
pub struct PtyRequest {
    pub term_type: String,
    pub columns: u16,
    pub rows: u16,
    pub pixel_width: u16,
    pub pixel_height: u16,
    /// Terminal mode map; empty in the reference client.
    pub modes: BTreeMap<String, u32>,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term_type: "ansi".to_string(),
            columns: 80,
            rows: 24,
            pixel_width: 640,
            pixel_height: 480,
            modes: BTreeMap::new(),
        }
    }
}

/// Byte streams of an open interactive shell.
///
/// `input` carries shell output toward us and is handed to the reader
/// thread, so it must be `Send`. `output` stays on the owning task.
pub struct ShellIo {
    pub input: Box<dyn Read + Send>,
    pub output: Box<dyn Write>,
}

/// A connected secure transport.
pub trait Transport {
    /// Establish the connection, verifying the host key against `policy`.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        policy: &HostKeyPolicy,
        timeout: Duration,
    ) -> Result<()>;

    /// Authenticate the given user.
    fn authenticate(&mut self, user: &str, credential: &Credential) -> Result<()>;

    /// Open a session channel on the authenticated connection.
    fn open_channel(&mut self) -> Result<Box<dyn Channel>>;

    /// Tear the connection down.
    fn disconnect(&mut self) -> Result<()>;
}

/// A session channel capable of hosting one interactive shell.
pub trait Channel {
    /// Allocate a pty on the channel.
    fn request_pty(&mut self, request: &PtyRequest) -> Result<()>;

    /// Start the interactive shell and hand back its byte streams.
    fn start_shell(&mut self) -> Result<ShellIo>;

    /// Close the shell, ending both streams.
    fn close_shell(&mut self) -> Result<()>;

    /// Close the channel itself.
    fn close(&mut self) -> Result<()>;
}
