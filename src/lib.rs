//! sshterm - interactive remote-shell session management
//!
//! sshterm bridges one secure remote-shell connection to a terminal
//! emulator supplied by the host application. It owns the session
//! lifecycle: connect and authenticate, allocate a pty, start a shell,
//! pump the shell's output through a bounded queue to the emulator, and
//! tear everything down in order when the session ends.
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Transport        (connect / auth / pty / shell byte streams)
//! ├── reader thread ── ByteQueue ── notification channel
//! └── Emulator/Screen  (host-supplied, fed on the owning task)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use sshterm::{Config, ConnectParams, Credential, Session};
//!
//! # fn transport() -> Box<dyn sshterm::Transport> { unimplemented!() }
//! # fn factory() -> Box<dyn sshterm::TerminalFactory> { unimplemented!() }
//! let params = ConnectParams::new(
//!     "shell.example.com",
//!     "user",
//!     Credential::Password("secret".to_string()),
//! );
//! let mut session = Session::connect(transport(), factory(), Config::load(), &params)?;
//!
//! // First size update creates the emulator and starts the I/O pipeline.
//! session.update_size(80, 24);
//!
//! // Event loop: drain shell output whenever the loop wakes up.
//! session.process_pending();
//!
//! session.write("ls -la\n");
//! session.finish();
//! # Ok::<(), sshterm::ConnectionError>(())
//! ```
//!
//! Rendering, input handling, and the escape-sequence interpreter live in
//! the host application; see [`Emulator`], [`Screen`] and [`Transport`] for
//! the seams.

pub mod config;
pub mod core;
pub mod emulator;
pub mod transport;

pub use config::{ActionBarMode, Color, ColorScheme, Config};
pub use crate::core::byte_queue::ByteQueue;
pub use crate::core::session::{Notification, Session};
pub use emulator::{
    Emulator, Screen, ScreenLayout, SharedOutput, SharedScreen, Terminal, TerminalFactory,
};
pub use transport::{
    Channel, ConnectParams, ConnectionError, Credential, HostKeyPolicy, PtyRequest, ShellIo,
    Transport, TransportError,
};
