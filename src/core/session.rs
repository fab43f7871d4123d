//! Remote-shell session management
//!
//! Manages one interactive session: connection setup, the background reader
//! thread, the queue drain onto the emulator, the write paths, and ordered
//! teardown.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::byte_queue::ByteQueue;
use crate::config::Config;
use crate::emulator::{Emulator, ScreenLayout, SharedOutput, SharedScreen, TerminalFactory};
use crate::transport::{
    Channel, ConnectParams, ConnectionError, PtyRequest, ShellIo, Transport,
};

/// Scrollback depth of the transcript screen.
const TRANSCRIPT_ROWS: u32 = 10_000;

/// Capacity of the queue between the reader thread and the owning task.
/// This is the sole backpressure bound of the pipeline.
const QUEUE_CAPACITY: usize = 4 * 1024;

/// Reader-thread chunk size and owning-task receive buffer size.
const BUFFER_SIZE: usize = 4 * 1024;

/// Payload-less signal meaning "the queue may have more bytes".
///
/// Notifications may coalesce; the drain always pulls everything currently
/// available, so duplicates and stragglers are harmless.
#[derive(Debug)]
pub struct Notification;

/// One interactive remote-shell session.
///
/// All public methods, the notification drain, and observer callbacks run on
/// the owning task. The only state shared with the reader thread is the
/// [`ByteQueue`] and the running flag.
pub struct Session {
    transport: Option<Box<dyn Transport>>,
    channel: Option<Box<dyn Channel>>,

    /// Shell output stream toward us; handed to the reader thread at init.
    shell_input: Option<Box<dyn Read + Send>>,
    /// Our stream toward the shell, shared with the emulator for responses.
    shell_output: Option<SharedOutput>,

    settings: Config,
    factory: Box<dyn TerminalFactory>,
    observer: Option<Box<dyn FnMut()>>,

    emulator: Option<Box<dyn Emulator>>,
    screen: Option<SharedScreen>,

    running: Arc<AtomicBool>,
    finished: bool,

    queue: Arc<ByteQueue>,
    notify_tx: Sender<Notification>,
    notify_rx: Receiver<Notification>,
    reader_thread: Option<JoinHandle<()>>,

    /// Reusable drain buffer.
    receive_buf: Vec<u8>,
    /// Reusable code-point encode scratch, re-initialized per write.
    write_char_buf: [u16; 2],
    write_byte_buf: [u8; 4],
}

impl Session {
    /// Establish a session: connect, authenticate, open a channel, allocate
    /// a pty, and start an interactive shell.
    ///
    /// On failure at any stage, everything opened so far is torn back down
    /// (best effort, failures logged) and a stage-tagged error is returned.
    /// The emulator is not created here; terminal dimensions are unknown
    /// until the first [`update_size`](Self::update_size) call.
    pub fn connect(
        mut transport: Box<dyn Transport>,
        factory: Box<dyn TerminalFactory>,
        settings: Config,
        params: &ConnectParams,
    ) -> Result<Self, ConnectionError> {
        let (channel, io) = match Self::open_shell(transport.as_mut(), &settings, params) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("session setup failed: {}", e);
                if let Err(disconnect_err) = transport.disconnect() {
                    warn!(
                        "transport disconnect error during failed setup: {}",
                        disconnect_err
                    );
                }
                return Err(e);
            }
        };

        info!("connected to {}:{} as {}", params.host, params.port, params.user);

        let (notify_tx, notify_rx) = mpsc::channel();
        Ok(Self {
            transport: Some(transport),
            channel: Some(channel),
            shell_input: Some(io.input),
            shell_output: Some(Rc::new(RefCell::new(io.output))),
            settings,
            factory,
            observer: None,
            emulator: None,
            screen: None,
            running: Arc::new(AtomicBool::new(false)),
            finished: false,
            queue: Arc::new(ByteQueue::new(QUEUE_CAPACITY)),
            notify_tx,
            notify_rx,
            reader_thread: None,
            receive_buf: vec![0u8; BUFFER_SIZE],
            write_char_buf: [0; 2],
            write_byte_buf: [0; 4],
        })
    }

    fn open_shell(
        transport: &mut dyn Transport,
        settings: &Config,
        params: &ConnectParams,
    ) -> Result<(Box<dyn Channel>, ShellIo), ConnectionError> {
        transport
            .connect(
                &params.host,
                params.port,
                &params.host_key_policy,
                params.connect_timeout,
            )
            .map_err(ConnectionError::Connect)?;
        transport
            .authenticate(&params.user, &params.credential)
            .map_err(ConnectionError::Authenticate)?;

        let mut channel = transport
            .open_channel()
            .map_err(ConnectionError::OpenChannel)?;

        let request = PtyRequest {
            term_type: settings.term_type.clone(),
            ..PtyRequest::default()
        };
        let opened = channel
            .request_pty(&request)
            .map_err(ConnectionError::RequestPty)
            .and_then(|()| channel.start_shell().map_err(ConnectionError::StartShell));
        match opened {
            Ok(io) => Ok((channel, io)),
            Err(e) => {
                if let Err(close_err) = channel.close() {
                    warn!("channel close error during failed setup: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Update the terminal size.
    ///
    /// The first call creates the emulator and screen and starts the reader
    /// thread; dimensions only become known once the observer's view is laid
    /// out. Later calls forward a resize to the emulator.
    pub fn update_size(&mut self, columns: u16, rows: u16) {
        match self.emulator.as_mut() {
            None => self.initialize_emulator(columns, rows),
            Some(emulator) => emulator.update_size(columns, rows),
        }
    }

    fn initialize_emulator(&mut self, columns: u16, rows: u16) {
        let output = match self.shell_output.as_ref() {
            Some(output) => output.clone(),
            // Already torn down.
            None => return,
        };

        debug!("initializing emulator at {}x{}", columns, rows);
        let colors = self.settings.get_color_scheme().colors();
        let layout = ScreenLayout {
            columns,
            rows,
            scrollback_rows: TRANSCRIPT_ROWS,
            foreground: colors[0],
            background: colors[2],
        };
        let terminal = self.factory.build(&layout, &self.settings, output);
        self.emulator = Some(terminal.emulator);
        self.screen = Some(terminal.screen);

        self.running.store(true, Ordering::SeqCst);
        self.start_reader();
    }

    fn start_reader(&mut self) {
        let input = match self.shell_input.take() {
            Some(input) => input,
            None => return,
        };
        let queue = self.queue.clone();
        let running = self.running.clone();
        let notify = self.notify_tx.clone();

        let handle = thread::Builder::new()
            .name("input-reader".to_string())
            .spawn(move || reader_loop(input, queue, running, notify));
        match handle {
            Ok(handle) => self.reader_thread = Some(handle),
            Err(e) => warn!("failed to spawn reader thread: {}", e),
        }
    }

    /// Drain pending notifications from the reader thread.
    ///
    /// Non-blocking; meant to be called from the owning task's event loop
    /// whenever it wakes up. Returns whether any drain was performed.
    pub fn process_pending(&mut self) -> bool {
        let mut handled = false;
        loop {
            match self.notify_rx.try_recv() {
                Ok(Notification) => {
                    // Notifications arriving after finish() are no-ops.
                    if self.running.load(Ordering::SeqCst) {
                        self.read_from_shell();
                        handled = true;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    /// Move currently queued bytes to the emulator, then notify the observer.
    ///
    /// Only touches bytes already buffered; never blocks the owning task.
    fn read_from_shell(&mut self) {
        let n = self.queue.available().min(self.receive_buf.len());
        if n > 0 {
            match self.queue.read(&mut self.receive_buf[..n]) {
                Ok(read) => {
                    if let Some(emulator) = self.emulator.as_mut() {
                        emulator.append(&self.receive_buf[..read]);
                    }
                }
                // Interrupted mid-teardown: nothing transferred this call.
                Err(_) => {}
            }
        }
        self.notify_observer();
    }

    /// Write text to the shell.
    ///
    /// Best effort: the remote side may already have exited, so failures
    /// are swallowed.
    pub fn write(&mut self, text: &str) {
        let output = match self.shell_output.as_ref() {
            Some(output) => output,
            None => return,
        };
        let mut stream = output.borrow_mut();
        if stream.write_all(text.as_bytes()).is_err() {
            return;
        }
        let _ = stream.flush();
    }

    /// Write a single code point to the shell, reusing the per-session
    /// scratch buffers. Best effort, like [`write`](Self::write).
    ///
    /// The reference encoder filled a two-slot UTF-16 scratch buffer,
    /// encoded both slots, and transmitted one byte fewer than it produced.
    /// For BMP input the dropped byte is the NUL encoded from the unused
    /// second slot, so the full UTF-8 encoding goes out; for supplementary
    /// code points the last real UTF-8 byte is lost. The byte counts are
    /// pinned by tests.
    pub fn write_code_point(&mut self, code_point: char) {
        let output = match self.shell_output.as_ref() {
            Some(output) => output.clone(),
            None => return,
        };

        // Re-initialize the scratch buffers rather than reallocating.
        self.write_char_buf = [0; 2];
        self.write_byte_buf = [0; 4];
        let units = code_point.encode_utf16(&mut self.write_char_buf).len();
        let encoded = code_point.encode_utf8(&mut self.write_byte_buf).len();
        let transmitted = if units == 1 { encoded } else { encoded - 1 };

        let mut stream = output.borrow_mut();
        if stream.write_all(&self.write_byte_buf[..transmitted]).is_err() {
            return;
        }
        let _ = stream.flush();
    }

    /// Reset the emulator and notify the observer.
    pub fn reset(&mut self) {
        if let Some(emulator) = self.emulator.as_mut() {
            emulator.reset();
        }
        self.notify_observer();
    }

    /// Apply new settings. If the session is initialized, the scheme's
    /// default colors are re-applied to the screen; otherwise the settings
    /// are picked up at emulator creation.
    pub fn update_settings(&mut self, settings: Config) {
        self.settings = settings;
        if self.emulator.is_none() {
            return;
        }
        let colors = self.settings.get_color_scheme().colors();
        if let Some(screen) = self.screen.as_ref() {
            screen.borrow_mut().set_default_colors(colors[0], colors[2]);
        }
    }

    /// Register the callback invoked after every drain (even an empty one)
    /// and after [`reset`](Self::reset).
    pub fn set_observer(&mut self, observer: Box<dyn FnMut()>) {
        self.observer = Some(observer);
    }

    /// Whether the I/O pipeline has been started and not yet finished.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The screen shared with the renderer, once initialized.
    pub fn screen(&self) -> Option<SharedScreen> {
        self.screen.clone()
    }

    /// Plain-text transcript, once initialized.
    pub fn transcript_text(&self) -> Option<String> {
        self.screen
            .as_ref()
            .map(|screen| screen.borrow().transcript_text())
    }

    /// Tear the session down. Idempotent; after the first call every I/O
    /// path is a no-op.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.running.store(false, Ordering::SeqCst);
        if let Some(screen) = self.screen.as_ref() {
            screen.borrow_mut().finish();
        }
        self.cleanup();
    }

    /// Ordered resource teardown. Every step runs even if an earlier one
    /// fails; failures are logged and never propagated.
    fn cleanup(&mut self) {
        // 1. Cancel the reader thread. The handle is dropped, not joined;
        // a read blocked in the transport unblocks once the shell closes.
        self.queue.interrupt();
        if let Some(handle) = self.reader_thread.take() {
            drop(handle);
        }

        // 2. Close the shell and drop the stream handles.
        self.shell_input = None;
        self.shell_output = None;
        if let Some(channel) = self.channel.as_mut() {
            if let Err(e) = channel.close_shell() {
                warn!("shell close error: {}", e);
            }
        }

        // 3. Close the session channel.
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close() {
                warn!("channel close error: {}", e);
            }
        }

        // 4. Disconnect the transport.
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.disconnect() {
                warn!("transport disconnect error: {}", e);
            }
        }
    }

    fn notify_observer(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.finished {
            self.running.store(false, Ordering::SeqCst);
            self.cleanup();
        }
    }
}

/// Reader-thread loop: blocking-read chunks from the shell, push them into
/// the queue (blocking there is the backpressure path), signal the owner.
///
/// EOF and errors end the loop; the session is not restarted and no
/// observer signal is raised, matching the observed reference behavior.
fn reader_loop(
    mut input: Box<dyn Read + Send>,
    queue: Arc<ByteQueue>,
    running: Arc<AtomicBool>,
    notify: Sender<Notification>,
) {
    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match input.read(&mut buffer) {
            Ok(0) => {
                // EOF -- remote process exited
                debug!("shell input stream closed");
                break;
            }
            Ok(n) => {
                if queue.write(&buffer[..n]).is_err() {
                    // Interrupted by teardown.
                    break;
                }
                if notify.send(Notification).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("reader thread error: {}", e);
                break;
            }
        }
    }
}
