//! Terminal emulator and screen contracts
//!
//! The escape-sequence interpreter and the scrollback screen live in the
//! host application; the session only feeds them. These traits capture the
//! exact surface the session touches, so any emulator can be plugged in.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::config::Color;

/// Consumer of raw shell output.
pub trait Emulator {
    /// Interpret a chunk of raw bytes. Called repeatedly with small chunks;
    /// must not block.
    fn append(&mut self, bytes: &[u8]);

    /// Resize the terminal grid.
    fn update_size(&mut self, columns: u16, rows: u16);

    /// Reset emulation state.
    fn reset(&mut self);
}

/// Scrollback-capable character grid behind an [`Emulator`].
pub trait Screen {
    fn set_default_colors(&mut self, foreground: Color, background: Color);

    /// Extract the transcript as plain text.
    fn transcript_text(&self) -> String;

    /// Release the screen's buffers.
    fn finish(&mut self);
}

/// Screen shared between the session and a renderer. All access happens on
/// the owning task.
pub type SharedScreen = Rc<RefCell<dyn Screen>>;

/// Shell output stream shared between the session's write path and the
/// emulator (for query responses). Owning task only.
pub type SharedOutput = Rc<RefCell<Box<dyn Write>>>;

/// Dimensions and default colors for a new screen.
#[derive(Clone, Debug)]
pub struct ScreenLayout {
    pub columns: u16,
    pub rows: u16,
    pub scrollback_rows: u32,
    pub foreground: Color,
    pub background: Color,
}

/// An emulator bound to its screen.
pub struct Terminal {
    pub emulator: Box<dyn Emulator>,
    pub screen: SharedScreen,
}

/// Builds the emulator/screen pair once the terminal dimensions are known.
///
/// Dimensions arrive with the first size update, not at connect time, which
/// is why construction is deferred behind this factory.
pub trait TerminalFactory {
    fn build(
        &mut self,
        layout: &ScreenLayout,
        settings: &crate::config::Config,
        output: SharedOutput,
    ) -> Terminal;
}
