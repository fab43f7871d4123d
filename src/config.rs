//! Configuration and color scheme management for sshterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.sshterm/config.toml`
//! - Built-in color schemes (default, solarized-dark, monokai, nord)
//! - The command tokenizer used by the local-shell mode
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.sshterm/config.toml`:
//!
//! ```toml
//! # Local shell command (optional, used by the local-shell mode)
//! shell = "/bin/bash -l"
//!
//! # Terminal type requested at pty allocation
//! term_type = "ansi"
//!
//! # Color scheme: default, solarized-dark, monokai, nord
//! color_scheme = "nord"
//!
//! # Action bar: none, always-visible, hides
//! action_bar = "hides"
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local shell command line (alternative local-shell mode)
    pub shell: Option<String>,
    /// Terminal type string requested at pty allocation
    pub term_type: String,
    /// Color scheme name
    pub color_scheme: String,
    /// UI action bar behavior
    pub action_bar: ActionBarMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            term_type: "ansi".to_string(),
            color_scheme: "default".to_string(),
            action_bar: ActionBarMode::None,
        }
    }
}

/// Action bar display mode (host UI concern, carried in settings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionBarMode {
    None,
    AlwaysVisible,
    Hides,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::get_config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let sshterm_dir = home.join(".sshterm");
            if !sshterm_dir.exists() {
                let _ = fs::create_dir_all(&sshterm_dir);
            }
            return Some(sshterm_dir.join("config.toml"));
        }
        None
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Color scheme definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,
    pub foreground: Color,
    pub cursor: Color,
    pub background: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Default color scheme
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),
            foreground: Color::new(204, 204, 204),
            cursor: Color::new(255, 255, 255),
            background: Color::new(0, 0, 0),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),
            foreground: Color::new(131, 148, 150),
            cursor: Color::new(147, 161, 161),
            background: Color::new(0, 43, 54),
        }
    }

    /// Monokai scheme
    pub fn monokai() -> Self {
        Self {
            name: "monokai".to_string(),
            foreground: Color::new(248, 248, 242),
            cursor: Color::new(253, 151, 31),
            background: Color::new(39, 40, 34),
        }
    }

    /// Nord scheme
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            foreground: Color::new(216, 222, 233),
            cursor: Color::new(136, 192, 208),
            background: Color::new(46, 52, 64),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "monokai" => Self::monokai(),
            "nord" => Self::nord(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["default", "solarized-dark", "monokai", "nord"]
    }

    /// The scheme as the 3-element array the screen setup consumes:
    /// `[0]` foreground, `[1]` cursor, `[2]` background.
    pub fn colors(&self) -> [Color; 3] {
        [self.foreground, self.cursor, self.background]
    }
}

/// Split a command line into arguments, honoring double-quoted segments.
///
/// Whitespace outside quotes separates tokens. A `"` toggles quoting and is
/// not included in the output. Inside quotes, `\` escapes the following
/// character (the backslash is dropped, the character kept verbatim). An
/// unterminated quote keeps everything up to end-of-string. A trailing token
/// is only emitted when non-empty.
pub fn split_command(cmd: &str) -> Vec<String> {
    enum State {
        Plain,
        Whitespace,
        InQuote,
    }

    let mut state = State::Whitespace;
    let mut result = Vec::new();
    let mut token = String::new();
    let mut chars = cmd.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Plain => {
                if c.is_whitespace() {
                    result.push(std::mem::take(&mut token));
                    state = State::Whitespace;
                } else if c == '"' {
                    state = State::InQuote;
                } else {
                    token.push(c);
                }
            }
            State::Whitespace => {
                if c.is_whitespace() {
                    // skip
                } else if c == '"' {
                    state = State::InQuote;
                } else {
                    token.push(c);
                    state = State::Plain;
                }
            }
            State::InQuote => {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        token.push(escaped);
                    }
                } else if c == '"' {
                    state = State::Plain;
                } else {
                    token.push(c);
                }
            }
        }
    }

    if !token.is_empty() {
        result.push(token);
    }
    result
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic_quoting() {
        assert_eq!(
            split_command(r#"ls -la "my file.txt""#),
            vec!["ls", "-la", "my file.txt"]
        );
    }

    #[test]
    fn test_split_escaped_quote() {
        assert_eq!(split_command(r#"echo "a\"b""#), vec!["echo", r#"a"b"#]);
    }

    #[test]
    fn test_split_unterminated_quote() {
        assert_eq!(
            split_command(r#""unterminated arg"#),
            vec!["unterminated arg"]
        );
        // A lone quote has no content to keep.
        assert_eq!(split_command(r#"""#), Vec::<String>::new());
    }

    #[test]
    fn test_split_empty_and_whitespace() {
        assert_eq!(split_command(""), Vec::<String>::new());
        assert_eq!(split_command("   \t  "), Vec::<String>::new());
    }

    #[test]
    fn test_split_trailing_token_without_whitespace() {
        assert_eq!(split_command("a b"), vec!["a", "b"]);
        assert_eq!(split_command("  a  b  "), vec!["a", "b"]);
    }

    #[test]
    fn test_split_empty_quoted_token_mid_string() {
        // A closed empty quote followed by whitespace emits an empty token,
        // matching the reference state machine.
        assert_eq!(split_command(r#""" x"#), vec!["", "x"]);
    }

    #[test]
    fn test_scheme_by_name_falls_back_to_default() {
        assert_eq!(ColorScheme::by_name("no-such-scheme").name, "default");
        assert_eq!(ColorScheme::by_name("NORD").name, "nord");
    }

    #[test]
    fn test_scheme_color_array_order() {
        let scheme = ColorScheme::default_scheme();
        let colors = scheme.colors();
        assert_eq!(colors[0], scheme.foreground);
        assert_eq!(colors[1], scheme.cursor);
        assert_eq!(colors[2], scheme.background);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config {
            shell: Some("/bin/zsh".to_string()),
            color_scheme: "monokai".to_string(),
            action_bar: ActionBarMode::Hides,
            ..Config::default()
        };

        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(parsed.color_scheme, "monokai");
        assert_eq!(parsed.action_bar, ActionBarMode::Hides);
    }
}
