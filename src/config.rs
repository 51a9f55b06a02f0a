// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Machine-local configuration file.
//!
//! The configuration file is a plain list of `KEY=VALUE` lines living at
//! `<home>/.dotfiles.conf`. It is shared with shell scripts that `source` it,
//! so dotlocal honors only the lines a shell would treat as a simple
//! assignment to an upper-case variable, and leaves everything else alone.
//!
//! # Recognized Keys
//!
//! - `DOTFILES_LOCAL_DIR`: explicit path to the private root. Shell expansion
//!   is performed on it, so `~/Dropbox/dotfiles-local` and
//!   `$HOME/.dotfiles-local` both work.
//! - `DOTFILES_BACKUP_DIR` and `DOTFILES_SNAPSHOT`: owned by other tooling.
//!   Dotlocal never interprets them, but keeps them intact when it rewrites
//!   the file.
//!
//! # Rewriting
//!
//! Updating a key rewrites only the line holding that key. Comments, blank
//! lines, unknown keys, and formatting of every other line survive verbatim.

use crate::symlink;

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, read_to_string},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Key holding explicit path to the private root.
pub const LOCAL_DIR_KEY: &str = "DOTFILES_LOCAL_DIR";

/// Key holding backup directory of other tooling.
pub const BACKUP_DIR_KEY: &str = "DOTFILES_BACKUP_DIR";

/// Key holding snapshot flag of other tooling.
pub const SNAPSHOT_KEY: &str = "DOTFILES_SNAPSHOT";

/// Parsed configuration file.
///
/// # Invariant
///
/// - Rendering with [`Display`] reproduces every line that was never [`set`],
///   byte for byte.
///
/// [`set`]: Config::set
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Assignment {
        key: String,
        value: String,
        raw: String,
    },
    Verbatim(String),
}

impl Config {
    /// Construct new empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration file from disk.
    ///
    /// A missing file is an empty configuration, not an error.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(content) => Ok(Self::from(content.as_str())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration file at {:?}", path.as_ref().display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.as_ref().into(),
            }),
        }
    }

    /// Write configuration file to disk.
    ///
    /// Content goes into a temporary file next to the target first, which then
    /// replaces the target in one rename. Concurrent readers see either the old
    /// or the new file, never a partial one. A symlinked file is written
    /// through to whatever it points at.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Write`] if file cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        // INVARIANT: A symlinked configuration file stays a symlink.
        let target = match fs::canonicalize(path.as_ref()) {
            Ok(real) => real,
            Err(_) => symlink::resolved_target(path.as_ref())
                .unwrap_or_else(|| path.as_ref().to_path_buf()),
        };
        let path = target.as_path();
        let write_err = |source: std::io::Error| ConfigError::Write {
            source,
            path: path.into(),
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        mkdirp::mkdirp(parent).map_err(write_err)?;

        let mut staged = NamedTempFile::new_in(parent).map_err(write_err)?;
        staged
            .write_all(self.to_string().as_bytes())
            .map_err(write_err)?;
        staged.persist(path).map_err(|err| write_err(err.error))?;
        debug!("wrote configuration to {:?}", path.display());

        Ok(())
    }

    /// Get effective value of a key.
    ///
    /// Later assignments shadow earlier ones, same as in a shell.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Assignment {
                key: line_key,
                value,
                ..
            } if line_key == key.as_ref() => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set value of a key.
    ///
    /// Rewrites the effective assignment in place, or appends a new one if the
    /// key is absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let raw = format!("{key}=\"{}\"", escape(&value));

        let slot = self.lines.iter_mut().rev().find(|line| {
            matches!(line, Line::Assignment { key: line_key, .. } if *line_key == key)
        });

        match slot {
            Some(line) => *line = Line::Assignment { key, value, raw },
            None => self.lines.push(Line::Assignment { key, value, raw }),
        }
    }

    /// Explicit path to private root, if any.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if value references an unset
    ///   variable.
    pub fn local_dir(&self) -> Result<Option<PathBuf>> {
        let Some(value) = self.get(LOCAL_DIR_KEY).filter(|value| !value.is_empty()) else {
            return Ok(None);
        };

        let expanded = shellexpand::full(value)?;
        Ok(Some(PathBuf::from(expanded.into_owned())))
    }
}

impl From<&str> for Config {
    fn from(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|raw| match parse_assignment(raw) {
                Some((key, value)) => Line::Assignment {
                    key,
                    value,
                    raw: raw.to_owned(),
                },
                None => Line::Verbatim(raw.to_owned()),
            })
            .collect();

        Self { lines }
    }
}

impl From<String> for Config {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for line in &self.lines {
            match line {
                Line::Assignment { raw, .. } => writeln!(fmt, "{raw}")?,
                Line::Verbatim(raw) => writeln!(fmt, "{raw}")?,
            }
        }

        Ok(())
    }
}

fn parse_assignment(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.trim().split_once('=')?;
    if !is_honored_key(key) {
        return None;
    }

    Some((key.to_owned(), unquote(value.trim())))
}

// Shell variable names only, and only upper-case ones.
fn is_honored_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_owned();
    }

    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return unescape(&value[1..value.len() - 1]);
    }

    match value.find(" #") {
        Some(index) => value[..index].trim_end().to_owned(),
        None => value.to_owned(),
    }
}

// Characters a shell still interprets inside double quotes.
const ESCAPED: [char; 4] = ['\\', '"', '$', '`'];

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if ESCAPED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '\\' && ESCAPED.contains(next) => {
                unescaped.push(*next);
                chars.next();
            }
            _ => unescaped.push(c),
        }
    }

    unescaped
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written.
    #[error("failed to write configuration file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to perform shell expansion on configuration value.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
