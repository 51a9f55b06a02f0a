// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use anyhow::Result;
use dotlocal::path::Layout;
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};
use tempfile::TempDir;

/// Scratch home directory holding a public dotfiles tree.
pub(crate) struct HomeFixture {
    _scratch: TempDir,
    layout: Layout,
}

impl HomeFixture {
    pub(crate) fn new() -> Result<Self> {
        let scratch = tempfile::tempdir()?;
        let home = scratch.path().canonicalize()?.join("home");
        let layout = Layout::new(&home, home.join(".dotfiles"));

        // INVARIANT: Public tree always provides every infrastructure target.
        let fixture = Self {
            _scratch: scratch,
            layout,
        };
        fs::create_dir_all(fixture.public("lib"))?;
        fixture.write_public("lib/core.sh", "# core")?;
        fixture.write_public("README.md", "# dotfiles")?;
        for doc in ["CONVENTIONS.md", "SYMLINKS.md", "LOCAL.md"] {
            fixture.write_public(format!("docs/{doc}"), doc)?;
        }

        Ok(fixture)
    }

    pub(crate) fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn home(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.layout.home.join(relative)
    }

    pub(crate) fn public(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.layout.public_root.join(relative)
    }

    pub(crate) fn write_public(&self, relative: impl AsRef<Path>, contents: &str) -> Result<()> {
        write(self.public(relative), contents)
    }

    pub(crate) fn write_home(&self, relative: impl AsRef<Path>, contents: &str) -> Result<()> {
        write(self.home(relative), contents)
    }

    /// Run dotlocal binary against this fixture, with stdin detached.
    pub(crate) fn dotlocal(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new(env!("CARGO_BIN_EXE_dotlocal"))
            .arg("--dotfiles")
            .arg(&self.layout.public_root)
            .args(args)
            .env("HOME", &self.layout.home)
            .env("RUST_LOG", "debug")
            .env_remove("DOTFILES_ROOT")
            .stdin(Stdio::null())
            .output()?;

        Ok(output)
    }
}

fn write(path: PathBuf, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;

    Ok(())
}
