// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link-marker naming convention.
//!
//! Any file or directory whose name ends in `.symlink` is a __link marker__.
//! It gets linked into the home directory under its name minus the marker,
//! prefixed with a dot unless it already starts with one. So `zshrc.symlink`
//! becomes `~/.zshrc`, and `.config.symlink` becomes `~/.config`.
//!
//! A marker directory is linked as a whole, so nothing inside it is scanned.
//! Backups, version control metadata, tests, and example files are never
//! treated as markers.

use crate::link::LinkSpec;

use ignore::{DirEntry, WalkBuilder};
use std::path::Path;
use tracing::warn;

/// Suffix marking an entry for linking.
pub const LINK_MARKER: &str = ".symlink";

/// Prefix every home directory link name carries.
pub const PRIVATE_PREFIX: char = '.';

const EXCLUDED_DIRS: [&str; 7] = [".git", ".hg", ".svn", "backup", "backups", "test", "tests"];

/// Turn a path into a planned link, if it is a link marker.
///
/// Pure function of its input. The filesystem is never touched.
pub fn classify(path: &Path, home: &Path) -> Option<LinkSpec> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(LINK_MARKER)?;
    if stem.is_empty() || stem == "." {
        return None;
    }

    let display_name = if stem.starts_with(PRIVATE_PREFIX) {
        stem.to_owned()
    } else {
        format!("{PRIVATE_PREFIX}{stem}")
    };

    Some(LinkSpec {
        source: path.into(),
        target: home.join(&display_name),
        display_name,
    })
}

/// Check if an entry is kept out of scanning.
pub fn is_excluded(path: &Path, is_dir: bool) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    if name.contains(".example") {
        return true;
    }

    is_dir && (EXCLUDED_DIRS.contains(&name) || name.ends_with(".backup"))
}

/// Walk `root` and collect every link marker, in file name order.
///
/// Symlinks are never followed. Unreadable entries are reported and skipped.
pub fn scan(root: &Path, home: &Path) -> Vec<LinkSpec> {
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|left, right| left.cmp(right))
        .filter_entry(keep_entry);

    let mut specs = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("skipping unreadable entry: {error}");
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        if let Some(spec) = classify(entry.path(), home) {
            specs.push(spec);
        }
    }

    specs
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
    if is_excluded(entry.path(), is_dir) {
        return false;
    }

    // INVARIANT: Marker directories are linked whole, never descended into.
    let inside_marker = entry.depth() > 1
        && entry
            .path()
            .parent()
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(LINK_MARKER));

    !inside_marker
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::{fs, path::PathBuf};

    #[test_case("/dot/zsh/zshrc.symlink", Some(".zshrc"); "plain name gets prefix")]
    #[test_case("/dot/.config.symlink", Some(".config"); "prefixed name kept")]
    #[test_case("/dot/git/gitconfig.local.symlink", Some(".gitconfig.local"); "inner dots kept")]
    #[test_case("/dot/zsh/zshrc", None; "no marker")]
    #[test_case("/dot/.symlink", None; "marker only")]
    #[test_case("/dot/zshrc.symlink.bak", None; "marker not at end")]
    #[test]
    fn classify_names(path: &str, expect: Option<&str>) {
        let result = classify(Path::new(path), Path::new("/home/blah"));
        let expect = expect.map(|name| LinkSpec {
            source: PathBuf::from(path),
            target: Path::new("/home/blah").join(name),
            display_name: name.to_owned(),
        });
        assert_eq!(result, expect);
    }

    #[test_case("/dot/.git", true, true; "git metadata")]
    #[test_case("/dot/backups", true, true; "backup directory")]
    #[test_case("/dot/zsh.backup", true, true; "backup suffix")]
    #[test_case("/dot/tests", true, true; "test directory")]
    #[test_case("/dot/tests", false, false; "file named tests")]
    #[test_case("/dot/vimrc.example.symlink", false, true; "example file")]
    #[test_case("/dot/vim", true, false; "regular directory")]
    #[test]
    fn exclusions(path: &str, is_dir: bool, expect: bool) {
        assert_eq!(is_excluded(Path::new(path), is_dir), expect);
    }

    #[test]
    fn scan_honors_convention() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let root = scratch.path().join("dotfiles");
        let home = scratch.path().join("home");
        let touch = |relative: &str| -> anyhow::Result<()> {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().unwrap_or(root.as_path()))?;
            fs::write(path, "")?;
            Ok(())
        };

        touch("zsh/zshrc.symlink")?;
        touch("git/gitconfig.symlink")?;
        touch("git/gitconfig.example.symlink")?;
        touch(".git/hooks/pre-commit.symlink")?;
        touch("backup/zshrc.symlink")?;
        touch("tests/fixture.symlink")?;
        touch("vim.symlink/colors/theme.symlink")?;
        touch("zsh/README.md")?;

        let names: Vec<_> = scan(&root, &home)
            .into_iter()
            .map(|spec| spec.display_name)
            .collect();
        assert_eq!(names, vec![".gitconfig", ".vim", ".zshrc"]);

        Ok(())
    }
}
