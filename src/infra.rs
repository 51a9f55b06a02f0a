// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Private root infrastructure.
//!
//! A private root is more useful when it can reach shared assets of the public
//! tree without knowing where the public tree lives. Dotlocal maintains a
//! fixed table of __infrastructure entries__ for that: symlinks inside the
//! private root that point back into the public tree. The public tree in turn
//! gets one `local` symlink pointing at the private root.
//!
//! # Entry Lifecycle
//!
//! Each entry is in exactly one [`EntryHealth`] state. Things happening behind
//! dotlocal's back move a healthy entry into a broken or mismatched state, and
//! [`Infrastructure::repair`] moves it back:
//!
//! ```text
//! Healthy --(target removed)--> Broken     --repair--> Healthy
//! Healthy --(target changed)--> Mismatch   --repair--> Healthy
//! Absent                                   --repair--> Healthy | Absent
//! ```
//!
//! An absent entry stays absent when its public target does not exist, since
//! repair cannot manufacture a target.
//!
//! # Destructive Operations
//!
//! Only repair ever deletes or renames anything. Broken and mismatched
//! symlinks are deleted. Real files and directories sitting where an entry
//! should be are renamed aside, never deleted.

use crate::{path::LOCAL_LINK_NAME, symlink};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

/// Entry names inside the private root, and their targets relative to the
/// public tree.
pub const INFRASTRUCTURE: [(&str, &str); 6] = [
    ("lib", "lib"),
    ("docs", "docs"),
    ("README.md", "README.md"),
    ("CONVENTIONS.md", "docs/CONVENTIONS.md"),
    ("SYMLINKS.md", "docs/SYMLINKS.md"),
    ("LOCAL.md", "docs/LOCAL.md"),
];

/// One symlink that must exist inside the private root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfrastructureEntry {
    /// Name of the symlink inside the private root.
    pub name: &'static str,

    /// Absolute path the symlink must point to.
    pub target: PathBuf,
}

impl InfrastructureEntry {
    /// Full infrastructure table for a public tree.
    pub fn table(public_root: &Path) -> Vec<Self> {
        INFRASTRUCTURE
            .iter()
            .map(|&(name, relative)| Self {
                name,
                target: public_root.join(relative),
            })
            .collect()
    }
}

/// State of one infrastructure entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryHealth {
    /// Symlink exists and points at its target.
    Healthy,

    /// Nothing exists where the symlink should be.
    Absent,

    /// Something other than a symlink occupies the slot.
    NotSymlink,

    /// Symlink points at something that does not exist.
    Broken { points_to: PathBuf },

    /// Symlink points at an existing path other than its target.
    Mismatch { points_to: PathBuf },
}

impl EntryHealth {
    /// Check if entry needs no attention.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl Display for EntryHealth {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Healthy => fmt.write_str("healthy"),
            Self::Absent => fmt.write_str("absent"),
            Self::NotSymlink => fmt.write_str("not a symlink"),
            Self::Broken { points_to } => write!(fmt, "broken, points to {:?}", points_to.display()),
            Self::Mismatch { points_to } => {
                write!(fmt, "points to {:?} instead", points_to.display())
            }
        }
    }
}

/// Result of validating every infrastructure entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Every entry of the table, with its state.
    pub entries: Vec<(InfrastructureEntry, EntryHealth)>,
}

impl Validation {
    /// Number of entries that are not healthy.
    pub fn issue_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, health)| !health.is_healthy())
            .count()
    }

    /// Check if every entry is healthy.
    pub fn is_healthy(&self) -> bool {
        self.issue_count() == 0
    }
}

/// Result of placing one symlink.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Symlink was made.
    Created,

    /// Symlink was already correct.
    Existing,

    /// Slot left alone, see logs for why.
    #[default]
    Skipped,

    /// Symlink could not be made.
    Failed,
}

/// Tally of one ensure run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnsureReport {
    /// Outcome for `local` symlink in public tree.
    pub root_link: Placement,

    /// Entries linked by this run.
    pub created: usize,

    /// Entries that were already correct.
    pub existing: usize,

    /// Entries left alone.
    pub skipped: usize,

    /// Entries that could not be linked.
    pub failed: usize,
}

impl EnsureReport {
    fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Created => self.created += 1,
            Placement::Existing => self.existing += 1,
            Placement::Skipped => self.skipped += 1,
            Placement::Failed => self.failed += 1,
        }
    }
}

/// Tally of one repair run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Issues found before repairing.
    pub baseline: usize,

    /// Broken or mismatched symlinks deleted.
    pub removed: usize,

    /// Backups of real files and directories that were in the way.
    pub renamed: Vec<PathBuf>,

    /// Cleanups that could not be done.
    pub failed: usize,

    /// Issues left after repairing.
    pub remaining: usize,
}

/// Infrastructure of one private root.
#[derive(Debug, Clone)]
pub struct Infrastructure {
    private_root: PathBuf,
    public_root: PathBuf,
}

impl Infrastructure {
    /// Construct new infrastructure manager.
    pub fn new(private_root: impl Into<PathBuf>, public_root: impl Into<PathBuf>) -> Self {
        Self {
            private_root: private_root.into(),
            public_root: public_root.into(),
        }
    }

    /// Infrastructure table this manager maintains.
    pub fn entries(&self) -> Vec<InfrastructureEntry> {
        InfrastructureEntry::table(&self.public_root)
    }

    /// Make sure private root and all of its infrastructure exist.
    ///
    /// Creates private root when missing, links it from the public tree, then
    /// links every entry whose target exists. Entries with a missing or
    /// unreadable target are skipped. With `force`, symlinks pointing
    /// elsewhere are replaced. Real files and directories are never touched.
    ///
    /// # Errors
    ///
    /// - Return [`InfraError::CreateRoot`] if private root cannot be created.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure(&self, force: bool, verbose: bool) -> Result<EnsureReport> {
        mkdirp::mkdirp(&self.private_root).map_err(|err| InfraError::CreateRoot {
            source: err,
            path: self.private_root.clone(),
        })?;

        let mut report = EnsureReport {
            root_link: self.link_root(force, verbose),
            ..EnsureReport::default()
        };

        for entry in self.entries() {
            if !is_readable(&entry.target) {
                warn!(
                    "skipping {}, target {:?} is missing or unreadable",
                    entry.name,
                    entry.target.display()
                );
                report.record(Placement::Skipped);
                continue;
            }

            let link = self.private_root.join(entry.name);
            report.record(place(&entry.target, &link, force, verbose));
        }

        diag!(
            verbose,
            "infrastructure: {} created, {} existing, {} skipped, {} failed",
            report.created,
            report.existing,
            report.skipped,
            report.failed
        );

        Ok(report)
    }

    /// Classify every infrastructure entry.
    #[instrument(skip(self), level = "debug")]
    pub fn validate(&self, verbose: bool) -> Validation {
        let entries: Vec<_> = self
            .entries()
            .into_iter()
            .map(|entry| {
                let health = self.check(&entry);
                diag!(verbose, "{}: {health}", entry.name);
                (entry, health)
            })
            .collect();

        let validation = Validation { entries };
        diag!(
            verbose,
            "infrastructure has {} issue(s)",
            validation.issue_count()
        );

        validation
    }

    /// Bring every infrastructure entry back to a healthy state.
    ///
    /// Broken and mismatched symlinks are deleted, real files and directories
    /// in the way are renamed aside, then the full table is recreated by force.
    /// Returns what is left unhealthy afterwards instead of failing, since some
    /// problems, like a missing public target, cannot be fixed from here.
    ///
    /// # Errors
    ///
    /// - Return [`InfraError::CreateRoot`] if private root cannot be created.
    #[instrument(skip(self), level = "debug")]
    pub fn repair(&self, verbose: bool) -> Result<RepairReport> {
        let baseline = self.validate(verbose);
        let mut report = RepairReport {
            baseline: baseline.issue_count(),
            ..RepairReport::default()
        };

        for (entry, health) in &baseline.entries {
            let link = self.private_root.join(entry.name);
            match health {
                EntryHealth::Healthy | EntryHealth::Absent => {}
                EntryHealth::Broken { .. } | EntryHealth::Mismatch { .. } => {
                    match symlink::remove(&link) {
                        Ok(()) => {
                            info!("removed {} ({health})", entry.name);
                            report.removed += 1;
                        }
                        Err(err) => {
                            error!("{err}");
                            report.failed += 1;
                        }
                    }
                }
                EntryHealth::NotSymlink => match symlink::rename_aside(&link) {
                    Ok(backup) => {
                        info!("moved {} aside to {:?}", entry.name, backup.display());
                        report.renamed.push(backup);
                    }
                    Err(err) => {
                        error!("{err}");
                        report.failed += 1;
                    }
                },
            }
        }

        self.ensure(true, verbose)?;
        report.remaining = self.validate(verbose).issue_count();

        if report.remaining == 0 {
            info!("infrastructure is healthy");
        } else {
            warn!(
                "{} infrastructure issue(s) remain after repair",
                report.remaining
            );
        }

        Ok(report)
    }

    fn link_root(&self, force: bool, verbose: bool) -> Placement {
        if !self.public_root.is_dir() {
            warn!(
                "public tree {:?} does not exist, not linking private root into it",
                self.public_root.display()
            );
            return Placement::Skipped;
        }

        let link = self.public_root.join(LOCAL_LINK_NAME);

        // INVARIANT: Private root may itself be the `local` directory.
        if is_same_dir(&link, &self.private_root) {
            diag!(verbose, "{:?} already leads to private root", link.display());
            return Placement::Existing;
        }

        place(&self.private_root, &link, force, verbose)
    }

    fn check(&self, entry: &InfrastructureEntry) -> EntryHealth {
        let link = self.private_root.join(entry.name);
        match fs::symlink_metadata(&link) {
            Err(_) => EntryHealth::Absent,
            Ok(metadata) if !metadata.is_symlink() => EntryHealth::NotSymlink,
            Ok(_) => {
                let points_to = symlink::resolved_target(&link).unwrap_or_default();
                if fs::metadata(&link).is_err() {
                    EntryHealth::Broken { points_to }
                } else if points_to != entry.target {
                    EntryHealth::Mismatch { points_to }
                } else {
                    EntryHealth::Healthy
                }
            }
        }
    }
}

fn place(source: &Path, link: &Path, force: bool, verbose: bool) -> Placement {
    if symlink::points_to(link, source) {
        diag!(verbose, "{:?} already linked", link.display());
        return Placement::Existing;
    }

    match fs::symlink_metadata(link) {
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            error!("cannot inspect {:?}: {err}", link.display());
            return Placement::Failed;
        }
        Ok(metadata) if !metadata.is_symlink() => {
            warn!(
                "{:?} is occupied by a real file or directory, run repair to move it aside",
                link.display()
            );
            return Placement::Skipped;
        }
        Ok(_) if !force => {
            warn!(
                "{:?} points somewhere else, not replacing it without force",
                link.display()
            );
            return Placement::Skipped;
        }
        Ok(_) => {
            if let Err(err) = symlink::remove(link) {
                error!("{err}");
                return Placement::Failed;
            }
        }
    }

    match symlink::create(source, link) {
        Ok(()) => {
            diag!(verbose, "linked {:?} -> {:?}", link.display(), source.display());
            Placement::Created
        }
        Err(err) => {
            error!("{err}");
            Placement::Failed
        }
    }
}

fn is_readable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::read_dir(path).is_ok(),
        Ok(_) => fs::File::open(path).is_ok(),
        Err(_) => false,
    }
}

fn is_same_dir(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Infrastructure management error types.
#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    /// Private root cannot be created.
    #[error("failed to create private root at {:?}", path.display())]
    CreateRoot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = InfraError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Sandbox {
        _scratch: TempDir,
        public: PathBuf,
        private: PathBuf,
    }

    impl Sandbox {
        fn new() -> anyhow::Result<Self> {
            let scratch = tempfile::tempdir()?;
            let public = scratch.path().join("dotfiles");
            let private = scratch.path().join("private");
            fs::create_dir_all(public.join("lib"))?;
            fs::create_dir_all(public.join("docs"))?;
            fs::write(public.join("README.md"), "readme")?;
            for doc in ["CONVENTIONS.md", "SYMLINKS.md", "LOCAL.md"] {
                fs::write(public.join("docs").join(doc), doc)?;
            }

            Ok(Self {
                _scratch: scratch,
                public,
                private,
            })
        }

        fn infra(&self) -> Infrastructure {
            Infrastructure::new(&self.private, &self.public)
        }

        fn health_of(&self, name: &str) -> EntryHealth {
            self.infra()
                .validate(false)
                .entries
                .into_iter()
                .find(|(entry, _)| entry.name == name)
                .map(|(_, health)| health)
                .unwrap_or(EntryHealth::Absent)
        }
    }

    #[test]
    fn ensure_builds_everything() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;

        let report = sandbox.infra().ensure(false, false)?;
        assert_eq!(
            report,
            EnsureReport {
                root_link: Placement::Created,
                created: 6,
                ..EnsureReport::default()
            }
        );
        assert!(sandbox.private.is_dir());
        assert!(symlink::points_to(&sandbox.public.join("local"), &sandbox.private));
        assert!(sandbox.infra().validate(true).is_healthy());
        assert_eq!(fs::read_to_string(sandbox.private.join("README.md"))?, "readme");

        Ok(())
    }

    #[test]
    fn ensure_is_idempotent() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;

        sandbox.infra().ensure(false, false)?;
        let report = sandbox.infra().ensure(false, false)?;
        assert_eq!(
            report,
            EnsureReport {
                root_link: Placement::Existing,
                existing: 6,
                ..EnsureReport::default()
            }
        );

        Ok(())
    }

    #[test]
    fn ensure_resumes_partial_setup() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        fs::create_dir_all(&sandbox.private)?;
        symlink::create(&sandbox.public.join("lib"), &sandbox.private.join("lib"))?;
        symlink::create(&sandbox.public.join("docs"), &sandbox.private.join("docs"))?;

        let report = sandbox.infra().ensure(false, false)?;
        assert_eq!((report.created, report.existing), (4, 2));
        assert!(sandbox.infra().validate(false).is_healthy());

        Ok(())
    }

    #[test]
    fn ensure_skips_missing_targets() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        fs::remove_dir_all(sandbox.public.join("docs"))?;

        let report = sandbox.infra().ensure(false, false)?;
        assert_eq!((report.created, report.skipped), (2, 4));

        let validation = sandbox.infra().validate(false);
        assert_eq!(validation.issue_count(), 4);
        assert_eq!(sandbox.health_of("docs"), EntryHealth::Absent);

        Ok(())
    }

    #[test]
    fn ensure_leaves_real_files_alone() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        fs::create_dir_all(&sandbox.private)?;
        fs::write(sandbox.private.join("README.md"), "my notes")?;

        let report = sandbox.infra().ensure(true, false)?;
        assert_eq!((report.created, report.skipped), (5, 1));
        assert_eq!(fs::read_to_string(sandbox.private.join("README.md"))?, "my notes");
        assert_eq!(sandbox.health_of("README.md"), EntryHealth::NotSymlink);

        Ok(())
    }

    #[test]
    fn ensure_accepts_private_root_inside_public_tree() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        let nested = sandbox.public.join("local");
        fs::create_dir_all(&nested)?;

        let report = Infrastructure::new(&nested, &sandbox.public).ensure(false, false)?;
        assert_eq!(report.root_link, Placement::Existing);
        assert!(nested.is_dir());
        assert!(!symlink::is_symlink(&nested));

        Ok(())
    }

    #[test]
    fn validate_classifies_each_problem() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        sandbox.infra().ensure(false, false)?;

        let elsewhere = sandbox.public.join("docs/LOCAL.md");
        symlink::remove(&sandbox.private.join("lib"))?;
        symlink::create(&sandbox.public.join("gone"), &sandbox.private.join("lib"))?;
        symlink::remove(&sandbox.private.join("SYMLINKS.md"))?;
        symlink::create(&elsewhere, &sandbox.private.join("SYMLINKS.md"))?;
        symlink::remove(&sandbox.private.join("CONVENTIONS.md"))?;
        fs::write(sandbox.private.join("CONVENTIONS.md"), "mine")?;
        symlink::remove(&sandbox.private.join("docs"))?;

        assert_eq!(sandbox.infra().validate(false).issue_count(), 4);
        assert_eq!(
            sandbox.health_of("lib"),
            EntryHealth::Broken {
                points_to: sandbox.public.join("gone")
            }
        );
        assert_eq!(
            sandbox.health_of("SYMLINKS.md"),
            EntryHealth::Mismatch {
                points_to: elsewhere
            }
        );
        assert_eq!(sandbox.health_of("CONVENTIONS.md"), EntryHealth::NotSymlink);
        assert_eq!(sandbox.health_of("docs"), EntryHealth::Absent);
        assert_eq!(sandbox.health_of("README.md"), EntryHealth::Healthy);

        Ok(())
    }

    #[test]
    fn repair_broken_target_once_it_returns() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        sandbox.infra().ensure(false, false)?;

        fs::remove_file(sandbox.public.join("README.md"))?;
        let validation = sandbox.infra().validate(false);
        assert_eq!(validation.issue_count(), 1);
        assert!(matches!(sandbox.health_of("README.md"), EntryHealth::Broken { .. }));

        // Target still gone, so repair can only clean up.
        let report = sandbox.infra().repair(false)?;
        assert_eq!((report.baseline, report.removed, report.remaining), (1, 1, 1));
        assert_eq!(sandbox.health_of("README.md"), EntryHealth::Absent);

        fs::write(sandbox.public.join("README.md"), "readme again")?;
        let report = sandbox.infra().repair(false)?;
        assert_eq!(report.remaining, 0);
        assert!(sandbox.infra().validate(false).is_healthy());

        Ok(())
    }

    #[test]
    fn repair_fixes_everything_it_can() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        sandbox.infra().ensure(false, false)?;

        symlink::remove(&sandbox.private.join("lib"))?;
        symlink::create(&sandbox.public.join("docs"), &sandbox.private.join("lib"))?;
        symlink::remove(&sandbox.private.join("LOCAL.md"))?;
        fs::write(sandbox.private.join("LOCAL.md"), "precious")?;

        let report = sandbox.infra().repair(true)?;
        assert_eq!(report.baseline, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(report.remaining, 0);
        assert_eq!(fs::read_to_string(&report.renamed[0])?, "precious");
        assert!(symlink::points_to(
            &sandbox.private.join("lib"),
            &sandbox.public.join("lib")
        ));

        Ok(())
    }

    #[test]
    fn repair_is_idempotent() -> anyhow::Result<()> {
        let sandbox = Sandbox::new()?;
        fs::create_dir_all(sandbox.private.join("docs"))?;

        let first = sandbox.infra().repair(false)?;
        assert_eq!(first.remaining, 0);

        let second = sandbox.infra().repair(false)?;
        assert_eq!(
            second,
            RepairReport {
                baseline: 0,
                remaining: 0,
                ..RepairReport::default()
            }
        );

        Ok(())
    }
}
