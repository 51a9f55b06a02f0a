// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Two phase link precedence.
//!
//! Both the public tree and the private root may carry link markers for the
//! same home directory entry. Private content must always win, without ever
//! touching the public tree to make that happen. Linking is therefore split
//! into two ordered phases:
//!
//! 1. __Public phase__: link every public marker, except those the private
//!    root also provides. Those are skipped and left for the next phase.
//! 2. __Local phase__: link every private marker, replacing whatever sits at
//!    the target.
//!
//! No target is linked twice in one run, so a private link is never
//! overwritten by a public one, and vice versa.
//!
//! # Conflicts
//!
//! A target that already exists and is not ours is only replaced when forced.
//! Otherwise it is handed back to the caller as a conflict that needs manual
//! resolution. It is never silently skipped, and never destroyed: forcing
//! over a real file or directory renames it aside first.

pub mod scan;

use crate::symlink::{self, SymlinkError};

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, instrument, warn};

/// Planned symlink from a link marker into the home directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkSpec {
    /// Link marker the symlink points to.
    pub source: PathBuf,

    /// Location of the symlink in the home directory.
    pub target: PathBuf,

    /// Name of the symlink, for reporting.
    pub display_name: String,
}

/// Knobs shared by both link phases.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Only report what would be done.
    pub dry_run: bool,

    /// Replace existing targets.
    pub force: bool,
}

/// Result of placing one link.
#[derive(Debug)]
pub enum LinkOutcome {
    /// Dry run, nothing touched.
    Planned,

    /// Symlink created.
    Linked,

    /// Symlink was already in place.
    AlreadyLinked,

    /// Target is occupied by something else and force was not given.
    Conflict,

    /// Symlink could not be created.
    Failed(SymlinkError),
}

impl LinkOutcome {
    /// Check if the target is, or would be, linked to its source.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Planned | Self::Linked | Self::AlreadyLinked)
    }
}

/// Place one link.
///
/// Existing targets are removed first only when `force` is given. Failures
/// are logged and returned, never raised, so batch callers can keep going.
pub fn place_link(spec: &LinkSpec, options: LinkOptions) -> LinkOutcome {
    if options.dry_run {
        info!(
            "would link {} -> {:?}",
            spec.display_name,
            spec.source.display()
        );
        return LinkOutcome::Planned;
    }

    if symlink::points_to(&spec.target, &spec.source) {
        debug!("{} already linked", spec.display_name);
        return LinkOutcome::AlreadyLinked;
    }

    let occupied = fs::symlink_metadata(&spec.target).is_ok();
    if occupied && !options.force {
        warn!(
            "{:?} already exists, needs manual resolution",
            spec.target.display()
        );
        return LinkOutcome::Conflict;
    }

    // INVARIANT: Only symlinks are ever deleted, real content is moved aside.
    if occupied && symlink::is_symlink(&spec.target) {
        if let Err(err) = symlink::remove(&spec.target) {
            error!("{err}");
            return LinkOutcome::Failed(err);
        }
    } else if occupied {
        match symlink::rename_aside(&spec.target) {
            Ok(backup) => warn!(
                "moved {:?} aside to {:?}",
                spec.target.display(),
                backup.display()
            ),
            Err(err) => {
                error!("{err}");
                return LinkOutcome::Failed(err);
            }
        }
    }

    match symlink::create(&spec.source, &spec.target) {
        Ok(()) => {
            info!("linked {} -> {:?}", spec.display_name, spec.source.display());
            LinkOutcome::Linked
        }
        Err(err) => {
            error!("{err}");
            LinkOutcome::Failed(err)
        }
    }
}

/// Tally of one reconciliation run.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Targets linked to the public tree.
    pub public: usize,

    /// Targets linked to the private root.
    pub local: usize,

    /// Public markers deferred to the private root, plus duplicate targets.
    pub skipped: usize,

    /// Links that could not be created.
    pub failed: usize,

    /// Occupied targets that need manual resolution.
    pub conflicts: Vec<LinkSpec>,
}

impl ReconcileReport {
    /// Check if conflicts are waiting on the caller.
    pub fn needs_resolution(&self) -> bool {
        !self.conflicts.is_empty()
    }

    fn record(&mut self, phase: Phase, spec: &LinkSpec, outcome: LinkOutcome) {
        match outcome {
            outcome if outcome.is_success() => match phase {
                Phase::Public => self.public += 1,
                Phase::Local => self.local += 1,
            },
            LinkOutcome::Conflict => self.conflicts.push(spec.clone()),
            _ => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Public,
    Local,
}

/// Link markers of public tree and private root into a home directory.
#[derive(Debug, Clone)]
pub struct Linker {
    home: PathBuf,
}

impl Linker {
    /// Construct new linker for home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Run both link phases.
    ///
    /// Private root is optional. Without one, only the public phase runs.
    /// The local phase always forces, since private content overrides
    /// whatever is in the way.
    #[instrument(skip(self), level = "debug")]
    pub fn reconcile(
        &self,
        public_root: &Path,
        private_root: Option<&Path>,
        options: LinkOptions,
    ) -> ReconcileReport {
        let local_specs = private_root
            .map(|root| scan::scan(root, &self.home))
            .unwrap_or_default();
        let local_targets: HashSet<&Path> =
            local_specs.iter().map(|spec| spec.target.as_path()).collect();
        let local_sources: HashSet<&Path> = private_root
            .map(|root| {
                local_specs
                    .iter()
                    .filter_map(|spec| spec.source.strip_prefix(root).ok())
                    .collect()
            })
            .unwrap_or_default();

        let mut report = ReconcileReport::default();
        let mut linked: HashSet<PathBuf> = HashSet::new();

        for spec in scan::scan(public_root, &self.home) {
            // INVARIANT: A private root nested in the public tree is never public.
            if private_root.is_some_and(|root| spec.source.starts_with(root)) {
                continue;
            }

            let overridden = local_targets.contains(spec.target.as_path())
                || spec
                    .source
                    .strip_prefix(public_root)
                    .is_ok_and(|relative| local_sources.contains(relative));
            if overridden {
                debug!("{} deferred to private root", spec.display_name);
                report.skipped += 1;
                continue;
            }

            if !linked.insert(spec.target.clone()) {
                warn!("{} already claimed in this run, skipping", spec.display_name);
                report.skipped += 1;
                continue;
            }

            let outcome = place_link(&spec, options);
            report.record(Phase::Public, &spec, outcome);
        }

        let local_options = LinkOptions {
            force: true,
            ..options
        };
        for spec in &local_specs {
            if !linked.insert(spec.target.clone()) {
                warn!("{} already claimed in this run, skipping", spec.display_name);
                report.skipped += 1;
                continue;
            }

            let outcome = place_link(spec, local_options);
            report.record(Phase::Local, spec, outcome);
        }

        info!(
            "linked {} public, {} local, skipped {}, failed {}, conflicts {}",
            report.public,
            report.local,
            report.skipped,
            report.failed,
            report.conflicts.len()
        );

        report
    }
}
