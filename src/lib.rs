// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Layered dotfiles with machine-local overrides.
//!
//! Dotlocal keeps two trees of configuration apart: a __public tree__ that is
//! shared and version controlled, and a __private root__ that holds overrides
//! for the current machine. The public tree is never modified to make room for
//! private content. Instead, private entries win by being linked last.
//!
//! # Pieces
//!
//! - [`config`]: the machine-local `KEY=VALUE` configuration file.
//! - [`discovery`]: tiered search for the private root, memoized per session.
//! - [`link`]: two phase symlinking of link-marker files into the home
//!   directory, public first, private last.
//! - [`infra`]: fixed set of links inside the private root that expose shared
//!   assets of the public tree, with validation and repair.
//! - [`resolver`]: façade tying all of the above together.
//!
//! # Diagnostics
//!
//! Every progress or warning message goes through [`tracing`]. Nothing in this
//! library writes to stdout, so callers are free to capture stdout for
//! results. The binary routes the subscriber to stderr.

/// Emit a diagnostic at `info` level when verbose, `debug` level otherwise.
macro_rules! diag {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod config;
pub mod discovery;
pub mod infra;
pub mod link;
pub mod path;
pub mod resolver;
pub mod symlink;

pub use config::Config;
pub use discovery::{
    cloud::{CloudCandidate, CloudProvider},
    probe::{HostProbe, Probe},
    Discovery, DiscoveryMethod, ResolvedRoot,
};
pub use infra::{EntryHealth, Infrastructure, InfrastructureEntry};
pub use link::{LinkOptions, LinkOutcome, LinkSpec, Linker, ReconcileReport};
pub use path::Layout;
pub use resolver::{Resolver, RootKind, RootStatus};
