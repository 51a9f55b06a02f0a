// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotlocal::{
    link::{place_link, LinkOptions, LinkSpec},
    path::Layout,
    symlink, Resolver,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use inquire::Select;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::IsTerminal,
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code for conflicts left for the user.
const NEEDS_RESOLUTION: i32 = 2;

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotlocal [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to public dotfiles tree.
    #[arg(long, global = true, env = "DOTFILES_ROOT", value_name = "path")]
    pub dotfiles: Option<PathBuf>,

    /// Report every discovery decision.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<i32> {
        let public_root = self.dotfiles.map(|path| path.canonicalize().unwrap_or(path));
        let resolver = Resolver::new(Layout::try_default(public_root)?);

        match self.command {
            Command::Resolve(opts) => run_resolve(&resolver, opts, self.verbose),
            Command::Status(opts) => run_status(&resolver, opts),
            Command::Link(opts) => run_link(&resolver, opts, self.verbose),
            Command::Infra { action } => match action {
                InfraCommand::Ensure(opts) => run_infra_ensure(&resolver, opts, self.verbose),
                InfraCommand::Validate => run_infra_validate(&resolver, self.verbose),
                InfraCommand::Repair => run_infra_repair(&resolver, self.verbose),
            },
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print path of private root.
    #[command(override_usage = "dotlocal resolve [options]")]
    Resolve(ResolveOptions),

    /// Show how private root was found.
    #[command(override_usage = "dotlocal status [options]")]
    Status(StatusOptions),

    /// Link public tree and private root into home directory.
    #[command(override_usage = "dotlocal link [options]")]
    Link(LinkCommandOptions),

    /// Manage infrastructure symlinks inside private root.
    #[command(override_usage = "dotlocal infra <action>")]
    Infra {
        #[command(subcommand)]
        action: InfraCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum InfraCommand {
    /// Create missing infrastructure symlinks.
    Ensure(EnsureOptions),

    /// Report state of every infrastructure symlink.
    Validate,

    /// Fix broken, mismatched, or obstructed infrastructure symlinks.
    Repair,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ResolveOptions {
    /// Create private root at standard location if none is found.
    #[arg(short, long)]
    pub create: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Print status as JSON.
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LinkCommandOptions {
    /// Only report what would be linked.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Replace anything already at a link target.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct EnsureOptions {
    /// Replace infrastructure symlinks pointing elsewhere.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy)]
enum Resolution {
    Overwrite,
    Backup,
    Skip,
}

impl Display for Resolution {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Overwrite => "replace, backing up real files",
            Self::Backup => "back up, then link",
            Self::Skip => "skip",
        })
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match run() {
        Ok(code) => exit(code),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<i32> {
    Cli::parse().run()
}

fn run_resolve(resolver: &Resolver, opts: ResolveOptions, verbose: bool) -> Result<i32> {
    let resolved = resolver.resolve(opts.create, verbose)?;
    match resolved.path() {
        Some(path) => {
            println!("{}", path.display());
            Ok(0)
        }
        None => {
            warn!("no private root found, use --create to make one");
            Ok(1)
        }
    }
}

fn run_status(resolver: &Resolver, opts: StatusOptions) -> Result<i32> {
    let status = resolver.status();
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(0);
    }

    match &status.path {
        Some(path) => println!("path:   {}", path.display()),
        None => println!("path:   <none>"),
    }
    println!("method: {}", status.method);
    println!("type:   {}", status.kind);
    println!("exists: {}", status.exists);

    Ok(0)
}

fn run_link(resolver: &Resolver, opts: LinkCommandOptions, verbose: bool) -> Result<i32> {
    let options = LinkOptions {
        dry_run: opts.dry_run,
        force: opts.force,
    };
    let report = resolver.reconcile(options, verbose)?;
    info!(
        "linked {} public and {} private entries, skipped {}",
        report.public, report.local, report.skipped
    );

    let unresolved = if report.needs_resolution() {
        resolve_conflicts(report.conflicts)?
    } else {
        0
    };

    if report.failed > 0 {
        error!("{} links could not be created", report.failed);
        return Ok(1);
    }

    if unresolved > 0 {
        return Ok(NEEDS_RESOLUTION);
    }

    Ok(0)
}

fn run_infra_ensure(resolver: &Resolver, opts: EnsureOptions, verbose: bool) -> Result<i32> {
    let private_root = private_root(resolver, verbose)?;
    let report = resolver.infrastructure(private_root).ensure(opts.force, verbose)?;
    info!(
        "created {}, already in place {}, skipped {}, failed {}",
        report.created, report.existing, report.skipped, report.failed
    );

    Ok(i32::from(report.failed > 0))
}

fn run_infra_validate(resolver: &Resolver, verbose: bool) -> Result<i32> {
    let private_root = private_root(resolver, verbose)?;
    let validation = resolver.infrastructure(private_root).validate(verbose);
    for (entry, health) in &validation.entries {
        println!("{:<20} {health}", entry.name);
    }

    Ok(i32::from(!validation.is_healthy()))
}

fn run_infra_repair(resolver: &Resolver, verbose: bool) -> Result<i32> {
    let private_root = private_root(resolver, verbose)?;
    let report = resolver.infrastructure(private_root).repair(verbose)?;
    for path in &report.renamed {
        info!("moved {:?} out of the way", path.display());
    }
    info!(
        "found {} issues, {} remain",
        report.baseline, report.remaining
    );

    Ok(i32::from(report.remaining > 0))
}

fn private_root(resolver: &Resolver, verbose: bool) -> Result<PathBuf> {
    resolver
        .discovery()
        .discover(verbose)
        .path
        .ok_or_else(|| anyhow!("no private root found, run `dotlocal resolve --create` first"))
}

/// Ask what to do about each occupied link target.
///
/// Returns number of conflicts left unresolved.
fn resolve_conflicts(conflicts: Vec<LinkSpec>) -> Result<usize> {
    if !std::io::stdin().is_terminal() {
        for spec in &conflicts {
            warn!("{:?} needs manual resolution", spec.target.display());
        }
        return Ok(conflicts.len());
    }

    let mut unresolved = 0;
    for spec in conflicts {
        let message = format!("{} already exists", spec.target.display());
        let choices = vec![Resolution::Overwrite, Resolution::Backup, Resolution::Skip];
        let outcome = match Select::new(&message, choices).prompt()? {
            Resolution::Overwrite => place_link(
                &spec,
                LinkOptions {
                    dry_run: false,
                    force: true,
                },
            ),
            Resolution::Backup => {
                let backup = symlink::rename_aside(&spec.target)?;
                info!("backed up {:?}", backup.display());
                place_link(&spec, LinkOptions::default())
            }
            Resolution::Skip => {
                unresolved += 1;
                continue;
            }
        };

        if !outcome.is_success() {
            unresolved += 1;
        }
    }

    Ok(unresolved)
}
