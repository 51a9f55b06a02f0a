// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::HomeFixture;

use anyhow::Result;
use dotlocal::{symlink, DiscoveryMethod, EntryHealth, LinkOptions, Resolver};
use indoc::formatdoc;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn resolve_prints_only_path_on_stdout() -> Result<()> {
    let fixture = HomeFixture::new()?;
    let private = fixture.home("vault/private");
    fs::create_dir_all(&private)?;
    fixture.write_home(
        ".dotfiles.conf",
        &formatdoc! {r#"
            # machine-local settings
            DOTFILES_LOCAL_DIR="{}"
        "#, private.display()},
    )?;

    let output = fixture.dotlocal(&["-v", "resolve"])?;
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout)?, format!("{}\n", private.display()));
    assert!(!output.stderr.is_empty());
    assert!(symlink::points_to(&fixture.public("local"), &private));
    assert!(symlink::points_to(&private.join("lib"), &fixture.public("lib")));

    Ok(())
}

#[test]
fn missing_config_hint_falls_through() -> Result<()> {
    let fixture = HomeFixture::new()?;
    fixture.write_home(".dotfiles.conf", "DOTFILES_LOCAL_DIR=~/missing\n")?;
    fs::create_dir_all(fixture.home(".dotfiles-local"))?;

    let output = fixture.dotlocal(&["resolve"])?;
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout)?,
        format!("{}\n", fixture.home(".dotfiles-local").display())
    );

    Ok(())
}

#[test]
fn status_json_describes_root() -> Result<()> {
    let fixture = HomeFixture::new()?;
    fs::create_dir_all(fixture.home(".dotfiles-local"))?;

    let output = fixture.dotlocal(&["status", "--json"])?;
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(status["type"], "standard");
    assert_eq!(status["method"], "standard location");
    assert_eq!(status["exists"], true);
    assert_eq!(
        status["path"],
        fixture.home(".dotfiles-local").display().to_string()
    );

    Ok(())
}

#[test]
fn private_root_overrides_public_links() -> Result<()> {
    let fixture = HomeFixture::new()?;
    fixture.write_public("zsh/zshrc.symlink", "public zshrc")?;
    fixture.write_public("git/gitconfig.symlink", "public gitconfig")?;
    let private = fixture.home(".dotfiles-local");
    fs::create_dir_all(private.join("git"))?;
    fs::write(private.join("git/gitconfig.symlink"), "private gitconfig")?;

    let resolver = Resolver::new(fixture.layout().clone());
    let report = resolver.reconcile(LinkOptions::default(), false)?;
    assert_eq!((report.public, report.local), (1, 1));
    assert!(!report.needs_resolution());

    assert!(symlink::points_to(
        &fixture.home(".zshrc"),
        &fixture.public("zsh/zshrc.symlink")
    ));
    assert!(symlink::points_to(
        &fixture.home(".gitconfig"),
        &private.join("git/gitconfig.symlink")
    ));
    assert_eq!(fs::read_to_string(fixture.home(".gitconfig"))?, "private gitconfig");

    let status = resolver.status();
    assert_eq!(status.method, DiscoveryMethod::StandardLocation);
    assert!(symlink::points_to(&fixture.public("local"), &private));

    Ok(())
}

#[test]
fn link_conflict_without_terminal_needs_resolution() -> Result<()> {
    let fixture = HomeFixture::new()?;
    fixture.write_public("zsh/zshrc.symlink", "public zshrc")?;
    fixture.write_home(".zshrc", "hand written")?;

    let output = fixture.dotlocal(&["link"])?;
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert_eq!(fs::read_to_string(fixture.home(".zshrc"))?, "hand written");

    let output = fixture.dotlocal(&["link", "--force"])?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(fs::read_to_string(fixture.home(".zshrc"))?, "public zshrc");

    let backup = fs::read_dir(&fixture.layout().home)?
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_name().to_string_lossy().starts_with(".zshrc.backup-"));
    match backup {
        Some(entry) => assert_eq!(fs::read_to_string(entry.path())?, "hand written"),
        None => anyhow::bail!("hand written .zshrc was not backed up"),
    }

    Ok(())
}

#[test]
fn infra_repair_heals_private_root() -> Result<()> {
    let fixture = HomeFixture::new()?;
    let private = fixture.home(".dotfiles-local");
    fs::create_dir_all(&private)?;

    let output = fixture.dotlocal(&["infra", "ensure"])?;
    assert_eq!(output.status.code(), Some(0));

    fs::remove_file(private.join("README.md"))?;
    fs::write(private.join("README.md"), "my own notes")?;
    fs::remove_dir_all(fixture.public("lib"))?;

    let output = fixture.dotlocal(&["infra", "validate"])?;
    assert_eq!(output.status.code(), Some(1));

    fs::create_dir_all(fixture.public("lib"))?;
    let output = fixture.dotlocal(&["infra", "repair"])?;
    assert_eq!(output.status.code(), Some(0));

    let resolver = Resolver::new(fixture.layout().clone());
    let validation = resolver.infrastructure(&private).validate(false);
    assert!(validation
        .entries
        .iter()
        .all(|(_, health)| *health == EntryHealth::Healthy));

    let backups = fs::read_dir(&private)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("README.md.backup-"))
        .count();
    assert_eq!(backups, 1);

    Ok(())
}
