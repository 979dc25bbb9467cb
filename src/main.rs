//! aurup CLI - interactive front-end for the installation session

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aurup::config::InstallerConfig;
use aurup::core::catalog::{Channel, VersionEntry};
use aurup::ops::engine::{FsInstallEngine, UninstallOptions};
use aurup::ops::error::OperationOutcome;
use aurup::ops::scheduler::SessionEvent;
use aurup::ops::session::{InstallOptions, InstallationSession, SessionState};

#[derive(Parser)]
#[command(name = "aurup")]
#[command(author, version, about = "Installer for the Aura add-on")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the add-on
    Install {
        /// Install the newest stable release (default)
        #[arg(short, long, conflicts_with_all = ["pre", "ci", "tag", "path"])]
        latest: bool,
        /// Install the newest prerelease
        #[arg(long, conflicts_with_all = ["ci", "tag", "path"])]
        pre: bool,
        /// Install the continuous-integration build
        #[arg(long, conflicts_with_all = ["tag", "path"])]
        ci: bool,
        /// Install a specific release tag, e.g. v1.2.0
        #[arg(short, long, conflicts_with = "path")]
        tag: Option<String>,
        /// Install from a local artifact file instead of downloading
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Vendor install directory (auto-detected when omitted)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Remove the add-on and restore the vendor's original files
    Uninstall {
        /// Keep the payload directory (themes, user scripts)
        #[arg(long)]
        keep_user_data: bool,
        /// Proceed even if the original backup is missing
        #[arg(short, long)]
        force: bool,
        /// Show what would happen without touching anything
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List available versions per channel
    Versions {
        /// Bypass the cache and refetch the catalog
        #[arg(short, long)]
        refresh: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let config = InstallerConfig::default();
    let engine = Arc::new(FsInstallEngine::new(&config));
    let mut session = InstallationSession::new(runtime.handle().clone(), config, engine)?;

    match cli.command {
        Commands::Install {
            pre,
            ci,
            tag,
            path,
            dir,
            ..
        } => {
            let channel = if let Some(path) = path {
                Channel::LocalArtifact(path)
            } else if let Some(tag) = tag {
                Channel::CustomTag(tag)
            } else if ci {
                Channel::Ci
            } else if pre {
                Channel::Prerelease
            } else {
                Channel::Release
            };

            load_catalog(&mut session, false)?;
            session.start_install(InstallOptions {
                channel,
                install_dir: dir,
            })?;
            run_to_completion(&mut session)
        }
        Commands::Uninstall {
            keep_user_data,
            force,
            dry_run,
            yes,
        } => {
            if !yes && !confirm("Remove the add-on and restore the original files?")? {
                println!("Aborted.");
                return Ok(());
            }
            load_catalog(&mut session, false)?;
            session.start_uninstall(UninstallOptions {
                keep_user_data,
                force,
                dry_run,
                confirmed: true,
            })?;
            run_to_completion(&mut session)
        }
        Commands::Versions { refresh } => {
            load_catalog(&mut session, refresh)?;
            let catalog = session.catalog().expect("catalog present after load");
            println!("Source: {:?}", catalog.data_source);
            print_channel("Releases", &catalog.releases);
            print_channel("Prereleases", &catalog.prereleases);
            print_channel("CI builds", &catalog.ci_builds);
            if let Some(tag) = catalog.default_tag() {
                println!("\nDefault selection: {tag}");
            }
            Ok(())
        }
    }
}

/// Drive the session until the catalog is loaded.
fn load_catalog(session: &mut InstallationSession, force: bool) -> Result<()> {
    session.refresh_versions(force)?;
    while session.state() == SessionState::LoadingVersions {
        session.poll_event(Duration::from_millis(100));
    }
    Ok(())
}

/// The interactive loop: drain session events, render, exit on the
/// terminal outcome.
fn run_to_completion(session: &mut InstallationSession) -> Result<()> {
    loop {
        let Some(event) = session.poll_event(Duration::from_millis(100)) else {
            continue;
        };
        match event {
            SessionEvent::Progress {
                downloaded,
                total,
                artifact,
            } => {
                if total > 0 {
                    print!(
                        "\r  {} {} / {} ({:.0}%)    ",
                        artifact,
                        format_size(downloaded),
                        format_size(total),
                        downloaded as f64 / total as f64 * 100.0
                    );
                } else {
                    print!("\r  {} {}    ", artifact, format_size(downloaded));
                }
                use std::io::Write;
                let _ = std::io::stdout().flush();
            }
            SessionEvent::Status(msg) => println!("\n{msg}"),
            SessionEvent::Completed { outcome, .. } => {
                println!();
                return match outcome {
                    OperationOutcome::Success(msg) => {
                        println!("{msg}");
                        Ok(())
                    }
                    OperationOutcome::Cancelled => {
                        println!("Cancelled.");
                        Ok(())
                    }
                    OperationOutcome::Failed(kind) => bail!("{kind}"),
                };
            }
            SessionEvent::CatalogLoaded(_) => {}
        }
    }
}

fn print_channel(title: &str, entries: &[VersionEntry]) {
    println!("\n{title}:");
    if entries.is_empty() {
        println!("  (none)");
        return;
    }
    for entry in entries {
        let date = entry.published_display();
        if date.is_empty() {
            println!("  {}  {}", entry.tag, entry.display_name);
        } else {
            println!("  {}  {}  {}", entry.tag, entry.display_name, date);
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;

    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
