//! Resolve the recipients named on the command line and print the ones mail
//! would be delivered to.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use sendlist::Resolver;
use sendlist_common::{ResolverConfig, logging};

/// sysexits(3) EX_NOUSER: addressee unknown.
const EX_NOUSER: u8 = 67;

/// Expand aliases, :include: and .forward files for a list of recipients
#[derive(Parser, Debug)]
#[command(name = "sendlist")]
#[command(version)]
struct Cli {
    /// Configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// aliases(5) file, overriding `alias_file` in the configuration
    #[arg(short, long)]
    aliases: Option<PathBuf>,

    /// passwd(5) file, overriding `passwd_file` in the configuration
    #[arg(short, long)]
    passwd: Option<PathBuf>,

    /// Allow programs, files and :include:s without a trusted controller
    #[arg(short, long)]
    force: bool,

    /// Split lists without `, ; < (` on whitespace
    #[arg(long)]
    old_style: bool,

    /// Print the expansion tree to stderr
    #[arg(long)]
    tree: bool,

    /// Recipients; `user at host` is read as `user@host`
    #[arg(required = true)]
    addresses: Vec<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init();

    let mut config = match cli.config {
        Some(path) => ResolverConfig::load(path)?,
        None => match find_config_file()? {
            Some(path) => ResolverConfig::load(path)?,
            None => ResolverConfig::default(),
        },
    };

    if cli.aliases.is_some() {
        config.alias_file = cli.aliases;
    }
    if cli.passwd.is_some() {
        config.passwd_file = cli.passwd;
    }
    config.force_mail |= cli.force;
    config.old_style_addresses |= cli.old_style;

    let mut resolver = Resolver::new(config)?;
    resolver.send_to_argv(&cli.addresses);
    let resolution = resolver.finish();

    if cli.tree {
        eprint!("{}", resolution.render_tree());
    }

    for diagnostic in resolution.diagnostics().errors() {
        eprintln!("{diagnostic}");
    }

    for node in resolution.deliverable() {
        println!("{} {}", node.address.mailer, node.address);
    }

    Ok(if resolution.has_bad_addresses() {
        ExitCode::from(EX_NOUSER)
    } else {
        ExitCode::SUCCESS
    })
}

/// Find the configuration file using the following precedence:
/// 1. `SENDLIST_CONFIG` environment variable
/// 2. ./sendlist.config.ron (current working directory)
/// 3. /etc/sendlist/sendlist.config.ron (system-wide config)
///
/// Without any of them the defaults are used.
fn find_config_file() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(env_path) = std::env::var("SENDLIST_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "SENDLIST_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./sendlist.config.ron"),
        PathBuf::from("/etc/sendlist/sendlist.config.ron"),
    ];

    Ok(default_paths.into_iter().find(|path| path.exists()))
}
