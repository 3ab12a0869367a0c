// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Hello FUSE Host
//!
//! Mounts a read-only filesystem containing a single file, `hello`, at the
//! given mount point and serves it until unmounted.

#[cfg(all(feature = "fuse", target_os = "linux"))]
mod adapter;
mod config;
mod logging;
mod mount_opts;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use config::{load_config, HostConfig};
use logging::LoggingArgs;
use mount_opts::MountOpt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const COMPONENT: &str = "hellofs-fuse-host";

#[derive(Parser, Debug)]
#[command(name = COMPONENT, version, about = "Mount the hello filesystem")]
struct Args {
    /// Mount point for the filesystem
    mount_point: Option<PathBuf>,

    /// Mount options, comma separated (allow_other, auto_unmount, ro, fsname=NAME, ...)
    #[arg(short = 'o', value_name = "OPT[,OPT...]")]
    options: Vec<String>,

    /// Stay in the foreground after mounting
    #[arg(short, long)]
    foreground: bool,

    /// Debug mode: implies --foreground and debug logging
    #[arg(short, long)]
    debug: bool,

    /// Serve requests on the main thread instead of a session thread
    #[arg(short, long)]
    single_thread: bool,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    logging: LoggingArgs,
}

impl Args {
    /// Command-line switches can only turn behaviour on; the config file
    /// supplies everything else.
    fn apply_to(&self, config: &mut HostConfig) {
        config.foreground |= self.foreground || self.debug;
        config.single_thread |= self.single_thread;
    }
}

fn usage() -> String {
    format!("usage: {COMPONENT} [options] <mountpoint>\n       {COMPONENT} --help")
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let Some(mount_point) = args.mount_point.clone() else {
        println!("{}", usage());
        return ExitCode::FAILURE;
    };

    match run(&args, &mount_point) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Console logging already shares stderr with the message below.
            if args.logging.log_file.is_some() {
                error!("{err:#}");
            }
            eprintln!("{COMPONENT}: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, mount_point: &Path) -> Result<()> {
    args.logging.init(COMPONENT, args.debug)?;

    let mut config = load_config(args.config.as_deref())?;
    args.apply_to(&mut config);

    let explicit = mount_opts::parse_options(config.options.iter().chain(&args.options))
        .context("invalid mount option")?;
    let options = mount_opts::resolve(&config, explicit);

    info!("Starting hello FUSE host");
    info!("Mount point: {}", mount_point.display());
    info!(
        foreground = config.foreground,
        single_thread = config.single_thread,
        "Mount options: {:?}",
        options
    );

    serve(&config, mount_point, &options)?;
    info!("Filesystem unmounted");
    Ok(())
}

#[cfg(all(feature = "fuse", target_os = "linux"))]
fn serve(config: &HostConfig, mount_point: &Path, options: &[MountOpt]) -> Result<()> {
    use adapter::HelloFuse;
    use hellofs_core::HelloFs;
    use std::thread;

    let mount_options: Vec<fuser::MountOption> =
        options.iter().map(fuser::MountOption::from).collect();

    info!("Mounting filesystem...");
    let filesystem = HelloFuse::new(HelloFs::new());
    let mut session = fuser::Session::new(filesystem, mount_point, &mount_options)
        .with_context(|| format!("mount {}", mount_point.display()))?;

    // Detach only once the mount exists so that mount errors still reach the
    // terminal, and before any thread is started.
    if !config.foreground {
        nix::unistd::daemon(false, false).context("detach from terminal")?;
    }

    install_signal_handlers(session.unmount_callable())?;

    if config.single_thread {
        info!("Serving on the main thread; blocking until unmount");
        session.run().context("serve filesystem requests")?;
    } else {
        let worker = thread::Builder::new()
            .name("hellofs-session".to_string())
            .spawn(move || session.run())
            .context("start session thread")?;
        info!("Hello FUSE host mounted; blocking until unmount");
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("session thread panicked"))?
            .context("serve filesystem requests")?;
    }
    Ok(())
}

/// SIGINT, SIGTERM and SIGHUP unmount the filesystem, which ends the session
/// loop the same way an external `fusermount -u` does.
#[cfg(all(feature = "fuse", target_os = "linux"))]
fn install_signal_handlers(mut unmounter: fuser::SessionUnmounter) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Termination signal received; unmounting");
        if let Err(err) = unmounter.unmount() {
            tracing::warn!("Unmount on signal failed: {err}");
        }
    })
    .context("install signal handlers")
}

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
fn serve(config: &HostConfig, mount_point: &Path, options: &[MountOpt]) -> Result<()> {
    let _ = (config, options);
    anyhow::bail!(
        "cannot mount {}: FUSE support not compiled in; rebuild with --features fuse on Linux",
        mount_point.display()
    )
}
