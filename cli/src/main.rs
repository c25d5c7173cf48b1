//! bootlink - install the boot loader into a mounted filesystem
//!
//! ```text
//! bootlink --install /boot/extlinux
//! bootlink --update /boot/extlinux
//! bootlink --once "linux single" /boot/extlinux
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bootlink_core::disk::GeometryOverrides;
use bootlink_core::install::{install_loader, modify_existing_adv};
use bootlink_core::{AdvEdits, BootAssets, ErrorClass, InstallError, InstallOptions};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};

/// Handled failure
const EX_FAILURE: u8 = 1;
/// sysexits EX_USAGE
const EX_USAGE: u8 = 64;
/// Something that should not happen happened
const EX_INTERNAL: u8 = 255;

#[derive(Parser, Debug)]
#[command(author, version, about = "Install the boot loader into a mounted filesystem")]
struct Cli {
    /// Install over the current boot sector
    #[arg(short, long)]
    install: bool,

    /// Update a previous installation
    #[arg(short = 'U', long)]
    update: bool,

    /// Force the number of heads
    #[arg(short = 'H', long, value_parser = clap::value_parser!(u32).range(1..=256))]
    heads: Option<u32>,

    /// Force the number of sectors per track
    #[arg(short = 'S', long, value_parser = clap::value_parser!(u32).range(1..=63))]
    sectors: Option<u32>,

    /// Force zipdrive geometry (64 heads, 32 sectors)
    #[arg(short, long)]
    zipdrive: bool,

    /// Fall back to the next device in the BIOS boot order on failure
    #[arg(short, long)]
    raid: bool,

    /// Only transfer one sector at a time
    #[arg(short, long)]
    stupid: bool,

    /// Reset the auxiliary data
    #[arg(long)]
    reset_adv: bool,

    /// Set a one-time boot command
    #[arg(short, long, value_name = "CMD", conflicts_with = "clear_once")]
    once: Option<String>,

    /// Clear the one-time boot command
    #[arg(short = 'O', long)]
    clear_once: bool,

    /// Set the saved menu label
    #[arg(short = 'M', long, value_name = "LABEL")]
    menu_save: Option<String>,

    /// Boot loader image
    #[arg(long, value_name = "PATH", env = "BOOTLINK_IMAGE")]
    image: PathBuf,

    /// Boot sector stub
    #[arg(long, value_name = "PATH", env = "BOOTLINK_BOOTSECT")]
    bootsect: Option<PathBuf>,

    /// More output, repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Directory to install into
    directory: PathBuf,
}

impl Cli {
    fn installing(&self) -> bool {
        self.install || self.update
    }

    fn adv_edits(&self) -> AdvEdits {
        let once = if self.clear_once {
            Some(String::new())
        } else {
            self.once.clone()
        };

        AdvEdits {
            reset: self.reset_adv,
            once,
            menu_save: self.menu_save.clone(),
        }
    }

    /// Zipdrive first, explicit values on top
    fn geometry(&self) -> GeometryOverrides {
        let mut geometry = if self.zipdrive {
            GeometryOverrides::ZIPDRIVE
        } else {
            GeometryOverrides::default()
        };
        if self.heads.is_some() {
            geometry.heads = self.heads;
        }
        if self.sectors.is_some() {
            geometry.sectors = self.sectors;
        }
        geometry
    }

    fn options(&self) -> InstallOptions {
        InstallOptions {
            update_only: self.update,
            geometry: self.geometry(),
            raid: self.raid,
            stupid: self.stupid,
            adv: self.adv_edits(),
        }
    }

    /// Cross-argument rules clap cannot express
    fn validate(&self) -> std::result::Result<(), clap::Error> {
        if !self.installing() && self.adv_edits().is_empty() {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "one of --install, --update or an ADV option is required",
            ));
        }
        if self.installing() && self.bootsect.is_none() {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "--bootsect (or BOOTLINK_BOOTSECT) is required to install",
            ));
        }
        Ok(())
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let directory = &cli.directory;

    if cli.installing() {
        let bootsect = cli
            .bootsect
            .as_deref()
            .context("no boot sector stub given")?;
        let mut assets = BootAssets::load(&cli.image, bootsect)?;
        log::debug!(
            "loaded {} ({} sectors with ADV)",
            cli.image.display(),
            assets.sector_count()
        );

        install_loader(directory, &mut assets, &cli.options())
            .with_context(|| format!("installing into {}", directory.display()))?;
    } else {
        let image_len = fs::metadata(&cli.image)
            .with_context(|| format!("stat {}", cli.image.display()))?
            .len();

        modify_existing_adv(directory, image_len, &cli.adv_edits())
            .with_context(|| format!("updating ADV in {}", directory.display()))?;
    }

    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<InstallError>().map(InstallError::class) {
        Some(ErrorClass::Internal) => EX_INTERNAL,
        _ => EX_FAILURE,
    }
}

fn usage(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::from(EX_USAGE),
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage(e),
    };
    init_logger(cli.verbose);

    if let Err(e) = cli.validate() {
        return usage(e);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("failed: {:?}", e);
            eprintln!("bootlink: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
