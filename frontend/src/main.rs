use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use marquee_core::host::Host;
use marquee_core::session::Controller;
use marquee_machines::{FrameClock, RomBoard, TablePalette, registry};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod host;
mod rom_path;
mod snapshot;
mod storage;

use config::Config;
use host::{ConsoleUi, HeadlessPlatform, NullSound, PortInput};
use rom_path::RomPath;
use snapshot::SnapshotError;
use storage::FsStorage;

/// Run an arcade driver headless for a fixed number of frames.
#[derive(Debug, Parser)]
#[command(name = "marquee", version)]
struct Cli {
    /// Driver short name, e.g. `pacman`.
    driver: Option<String>,

    /// List the available drivers and exit.
    #[arg(long)]
    list: bool,

    /// Configuration file (default: `<config dir>/marquee/marquee.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// ROM path entry: a directory of sets or a set's ZIP file. Repeatable;
    /// replaces `rom_path` from the configuration file.
    #[arg(long = "rompath", short = 'r')]
    rom_path: Vec<PathBuf>,

    /// Frames to emulate before quitting.
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    frames: u64,

    /// Soft-reset the machine once after this many frames.
    #[arg(long)]
    reset_after: Option<u64>,

    /// Save the last frame as a PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Accept ROMs whose CRC-32 does not match.
    #[arg(long)]
    skip_checksums: bool,

    /// Bitmap depth for direct-colour drivers (15 or 32).
    #[arg(long)]
    depth: Option<u8>,

    #[arg(long)]
    skip_disclaimer: bool,

    #[arg(long)]
    skip_warnings: bool,

    #[arg(long)]
    cheat: bool,
}

impl Cli {
    /// Flags given on the command line win over the file.
    fn apply(&self, config: &mut Config) {
        if !self.rom_path.is_empty() {
            config.rom_path = self.rom_path.clone();
        }
        if self.depth.is_some() {
            config.color_depth = self.depth;
        }
        config.skip_disclaimer |= self.skip_disclaimer;
        config.skip_warnings |= self.skip_warnings;
        config.cheat |= self.cheat;
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.list {
        list_drivers();
        return;
    }
    std::process::exit(run(&cli));
}

fn list_drivers() {
    for driver in registry::all() {
        let parent = driver
            .clone_of
            .map(|parent| format!(" [clone of {}]", parent.name))
            .unwrap_or_default();
        println!(
            "{:<10} {} ({} {}){parent}",
            driver.name, driver.description, driver.year, driver.manufacturer
        );
    }
}

fn run(cli: &Cli) -> i32 {
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "bad configuration");
            return 1;
        }
    };
    cli.apply(&mut config);
    let options = match config.to_options() {
        Ok(options) => options,
        Err(err) => {
            error!(%err, "bad configuration");
            return 1;
        }
    };

    let Some(name) = cli.driver.as_deref() else {
        error!("no driver given; use --list to see the available ones");
        return 1;
    };
    let Some(driver) = registry::find(name) else {
        let names: Vec<_> = registry::all().iter().map(|driver| driver.name).collect();
        error!(driver = name, available = %names.join(", "), "unknown driver");
        return 1;
    };

    let data_dir = config.data_dir();
    let roots = config.rom_path.clone();
    info!(driver = driver.name, data = %data_dir.display(), roots = roots.len(), "starting");

    let mut clock = FrameClock::new().with_frame_limit(cli.frames);
    if let Some(frames) = cli.reset_after {
        clock = clock.with_reset_after(frames);
    }
    let board = RomBoard::new(Box::new(RomPath::new(roots.clone())));
    let board = if cli.skip_checksums { board.skip_checksums() } else { board };

    let capture = Rc::new(RefCell::new(None));
    let storage = FsStorage::new(data_dir, roots);
    let host = Host {
        platform: Box::new(HeadlessPlatform::new(Rc::clone(&capture))),
        cpu: Box::new(clock),
        memory: Box::new(board),
        input: Box::new(PortInput::new(storage.cfg_dir())),
        palette: Box::new(TablePalette::new()),
        sound: Box::new(NullSound::default()),
        ui: Box::new(ConsoleUi::new()),
    };

    let mut controller = Controller::new(host, Box::new(storage), options);
    let status = controller.run_game(driver);

    if let Some(path) = &cli.snapshot {
        let saved = match capture.borrow().as_ref() {
            Some(frame) => snapshot::write_png(path, frame),
            None => Err(SnapshotError::NoFrame),
        };
        match saved {
            Ok(()) => info!(path = %path.display(), "snapshot saved"),
            Err(err) => {
                warn!(path = %path.display(), %err, "snapshot not saved");
                return status.max(1);
            }
        }
    }
    status
}
