use clap::Parser;
use std::path::PathBuf;
use vlc::diag::{self, BootTimestampSink, DiagDevices, OUTPUT_ALL, OUTPUT_BOOTLOADER, OUTPUT_FIRMWARE, OUTPUT_MAINBOARD, OUTPUT_NONE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CBC diagnostic device (version/firmware/mainboard queries).
    #[arg(long, env = "VLC_DIAG_DEVICE", default_value = diag::DEFAULT_DIAG_DEVICE)]
    diag_device: PathBuf,

    /// CBC DLT device (boot timestamp queries).
    #[arg(long, env = "VLC_DLT_DEVICE", default_value = diag::DEFAULT_DLT_DEVICE)]
    dlt_device: PathBuf,

    /// Print the bootloader version.
    #[arg(long)]
    bootloader: bool,

    /// Print the firmware version.
    #[arg(long)]
    firmware: bool,

    /// Print the mainboard version.
    #[arg(long)]
    mainboard: bool,

    /// Print all available version fields (overrides the individual flags).
    #[arg(long)]
    all_versions: bool,

    /// Fetch and print boot timestamps.
    #[arg(long)]
    boot_timestamps: bool,

    /// Mirror boot timestamps into this log file in addition to stdout.
    #[arg(long)]
    boot_timestamps_log: Option<PathBuf>,
}

fn main() -> vlc::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("INFO"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let output_selection = if args.all_versions {
        OUTPUT_ALL
    } else {
        let mut flags = OUTPUT_NONE;
        if args.bootloader {
            flags |= OUTPUT_BOOTLOADER;
        }
        if args.firmware {
            flags |= OUTPUT_FIRMWARE;
        }
        if args.mainboard {
            flags |= OUTPUT_MAINBOARD;
        }
        flags
    };

    let sink = match (&args.boot_timestamps, &args.boot_timestamps_log) {
        (false, _) => BootTimestampSink::None,
        (true, None) => BootTimestampSink::Stdout,
        (true, Some(path)) => BootTimestampSink::File(path.clone()),
    };

    let devices = DiagDevices::open(&args.diag_device, &args.dlt_device)?;
    devices.send_requests(output_selection, args.boot_timestamps)?;

    let mut abl_start = None;
    let (version, timestamps) = devices.receive(output_selection, args.boot_timestamps, &mut abl_start)?;

    if let Some(report) = version {
        diag::print_version(&report, output_selection);
    }
    for stamp in &timestamps {
        diag::report_timestamp(stamp, &sink)?;
    }

    Ok(())
}
