use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use vlc::config;
use vlc::coordinator::Coordinator;
use vlc::device::CbcDevice;
use vlc::platform::SystemCtlActuator;
use vlc::{heartbeat, ipc, signals, wakeup};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CBC lifecycle character device.
    #[arg(long, env = "VLC_LIFECYCLE_DEVICE", default_value = "/dev/cbc-lifecycle")]
    lifecycle_device: PathBuf,

    /// Local IPC socket path this process listens on.
    #[arg(long, env = "VLC_LOCAL_SOCKET", default_value = "sos-lcs")]
    local_socket: PathBuf,

    /// VMM IPC socket path this process negotiates against.
    #[arg(long, env = "VLC_VMM_SOCKET", default_value = "acrnd")]
    vmm_socket: PathBuf,

    /// Match-file used to decide whether a VMM is already known to be present.
    #[arg(long, env = "VLC_MATCH_FILE", default_value = config::DEFAULT_MATCH_FILE)]
    match_file: PathBuf,
}

fn main() -> vlc::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("INFO"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let device = match CbcDevice::open(&args.lifecycle_device) {
        Ok(device) => device,
        Err(e) => {
            log::error!("cannot open {}: {e}", args.lifecycle_device.display());
            std::process::exit(1);
        }
    };

    let vmm_present = config::vmm_present(&args.match_file);
    info!("vmm present: {vmm_present}");

    let coordinator = Arc::new(Coordinator::new(
        device,
        args.local_socket.clone(),
        args.vmm_socket.clone(),
        vmm_present,
    ));

    signals::install()?;

    let sig_coordinator = Arc::clone(&coordinator);
    std::thread::spawn(move || signals::supervise(&sig_coordinator));

    let wakeup_coordinator = Arc::clone(&coordinator);
    std::thread::spawn(move || wakeup::run(&wakeup_coordinator));

    let ipc_coordinator = Arc::clone(&coordinator);
    let local_socket = args.local_socket.clone();
    std::thread::spawn(move || {
        if let Err(e) = ipc::server::serve(ipc_coordinator, &local_socket) {
            log::error!("ipc server exited: {e}");
        }
    });

    // No VMM known at startup: also answer on the VMM's own socket address,
    // so a STOP sent there falls into the local SHUTDOWN/SUSPEND path
    // (spec.md §4.6).
    if !vmm_present {
        let stop_coordinator = Arc::clone(&coordinator);
        let vmm_socket = args.vmm_socket.clone();
        std::thread::spawn(move || {
            if let Err(e) = ipc::server::serve(stop_coordinator, &vmm_socket) {
                log::error!("vmm-address stop listener exited: {e}");
            }
        });
    }

    let actuator = SystemCtlActuator;
    heartbeat::run(&coordinator, &actuator, &args.vmm_socket);
    Ok(())
}
