//! lm-ctl: ask a running life-mngr to shut things down.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use lifecycle_core::{AdminReply, AdminRequest};

#[derive(Parser, Debug)]
#[command(name = "lm-ctl")]
#[command(about = "Send shutdown requests to the life-mngr admin socket")]
struct Args {
    /// Admin socket of the running daemon
    #[arg(
        short,
        long,
        env = "LM_SOCKET_PATH",
        default_value = "/var/lib/life_mngr/monitor.sock"
    )]
    socket: PathBuf,

    /// Seconds to wait for the reply (the daemon settles before answering)
    #[arg(short, long, default_value = "30")]
    wait: u64,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Shut down the whole system (forwarded upstream when run in a user VM)
    ShutdownHost,
    /// Shut down one user VM by name
    ShutdownVm { name: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let request = match args.command {
        Action::ShutdownHost => AdminRequest::SystemShutdown,
        Action::ShutdownVm { name } => AdminRequest::UserVmShutdown { vm_name: name },
    };

    let reply = lm_ctl::request(&args.socket, &request, Duration::from_secs(args.wait)).await?;
    println!("{}", reply);
    Ok(match reply {
        AdminReply::UserVmDisconnect => ExitCode::FAILURE,
        AdminReply::AckReqSysShutdown | AdminReply::AckReqUserVmShutdown => ExitCode::SUCCESS,
    })
}
