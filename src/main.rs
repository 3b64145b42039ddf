use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use dumpstub::loader::{crashlog, elf};
use dumpstub::{DebugState, DisconnectReason, GdbStub, StdioConnection};

/// Serve a captured crash state to GDB over the Remote Serial Protocol.
///
/// Speaks RSP on stdin/stdout, so GDB can attach with
/// `target remote | dumpstub --log crash.log --elf app.elf`.
#[derive(Parser)]
#[command(name = "dumpstub", version)]
struct Cli {
    /// Post-mortem register + memory dump to ingest
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// ELF binary whose loadable segments become memory regions
    #[arg(long, value_name = "FILE")]
    elf: Option<PathBuf>,
}

fn build_state(cli: &Cli) -> Result<DebugState, Box<dyn std::error::Error>> {
    let mut state = match &cli.log {
        Some(path) => crashlog::load(path)?,
        None => DebugState::new(),
    };
    if let Some(path) = &cli.elf {
        elf::load_into(&mut state, path)?;
    }
    Ok(state)
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let cli = Cli::parse();

    if cli.log.is_none() && cli.elf.is_none() {
        eprintln!("dumpstub: at least one of --log or --elf is required");
        return ExitCode::from(2);
    }

    let mut state = match build_state(&cli) {
        Ok(state) => state,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    {
        let regs = state.regs();
        info!(
            "serving crash state: pc={:#010x} ps={:#010x} (intlevel {}, {:?}), {} memory region(s)",
            regs.pc,
            regs.ps,
            regs.intlevel(),
            regs.ps_flags(),
            state.regions().len()
        );
    }

    let mut pkt_buf = [0u8; 1024];
    let mut stub = GdbStub::new(StdioConnection::new(), &mut pkt_buf);
    match stub.run(&mut state) {
        Ok(DisconnectReason::Detach) => {
            info!("client detached");
            ExitCode::SUCCESS
        }
        Ok(DisconnectReason::Resume) => {
            info!("client resumed a post-mortem target; nothing left to serve");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("session error: {}", e);
            ExitCode::FAILURE
        }
    }
}
