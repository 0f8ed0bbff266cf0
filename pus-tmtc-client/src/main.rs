use clap::Parser;
use pus_tmtc::clock::SystemClock;
use pus_tmtc_client::cli::Cli;
use pus_tmtc_client::config::ConfigFile;
use pus_tmtc_client::handler::TmTcHandler;
use pus_tmtc_client::interface::create_com_interface;
use pus_tmtc_client::logging::setup_logger;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match ConfigFile::load(&cli.config).and_then(|file| cli.into_client_config(file)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = setup_logger(&cfg.log_file, log::LevelFilter::Info) {
        eprintln!("setting up logging with fern failed: {e}");
        return ExitCode::FAILURE;
    }
    log::info!("-- PUS TMTC client --");
    log::info!("operation mode: {}", cfg.mode.description());

    let com_if = match create_com_interface(&cfg.interface, cfg.tmtc.apid) {
        Ok(com_if) => com_if,
        Err(e) => {
            log::error!("creating the communication interface failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut handler = match TmTcHandler::new(cfg, com_if, Arc::new(SystemClock::default())) {
        Ok(handler) => handler,
        Err(e) => {
            log::error!("starting the TM listener failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let exit_handle = handler.exit_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("keyboard interrupt received");
        exit_handle.exit();
        std::process::exit(0);
    }) {
        log::warn!("installing the interrupt handler failed: {e}");
    }

    let result = handler.perform_operation();
    handler.shutdown();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("TMTC client operation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
