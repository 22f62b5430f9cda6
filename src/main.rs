//! Bakery CLI entry point.

use std::process::ExitCode;

use bakery::cli::{Cli, CommandDispatcher};
use bakery::multistep::CancelToken;
use bakery::secrets::{LogMasker, OutputMasker};
use bakery::ui::create_ui;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Log lines go to stderr through `masker`.
fn init_tracing(debug: bool, masker: LogMasker) {
    let filter = if debug {
        EnvFilter::new("bakery=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bakery=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(masker))
        .with(filter)
        .init();
}

/// Trip `token` on SIGINT/SIGTERM. A second signal exits at once.
fn install_signal_handlers(token: &CancelToken) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::flag;

    for signal in [SIGINT, SIGTERM] {
        flag::register_conditional_shutdown(signal, 130, token.flag())?;
        flag::register(signal, token.flag())?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_masker = LogMasker::new();
    init_tracing(cli.debug, log_masker.clone());

    tracing::debug!("Bakery starting with args: {:?}", cli);

    let ui = create_ui(cli.output_mode(), OutputMasker::new(), None, cli.no_color);

    let cancel = CancelToken::new();
    if let Err(e) = install_signal_handlers(&cancel) {
        tracing::warn!("Could not install signal handlers: {}", e);
    }

    let dispatcher = CommandDispatcher::new(cancel).with_log_masker(log_masker);

    match dispatcher.dispatch(&cli, ui.as_ref()) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(1)
        }
    }
}
