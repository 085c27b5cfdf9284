use crate::cli::args::{Args, Command, ConfigCommand};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::bridge::Supervisor;
use crate::domain::config::BridgeConfig;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{list_ports, SystemSerialOpener};
use std::sync::Arc;
use tracing::error;

/// Execute CLI command
pub async fn execute_command(args: Args) -> BridgeResult<()> {
    let writer = ConsoleWriter::new(args.output);

    let config_manager = ConfigManager::new();
    let mut config = match &args.config {
        Some(path) => config_manager.load_config_from_path(path)?,
        None => config_manager.load_config()?,
    };
    args.bridge.apply(&mut config);

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_bridge(config, &writer).await,
        Command::Ports => {
            let ports = list_ports()?;
            writer.write_ports(&ports)?;
            Ok(())
        }
        Command::Config(config_args) => match config_args.command {
            ConfigCommand::Show => {
                writer.write_config(&config)?;
                Ok(())
            }
            ConfigCommand::Init { path, force } => {
                let dir = match path {
                    Some(path) => path,
                    None => std::env::current_dir()?,
                };
                let created = config_manager.init_project_config(&dir, force)?;
                writer.write_message(&format!("Created {}", created.display()))?;
                Ok(())
            }
        },
    }
}

async fn run_bridge(config: BridgeConfig, writer: &ConsoleWriter) -> BridgeResult<()> {
    if config.listen.port == 0 {
        return Err(BridgeError::InvalidInput(
            "Invalid port number: 0".to_string(),
        ));
    }

    let supervisor = Supervisor::bind(config, Arc::new(SystemSerialOpener)).await?;
    let status = supervisor.run(shutdown_signal()).await?;

    writer.write_status(&status)?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the bridge runs until killed
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
