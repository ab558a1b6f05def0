use gridx_monitor::{
    config::Config,
    console::{parse_command, ConsoleCommand},
    monitor::{Monitor, MonitorSettings},
    report::{status_line, trend_table},
    ws::TungsteniteConnector,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridx_monitor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting gridx-monitor");

    // Load configuration
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());

    let config = Config::load(&config_path)?;
    info!("Configuration loaded from: {}", config_path);

    let mut monitor = Monitor::new(
        Arc::new(TungsteniteConnector::new(config.server.connect_timeout())),
        MonitorSettings::from(&config),
    );
    monitor.start();

    let mut link = monitor.subscribe_connection();
    let mut report = tokio::time::interval(Duration::from_secs(config.display.report_interval_secs));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *link.borrow_and_update();
                info!("Link {}", state);
            }
            _ = report.tick() => {
                println!("{}", status_line(&monitor.view(), monitor.connection_state()));
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_line(&monitor, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("stdin closed; commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    monitor.shutdown().await;
    info!("Monitor shutdown complete");
    Ok(())
}

/// Run one operator command. Returns false when the operator asked to quit.
fn handle_line(monitor: &Monitor, line: &str) -> bool {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            warn!("{}", e);
            return true;
        }
    };

    match command {
        ConsoleCommand::SetRelay { index, state } => {
            if let Err(e) = monitor.set_relay(index, state) {
                error!("Relay {} not switched: {}", index + 1, e);
            }
        }
        ConsoleCommand::ToggleRelay { index } => match monitor.toggle_relay(index) {
            Ok(state) => info!("Relay {} requested {}", index + 1, if state { "on" } else { "off" }),
            Err(e) => error!("Relay {} not switched: {}", index + 1, e),
        },
        ConsoleCommand::Status => {
            println!("{}", status_line(&monitor.view(), monitor.connection_state()));
        }
        ConsoleCommand::Trend => {
            print!("{}", trend_table(&monitor.trend()));
        }
        ConsoleCommand::Quit => return false,
    }

    true
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
