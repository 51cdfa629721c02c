//! Watch a network printer's status until Ctrl-C.
//!
//! ```text
//! RUST_LOG=crab_pos_link=debug cargo run -p crab-pos-link --example status_monitor -- 192.168.1.100:9100
//! ```

use crab_pos_link::{
    ConnectMode, LinkConfig, PrinterEvent, PrinterLink, TcpTransport, command,
};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crab_pos_link=debug".into()),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9100".to_string());

    let transport = TcpTransport::from_addr(&addr)?;
    transport.connect().await?;

    let link = PrinterLink::new(transport, LinkConfig::from_env())?;
    let mut events = link.subscribe();
    let mut faults = link.subscribe_faults();
    link.connect(ConnectMode::First)?;

    link.submit_all([
        &command::initialize()[..],
        &command::enable_automatic_status_back()[..],
    ]);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(PrinterEvent::StatusChanged(status)) => {
                    tracing::info!(status = ?status, "Status changed");
                }
                Ok(event) => tracing::info!(?event, "Printer event"),
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "Event receiver lagged"),
                Err(RecvError::Closed) => break,
            },
            fault = faults.recv() => {
                if let Ok(fault) = fault {
                    tracing::debug!(stage = %fault.stage, error = %fault.error, "Link fault");
                }
            }
        }
    }

    link.shutdown().await;
    Ok(())
}
