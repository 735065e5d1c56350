//! Shutdown handling for graceful daemon termination
//!
//! The polling loop stops on Ctrl+C or SIGTERM; the cycle in flight finishes
//! first, then the final counters are logged.

use gree_hardware::DriverStats;
use tokio::signal;
use tracing::{error, info};

/// Resolve when the process is asked to stop
pub(crate) async fn signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// One-line summary of the driver's lifetime counters
pub(crate) fn stats_summary(stats: &DriverStats) -> String {
    let link = &stats.link;
    format!(
        "{} cycles ({} failed), {} commands acknowledged, {} dropped; \
         link: {} frames sent, {} received, {} checksum errors, {} invalid, {} timeouts",
        stats.cycles,
        stats.failed_cycles,
        stats.commands_acknowledged,
        stats.commands_dropped,
        link.frames_sent,
        link.frames_received,
        link.checksum_errors,
        link.invalid_frames,
        link.response_timeouts
    )
}

pub(crate) fn log_final_stats(stats: &DriverStats) {
    info!("Driver statistics: {}", stats_summary(stats));
    match serde_json::to_string(stats) {
        Ok(json) => info!(target: "greed::stats", "{}", json),
        Err(e) => error!("Failed to serialize driver statistics: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gree_core::DriverPhase;
    use gree_hardware::LinkStats;

    #[test]
    fn test_stats_summary() {
        let stats = DriverStats {
            phase: DriverPhase::Idle,
            cycles: 10,
            failed_cycles: 2,
            consecutive_failures: 0,
            commands_acknowledged: 3,
            commands_dropped: 1,
            link: LinkStats {
                frames_sent: 10,
                frames_received: 8,
                checksum_errors: 1,
                response_timeouts: 1,
                ..LinkStats::default()
            },
        };

        let summary = stats_summary(&stats);
        assert!(summary.starts_with("10 cycles (2 failed)"));
        assert!(summary.contains("8 received"));
        assert!(summary.contains("1 checksum errors"));
    }

    #[test]
    fn test_stats_serialize_as_json() {
        let stats = DriverStats {
            phase: DriverPhase::Faulted,
            cycles: 1,
            failed_cycles: 1,
            consecutive_failures: 1,
            commands_acknowledged: 0,
            commands_dropped: 0,
            link: LinkStats::default(),
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"phase\":\"faulted\""));
    }
}
