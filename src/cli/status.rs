use super::{init_logging, resolve_config_path, unix_now};
use coffer::config::CofferConfig;
use coffer::events::{format_events, EventQuery, TreasuryEvent};
use coffer::store::{FileStore, TreasuryStore};
use coffer::{Treasury, TreasurySummary};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct StatusReport<'a> {
    source: &'a str,
    summary: TreasurySummary,
    events: Vec<TreasuryEvent>,
}

/// Show treasury state.
///
/// Reads the latest snapshot; when none exists yet, shows the genesis state
/// the configuration describes.
pub async fn execute(
    config: Option<String>,
    snapshot: Option<String>,
    events: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = resolve_config_path(config);
    let config = CofferConfig::load(&config_path)?;
    init_logging(&config.logging)?;

    let store = FileStore::new(
        snapshot
            .map(PathBuf::from)
            .unwrap_or_else(FileStore::default_path),
    );
    let now = unix_now();

    let (treasury, source) = match store.load_snapshot().await? {
        Some(envelope) => {
            tracing::debug!(taken_at = envelope.taken_at, "loaded snapshot");
            (Treasury::restore(envelope), "snapshot")
        }
        None => (config.build_treasury(now)?, "genesis"),
    };

    let recent = treasury.query_events(&EventQuery {
        limit: Some(events),
        ..EventQuery::default()
    });

    if json {
        let report = StatusReport {
            source,
            summary: treasury.summary(now),
            events: recent,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if source == "snapshot" {
        println!("Snapshot: {}", store.path().display());
    } else {
        println!("No snapshot at {}; showing genesis state", store.path().display());
    }
    println!();
    println!("{}", treasury.summary(now));
    println!();
    println!("{}", format_events(&recent, now));
    Ok(())
}
