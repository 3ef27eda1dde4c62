//! Offline catch-up: fast-forward an absence with the engine's net rates.
//!
//! The absence is approximated in one step from the roster and modifiers as
//! they stand at load time. Nothing is re-simulated tick by tick, so a stall
//! or a school finished mid-absence is not modeled, and population growth
//! only happens in live ticks.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use village_core::ResourceKind;
use village_econ::{ModifierProviders, ProductionEngine};

use persistence::SaveEnvelope;

/// What an absence produced, for display.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineReport {
    /// Simulated seconds after the cap.
    pub seconds: u64,
    /// Net change per kind before the zero floor; kinds that did not move are omitted.
    pub resources: BTreeMap<ResourceKind, f64>,
    /// Progress added to the current research project, if one was running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_progress: Option<f64>,
}

/// Whole seconds between the last update and `now_ms`, or `None` when the
/// timestamp is unknown.
fn elapsed_seconds(last_update_ms: i64, now_ms: i64) -> Option<i64> {
    if last_update_ms <= 0 {
        return None;
    }
    Some(now_ms.saturating_sub(last_update_ms).div_euclid(1000))
}

/// Apply an absence to a migrated envelope.
///
/// Returns `None` and leaves the envelope untouched when the last-update
/// timestamp is missing or the absence is shorter than the configured minimum.
pub fn apply(
    engine: &ProductionEngine<'_>,
    providers: &dyn ModifierProviders,
    envelope: &mut SaveEnvelope,
    now_ms: i64,
) -> Option<OfflineReport> {
    let offline = &engine.config().offline;
    let elapsed = elapsed_seconds(envelope.last_update_epoch_ms, now_ms)?;
    let elapsed = u64::try_from(elapsed).ok()?;
    if elapsed < offline.min_seconds {
        return None;
    }
    let seconds = elapsed.min(offline.max_seconds);
    let span = seconds as f64;

    let state = &mut envelope.state;
    let rates = engine.total_rates(state, providers);
    let speed = engine.research_speed_multiplier(state);

    let mut report = OfflineReport {
        seconds,
        ..OfflineReport::default()
    };
    for (kind, net) in rates.net_rates() {
        let gained = net * span;
        if gained != 0.0 && state.resources.adjust(kind.as_str(), gained) {
            report.resources.insert(kind, gained);
        }
    }
    if let Some(current) = state.research.current.as_mut() {
        let before = current.progress_seconds;
        current.progress_seconds = (before + span * speed).min(current.required_seconds.max(before));
        report.research_progress = Some(current.progress_seconds - before);
    }
    state.game_time_seconds += span;
    envelope.last_update_epoch_ms = now_ms;

    info!(
        seconds,
        elapsed,
        kinds = report.resources.len(),
        "applied offline progress"
    );
    Some(report)
}
