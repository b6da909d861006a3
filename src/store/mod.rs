//! Storage model: ring-buffered history, current/last hash maps, and the
//! asset store, combined behind one facade the ingest sequencer mutates and
//! HTTP handlers read (`spec.md` §3, §4.3, §4.4).

pub mod assets;
pub mod history;
pub mod sequencer;

use crate::shdr::ParseOutcome;
use assets::AssetStore;
use history::History;

pub use history::{HistoryError, SequenceWindow};
pub use sequencer::IngestSequencer;

pub struct Store {
    history: History,
    assets: AssetStore,
}

impl Store {
    pub fn new(history_capacity: usize, asset_capacity: usize) -> Self {
        Self {
            history: History::new(history_capacity),
            assets: AssetStore::new(asset_capacity),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Apply one parser outcome: observations go straight to history; asset
    /// commands mutate the asset store and feed their derived
    /// `ASSET_CHANGED`/`ASSET_REMOVED` events back into history with the
    /// command's own timestamp.
    pub fn apply_outcome(&mut self, outcome: ParseOutcome) {
        match outcome {
            ParseOutcome::Observations { time, items } => {
                for item in items {
                    self.history.record(&time, &item.id, &item.name, item.value);
                }
            }
            ParseOutcome::Asset(cmd) => {
                for event in self.assets.apply(cmd) {
                    self.history.record_unconditional(&event.time, &event.id, &event.name, event.value);
                }
            }
            ParseOutcome::Buffering | ParseOutcome::Skipped(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shdr::ParsedObservation;
    use crate::models::asset::AssetCommand;
    use crate::models::observation::ObservationValue;

    #[test]
    fn observations_land_in_history() {
        let mut store = Store::new(100, 10);
        store.apply_outcome(ParseOutcome::Observations {
            time: "2021-01-01T00:00:00Z".to_string(),
            items: vec![ParsedObservation {
                id: "avail".to_string(),
                name: "avail".to_string(),
                value: ObservationValue::Scalar("AVAILABLE".to_string()),
            }],
        });
        assert!(store.history().current("avail").is_some());
    }

    #[test]
    fn asset_command_emits_changed_event_into_history() {
        let mut store = Store::new(100, 10);
        store.apply_outcome(ParseOutcome::Asset(AssetCommand::Asset {
            time: "2021-01-01T00:00:00Z".to_string(),
            asset_id: "EM233".to_string(),
            asset_type: "CuttingTool".to_string(),
            body: "<CuttingTool/>".to_string(),
        }));
        assert!(store.assets().asset("EM233").is_some());
        let changed = store.history().current(assets::ASSET_CHANGED_ID).unwrap();
        assert_eq!(changed.value, ObservationValue::Scalar("EM233".to_string()));
    }
}
