//! Asset store: the asset-id-keyed map plus bounded asset history, and the
//! four `@...ASSET...@` command verbs (`spec.md` §4.4).

use crate::models::asset::{Asset, AssetCommand, AssetUpdate, XmlNode};
use crate::models::observation::ObservationValue;
use crate::xmltree;
use std::collections::{HashMap, VecDeque};

pub const ASSET_CHANGED_ID: &str = "dev_asset_chg";
pub const ASSET_REMOVED_ID: &str = "dev_asset_rem";

/// A derived event an asset command must also record in observation history
/// (`spec.md` §3 invariant on `ASSET_CHANGED`/`ASSET_REMOVED`).
#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    pub time: String,
    pub id: String,
    pub name: String,
    pub value: ObservationValue,
}

impl SyntheticEvent {
    fn changed(time: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            id: ASSET_CHANGED_ID.to_string(),
            name: ASSET_CHANGED_ID.to_string(),
            value: ObservationValue::Scalar(asset_id.into()),
        }
    }

    fn removed(time: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            id: ASSET_REMOVED_ID.to_string(),
            name: ASSET_REMOVED_ID.to_string(),
            value: ObservationValue::Scalar(asset_id.into()),
        }
    }
}

pub struct AssetStore {
    capacity: usize,
    hash_asset_current: HashMap<String, Asset>,
    buffer: VecDeque<Asset>,
    next_asset_seq: u64,
    last_changed_asset_id: Option<String>,
}

impl AssetStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            hash_asset_current: HashMap::new(),
            buffer: VecDeque::new(),
            next_asset_seq: 1,
            last_changed_asset_id: None,
        }
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.hash_asset_current.get(id)
    }

    pub fn buffer(&self) -> impl Iterator<Item = &Asset> {
        self.buffer.iter()
    }

    fn push_snapshot(&mut self, asset: Asset) {
        self.hash_asset_current.insert(asset.asset_id.clone(), asset.clone());
        self.buffer.push_back(asset);
        if self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_asset_seq;
        self.next_asset_seq += 1;
        seq
    }

    /// Apply one parsed asset command, returning the observation-history
    /// events it must also produce.
    pub fn apply(&mut self, cmd: AssetCommand) -> Vec<SyntheticEvent> {
        match cmd {
            AssetCommand::Asset { time, asset_id, asset_type, body } => {
                self.apply_create(time, asset_id, asset_type, body)
            }
            AssetCommand::UpdateAsset { time, asset_id, update } => {
                self.apply_update(time, asset_id, update)
            }
            AssetCommand::RemoveAsset { time, asset_id } => self.remove_one(&asset_id, &time),
            AssetCommand::RemoveAllAssets { time, asset_type } => self.remove_all(&time, &asset_type),
        }
    }

    fn apply_create(&mut self, time: String, asset_id: String, asset_type: String, body: String) -> Vec<SyntheticEvent> {
        let value = xmltree::parse_fragment(&body).unwrap_or_else(|_| {
            tracing::warn!(asset_id, "asset body is not well-formed XML, storing as opaque text");
            let mut node = XmlNode::element(asset_type.clone());
            node.set_text(body.clone());
            node
        });
        let sequence = self.next_seq();
        self.push_snapshot(Asset {
            asset_id: asset_id.clone(),
            asset_type,
            time: time.clone(),
            value,
            removed: false,
            sequence,
        });
        self.last_changed_asset_id = Some(asset_id.clone());
        vec![SyntheticEvent::changed(time, asset_id)]
    }

    fn apply_update(&mut self, time: String, asset_id: String, update: AssetUpdate) -> Vec<SyntheticEvent> {
        let Some(mut asset) = self.hash_asset_current.get(&asset_id).cloned() else {
            tracing::warn!(asset_id, "update targeting unknown asset, skipping");
            return Vec::new();
        };

        match update {
            AssetUpdate::KeyValue(pairs) => {
                for (element, text) in pairs {
                    if let Some(found) = asset.value.find_first_mut(&element) {
                        found.set_text(text);
                    } else {
                        tracing::warn!(asset_id, element, "update target element not found");
                    }
                }
            }
            AssetUpdate::Fragment(fragment) => match xmltree::parse_fragment(&fragment) {
                Ok(new_node) => {
                    if let Some(name) = new_node.name().map(str::to_string) {
                        match asset.value.find_first_mut(&name) {
                            Some(target) => *target = new_node,
                            None => tracing::warn!(asset_id, name, "fragment update target not found"),
                        }
                    }
                }
                Err(_) => tracing::warn!(asset_id, "malformed update fragment, ignoring"),
            },
        }

        asset.time = time.clone();
        asset.sequence = self.next_seq();
        self.push_snapshot(asset);
        self.last_changed_asset_id = Some(asset_id.clone());
        vec![SyntheticEvent::changed(time, asset_id)]
    }

    fn remove_one(&mut self, asset_id: &str, time: &str) -> Vec<SyntheticEvent> {
        let Some(asset) = self.hash_asset_current.get(asset_id) else {
            tracing::warn!(asset_id, "remove targeting unknown asset, skipping");
            return Vec::new();
        };
        if asset.removed {
            return Vec::new();
        }
        let mut snapshot = asset.clone();
        snapshot.removed = true;
        snapshot.time = time.to_string();
        snapshot.sequence = self.next_seq();
        self.push_snapshot(snapshot);

        let mut events = vec![SyntheticEvent::removed(time.to_string(), asset_id.to_string())];
        if self.last_changed_asset_id.as_deref() == Some(asset_id) {
            events.push(SyntheticEvent::changed(time.to_string(), "UNAVAILABLE"));
            self.last_changed_asset_id = None;
        }
        events
    }

    /// Candidates come from `hash_asset_current` — the unbounded "latest per
    /// assetId" map — rather than the bounded `buffer`, so an asset whose
    /// only ring snapshots have been evicted by capacity is still found.
    fn remove_all(&mut self, time: &str, asset_type: &str) -> Vec<SyntheticEvent> {
        let mut candidates: Vec<&Asset> = self
            .hash_asset_current
            .values()
            .filter(|a| !a.removed && a.asset_type == asset_type)
            .collect();
        candidates.sort_by_key(|a| a.sequence);
        let ids: Vec<String> = candidates.into_iter().map(|a| a.asset_id.clone()).collect();
        ids.into_iter().flat_map(|id| self.remove_one(&id, time)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset_cmd(id: &str, body: &str) -> AssetCommand {
        AssetCommand::Asset {
            time: "2021-01-01T00:00:00Z".to_string(),
            asset_id: id.to_string(),
            asset_type: "CuttingTool".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn create_emits_asset_changed() {
        let mut store = AssetStore::new(10);
        let events = store.apply(asset_cmd("EM233", "<CuttingTool/>"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, ASSET_CHANGED_ID);
        assert!(store.asset("EM233").is_some());
    }

    #[test]
    fn update_kv_replaces_first_match() {
        let mut store = AssetStore::new(10);
        store.apply(asset_cmd(
            "EM233",
            "<CuttingTool><CuttingToolLifeCycle><ToolLife>0</ToolLife></CuttingToolLifeCycle></CuttingTool>",
        ));
        store.apply(AssetCommand::UpdateAsset {
            time: "2021-01-01T00:01:00Z".to_string(),
            asset_id: "EM233".to_string(),
            update: AssetUpdate::KeyValue(vec![("ToolLife".to_string(), "120".to_string())]),
        });
        let asset = store.asset("EM233").unwrap();
        let mut value = asset.value.clone();
        assert_eq!(value.find_first_mut("ToolLife").unwrap().text_content(), "120");
    }

    #[test]
    fn remove_reverts_asset_changed_when_most_recent() {
        let mut store = AssetStore::new(10);
        store.apply(asset_cmd("EM233", "<CuttingTool/>"));
        let events = store.apply(AssetCommand::RemoveAsset {
            time: "2021-01-01T00:02:00Z".to_string(),
            asset_id: "EM233".to_string(),
        });
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, ASSET_REMOVED_ID);
        assert_eq!(events[1].id, ASSET_CHANGED_ID);
        assert_eq!(events[1].value, ObservationValue::Scalar("UNAVAILABLE".to_string()));
    }

    #[test]
    fn remove_all_by_type_in_creation_order() {
        let mut store = AssetStore::new(10);
        store.apply(asset_cmd("A1", "<CuttingTool/>"));
        store.apply(asset_cmd("A2", "<CuttingTool/>"));
        let events = store.remove_all("2021-01-01T00:03:00Z", "CuttingTool");
        let removed_ids: Vec<&str> = events
            .iter()
            .filter(|e| e.id == ASSET_REMOVED_ID)
            .map(|e| match &e.value {
                ObservationValue::Scalar(s) => s.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(removed_ids, vec!["A1", "A2"]);
        assert_eq!(events.iter().filter(|e| e.id == ASSET_CHANGED_ID).count(), 1);
    }

    #[test]
    fn remove_all_finds_assets_evicted_from_buffer() {
        // capacity 1: creating A2 evicts A1's only snapshot from `buffer`,
        // but A1 is still live in `hash_asset_current` and must be removed.
        let mut store = AssetStore::new(1);
        store.apply(asset_cmd("A1", "<CuttingTool/>"));
        store.apply(asset_cmd("A2", "<CuttingTool/>"));
        assert_eq!(store.buffer().count(), 1);

        let events = store.remove_all("2021-01-01T00:03:00Z", "CuttingTool");
        let removed_ids: Vec<&str> = events
            .iter()
            .filter(|e| e.id == ASSET_REMOVED_ID)
            .map(|e| match &e.value {
                ObservationValue::Scalar(s) => s.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(removed_ids, vec!["A1", "A2"]);
    }
}
