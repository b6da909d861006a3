//! Schema registry: indexes device → component → dataitem trees and
//! resolves the XPath-like query dialect (`spec.md` §4.2).

pub mod path;

use crate::models::device::{Category, Component, DataItem, Device, DeviceSchema};
use crate::shdr::{DataItemLookup, ResolvedDataItem};
use path::ChainNode;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ComponentRef {
    pub id: String,
    pub component_type: String,
}

struct DataItemEntry {
    device_uuid: String,
    component_path: Vec<ComponentRef>,
    dataitem: DataItem,
}

#[derive(Default)]
pub struct SchemaRegistry {
    devices: Vec<Device>,
    uuid_index: HashMap<String, usize>,
    name_to_uuid: HashMap<String, String>,
    items: HashMap<String, DataItemEntry>,
    wire_index: HashMap<(String, String), String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent by device UUID: replaces on reinsert (`spec.md` §4.2).
    pub fn insert_schema(&mut self, schema: DeviceSchema) {
        for device in schema.devices {
            self.insert_device(device);
        }
    }

    pub fn insert_device(&mut self, device: Device) {
        self.remove_device_entries(&device.uuid);
        self.index_device(&device);

        if let Some(&idx) = self.uuid_index.get(&device.uuid) {
            self.devices[idx] = device;
        } else {
            let idx = self.devices.len();
            self.uuid_index.insert(device.uuid.clone(), idx);
            self.name_to_uuid.insert(device.name.clone(), device.uuid.clone());
            self.devices.push(device);
        }
    }

    fn remove_device_entries(&mut self, uuid: &str) {
        self.items.retain(|_, e| e.device_uuid != uuid);
        self.wire_index.retain(|(u, _), _| u != uuid);
    }

    fn index_device(&mut self, device: &Device) {
        for di in &device.dataitems {
            self.add_item(device.uuid.clone(), Vec::new(), di.clone());
        }
        for c in &device.components {
            self.index_component(&device.uuid, Vec::new(), c);
        }
    }

    fn index_component(&mut self, uuid: &str, mut path: Vec<ComponentRef>, c: &Component) {
        path.push(ComponentRef {
            id: c.id.clone(),
            component_type: c.component_type.clone(),
        });
        for di in &c.dataitems {
            self.add_item(uuid.to_string(), path.clone(), di.clone());
        }
        for child in &c.components {
            self.index_component(uuid, path.clone(), child);
        }
    }

    fn add_item(&mut self, uuid: String, path: Vec<ComponentRef>, di: DataItem) {
        self.wire_index.insert((uuid.clone(), di.name.clone()), di.id.clone());
        self.items.insert(
            di.id.clone(),
            DataItemEntry {
                device_uuid: uuid,
                component_path: path,
                dataitem: di,
            },
        );
    }

    pub fn get_device_uuid(&self, name: &str) -> Option<String> {
        self.name_to_uuid.get(name).cloned()
    }

    pub fn get_all_device_uuids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.uuid.clone()).collect()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, uuid: &str) -> Option<&Device> {
        self.uuid_index.get(uuid).map(|&i| &self.devices[i])
    }

    pub fn dataitem(&self, id: &str) -> Option<&DataItem> {
        self.items.get(id).map(|e| &e.dataitem)
    }

    pub fn dataitem_device_uuid(&self, id: &str) -> Option<&str> {
        self.items.get(id).map(|e| e.device_uuid.as_str())
    }

    pub fn component_path(&self, id: &str) -> Option<&[ComponentRef]> {
        self.items.get(id).map(|e| e.component_path.as_slice())
    }

    pub fn all_dataitem_ids(&self, uuids: &[String]) -> Vec<String> {
        self.build_chains(uuids).into_iter().map(|(id, _)| id).collect()
    }

    /// `resolvePath(xpathLike, [uuid…]) → [dataItemId]` (`spec.md` §4.2).
    /// An empty query string resolves to every dataitem in scope — callers
    /// distinguish "no `path` query parameter" from a deliberately-empty
    /// filter before reaching this layer.
    pub fn resolve_path(&self, query: &str, uuids: &[String]) -> Vec<String> {
        if query.trim().is_empty() {
            return self.all_dataitem_ids(uuids);
        }
        let steps = path::parse_steps(query);
        self.build_chains(uuids)
            .into_iter()
            .filter(|(_, chain)| path::matches_chain(&steps, chain))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn path_validation(&self, query: &str, uuids: &[String]) -> bool {
        !self.resolve_path(query, uuids).is_empty()
    }

    /// Build the root-to-leaf chain for every dataitem in scope, in
    /// discovery order: depth-first over devices in insertion order, then
    /// components in schema order (`spec.md` §4.2 tie-break rule).
    fn build_chains(&self, uuids: &[String]) -> Vec<(String, Vec<ChainNode>)> {
        let mut out = Vec::new();
        for device in &self.devices {
            if !uuids.is_empty() && !uuids.contains(&device.uuid) {
                continue;
            }
            let device_node = ChainNode {
                tag: "Device".to_string(),
                attrs: vec![
                    ("uuid".to_string(), device.uuid.clone()),
                    ("name".to_string(), device.name.clone()),
                ],
            };
            for di in &device.dataitems {
                out.push((di.id.clone(), vec![device_node.clone(), dataitem_node(di)]));
            }
            walk_components(&device.components, &[device_node], &mut out);
        }
        out
    }
}

fn dataitem_node(di: &DataItem) -> ChainNode {
    let mut attrs = vec![
        ("id".to_string(), di.id.clone()),
        ("name".to_string(), di.name.clone()),
        ("type".to_string(), di.data_type.clone()),
        ("category".to_string(), category_str(di.category).to_string()),
    ];
    if let Some(sub) = &di.sub_type {
        attrs.push(("subType".to_string(), sub.clone()));
    }
    ChainNode {
        tag: di.data_type.clone(),
        attrs,
    }
}

fn category_str(c: Category) -> &'static str {
    match c {
        Category::Sample => "SAMPLE",
        Category::Event => "EVENT",
        Category::Condition => "CONDITION",
    }
}

fn walk_components(
    components: &[Component],
    prefix: &[ChainNode],
    out: &mut Vec<(String, Vec<ChainNode>)>,
) {
    for c in components {
        let mut chain = prefix.to_vec();
        chain.push(ChainNode {
            tag: c.component_type.clone(),
            attrs: vec![("id".to_string(), c.id.clone())],
        });
        for di in &c.dataitems {
            let mut leaf = chain.clone();
            leaf.push(dataitem_node(di));
            out.push((di.id.clone(), leaf));
        }
        walk_components(&c.components, &chain, out);
    }
}

impl DataItemLookup for SchemaRegistry {
    fn resolve(&self, device_uuid: &str, name: &str) -> Option<ResolvedDataItem> {
        let id = self.wire_index.get(&(device_uuid.to_string(), name.to_string()))?;
        let entry = self.items.get(id)?;
        Some(ResolvedDataItem {
            id: entry.dataitem.id.clone(),
            category: entry.dataitem.category,
            representation: entry.dataitem.representation,
            data_type: entry.dataitem.data_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::{Category as Cat, Representation as Rep};

    fn sample_schema() -> DeviceSchema {
        DeviceSchema {
            devices: vec![Device {
                uuid: "000".to_string(),
                name: "VMC-3Axis".to_string(),
                components: vec![Component {
                    id: "axes".to_string(),
                    component_type: "Axes".to_string(),
                    components: Vec::new(),
                    dataitems: vec![DataItem {
                        id: "va".to_string(),
                        name: "Va".to_string(),
                        data_type: "VOLTAGE".to_string(),
                        category: Cat::Sample,
                        sub_type: None,
                        representation: Rep::TimeSeries,
                    }],
                }],
                dataitems: vec![DataItem {
                    id: "avail".to_string(),
                    name: "avail".to_string(),
                    data_type: "AVAILABILITY".to_string(),
                    category: Cat::Event,
                    sub_type: None,
                    representation: Rep::Value,
                }],
            }],
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut reg = SchemaRegistry::new();
        reg.insert_schema(sample_schema());
        assert_eq!(reg.get_device_uuid("VMC-3Axis"), Some("000".to_string()));
        assert_eq!(reg.get_all_device_uuids(), vec!["000".to_string()]);
        assert_eq!(reg.resolve(&"000".to_string(), "avail").unwrap().id, "avail");
    }

    #[test]
    fn resolve_path_by_component_and_predicate() {
        let mut reg = SchemaRegistry::new();
        reg.insert_schema(sample_schema());
        let ids = reg.resolve_path(r#"//Axes//DataItem[@type="VOLTAGE"]"#, &[]);
        assert_eq!(ids, vec!["va".to_string()]);
    }

    #[test]
    fn reinsert_replaces_not_duplicates() {
        let mut reg = SchemaRegistry::new();
        reg.insert_schema(sample_schema());
        reg.insert_schema(sample_schema());
        assert_eq!(reg.get_all_device_uuids().len(), 1);
        assert_eq!(reg.all_dataitem_ids(&[]).len(), 2);
    }

    #[test]
    fn empty_query_resolves_all_in_scope() {
        let mut reg = SchemaRegistry::new();
        reg.insert_schema(sample_schema());
        assert_eq!(reg.resolve_path("", &[]).len(), 2);
    }

    #[test]
    fn path_validation_false_for_no_match() {
        let mut reg = SchemaRegistry::new();
        reg.insert_schema(sample_schema());
        assert!(!reg.path_validation(r#"//DataItem[@type="NOPE"]"#, &[]));
    }
}
