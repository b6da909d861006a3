//! Query engine: evaluates the path filter against the registry and stores,
//! and builds the response tree for each HTTP surface (`spec.md` §4.5).
//!
//! Response bodies reuse [`XmlNode`], the same tagged element/text tree the
//! asset store uses, so one serializer (`query::xml`) covers schema,
//! observation, and asset output alike.

pub mod xml;

use crate::error::AgentError;
use crate::models::asset::XmlNode;
use crate::models::device::{Category, DataItem, Device, Representation};
use crate::models::observation::{Observation, ObservationValue};
use crate::registry::{ComponentRef, SchemaRegistry};
use crate::store::history::History;
use crate::store::Store;
use std::collections::HashSet;

/// `GET /probe?path=...` — schema tree only, no observation values.
pub fn probe(registry: &SchemaRegistry, path: Option<&str>) -> Result<XmlNode, AgentError> {
    let query = path.unwrap_or("");
    if !query.is_empty() && !registry.path_validation(query, &[]) {
        return Err(AgentError::InvalidXPath(query.to_string()));
    }
    let ids = registry.resolve_path(query, &[]);

    let mut devices_node = XmlNode::element("Devices");
    for device in registry.devices() {
        let mut children = Vec::new();
        for id in &ids {
            if registry.dataitem_device_uuid(id) != Some(device.uuid.as_str()) {
                continue;
            }
            let Some(di) = registry.dataitem(id) else { continue };
            let path = registry.component_path(id).unwrap_or(&[]);
            insert_into_tree(&mut children, path, dataitem_schema_node(di));
        }
        if !children.is_empty() {
            push_child(&mut devices_node, device_node(device, children));
        }
    }

    let mut root = XmlNode::element("MTConnectDevices");
    push_child(&mut root, devices_node);
    Ok(root)
}

/// `GET /current?path=...&at=<seq>`.
pub fn current(
    registry: &SchemaRegistry,
    store: &Store,
    path: Option<&str>,
    at: Option<u64>,
) -> Result<XmlNode, AgentError> {
    let query = path.unwrap_or("");
    if !query.is_empty() && !registry.path_validation(query, &[]) {
        return Err(AgentError::InvalidXPath(query.to_string()));
    }
    let ids = registry.resolve_path(query, &[]);
    let history = store.history();
    let window = history.sequence_window();

    let at_snapshot = match at {
        Some(at) if at < window.first_sequence || at > window.next_sequence => {
            return Err(AgentError::OutOfRange {
                from: at,
                first_sequence: window.first_sequence,
                next_sequence: window.next_sequence,
            });
        }
        Some(at) => Some(history.snapshot_at(&ids.iter().cloned().collect(), at)),
        None => None,
    };

    let mut streams_node = XmlNode::element("Streams");
    for device in registry.devices() {
        let mut children = Vec::new();
        for id in &ids {
            if registry.dataitem_device_uuid(id) != Some(device.uuid.as_str()) {
                continue;
            }
            let Some(di) = registry.dataitem(id) else { continue };
            let leaf = match &at_snapshot {
                Some(snapshot) => snapshot.get(id).map(|o| observation_node(di, o)),
                None => current_value_node(history, di),
            };
            let Some(leaf) = leaf else { continue };
            let path = registry.component_path(id).unwrap_or(&[]);
            insert_into_tree(&mut children, path, leaf);
        }
        if !children.is_empty() {
            push_child(&mut streams_node, device_node(device, children));
        }
    }

    let mut root = XmlNode::element("MTConnectStreams");
    push_child(&mut root, streams_node);
    Ok(root)
}

/// `GET /sample?path=...&from=<seq>&count=<n>`. Returns the document and the
/// number of observations actually served (may be less than `count`).
pub fn sample(
    registry: &SchemaRegistry,
    store: &Store,
    path: Option<&str>,
    from: Option<u64>,
    count: u64,
) -> Result<(XmlNode, u64), AgentError> {
    let query = path.unwrap_or("");
    if !query.is_empty() && !registry.path_validation(query, &[]) {
        return Err(AgentError::InvalidXPath(query.to_string()));
    }
    let ids = registry.resolve_path(query, &[]);
    let history = store.history();
    let window = history.sequence_window();
    let from = from.unwrap_or(window.first_sequence);
    let id_set: HashSet<String> = ids.iter().cloned().collect();
    let observations = history.sample_window(&id_set, from, count)?;
    let served = observations.len() as u64;

    let mut streams_node = XmlNode::element("Streams");
    for device in registry.devices() {
        let mut children = Vec::new();
        for obs in &observations {
            if registry.dataitem_device_uuid(&obs.id) != Some(device.uuid.as_str()) {
                continue;
            }
            let Some(di) = registry.dataitem(&obs.id) else { continue };
            let leaf = observation_node_full(di, obs);
            let path = registry.component_path(&obs.id).unwrap_or(&[]);
            insert_into_tree(&mut children, path, leaf);
        }
        if !children.is_empty() {
            push_child(&mut streams_node, device_node(device, children));
        }
    }

    let mut root = XmlNode::element("MTConnectStreams");
    push_child(&mut root, streams_node);
    Ok((root, served))
}

/// `GET /assets?type=<t>&count=<n>` — most recent `count` entries (after the
/// type filter), oldest-to-newest within that window.
pub fn assets(store: &Store, asset_type: Option<&str>, count: Option<u64>) -> XmlNode {
    let mut matched: Vec<_> = store
        .assets()
        .buffer()
        .filter(|a| asset_type.map(|t| a.asset_type == t).unwrap_or(true))
        .collect();

    if let Some(count) = count {
        let len = matched.len();
        if (count as usize) < len {
            matched = matched.split_off(len - count as usize);
        }
    }

    let mut assets_node = XmlNode::element("Assets");
    for asset in matched {
        push_child(&mut assets_node, xml::asset_node(asset));
    }

    let mut root = XmlNode::element("MTConnectAssets");
    push_child(&mut root, assets_node);
    root
}

fn current_value_node(history: &History, di: &DataItem) -> Option<XmlNode> {
    if di.category == Category::Condition {
        let current = history.current(&di.id)?;
        let active = history.active_conditions(&di.id);
        let entries: Vec<XmlNode> = if active.is_empty() {
            vec![condition_entry_node(current)]
        } else {
            active.iter().map(condition_entry_node).collect()
        };
        Some(XmlNode::Element {
            name: pascal_case(&di.data_type),
            attrs: vec![
                ("name".to_string(), di.name.clone()),
                ("sequence".to_string(), current.sequence.to_string()),
                ("timestamp".to_string(), current.time.clone()),
            ],
            children: entries,
        })
    } else {
        history.current(&di.id).map(|obs| observation_node(di, obs))
    }
}

/// One observation, including a CONDITION's single active/clearing entry —
/// used by `/sample`, where every change is its own element rather than
/// grouped by dataitem the way `/current` groups active conditions.
fn observation_node_full(di: &DataItem, obs: &Observation) -> XmlNode {
    if matches!(obs.value, ObservationValue::Condition { .. }) {
        XmlNode::Element {
            name: pascal_case(&di.data_type),
            attrs: vec![
                ("name".to_string(), di.name.clone()),
                ("sequence".to_string(), obs.sequence.to_string()),
                ("timestamp".to_string(), obs.time.clone()),
            ],
            children: vec![condition_entry_node(obs)],
        }
    } else {
        observation_node(di, obs)
    }
}

fn observation_node(di: &DataItem, obs: &Observation) -> XmlNode {
    let mut attrs = vec![
        ("name".to_string(), di.name.clone()),
        ("sequence".to_string(), obs.sequence.to_string()),
        ("timestamp".to_string(), obs.time.clone()),
    ];
    let tag = if di.representation == Representation::TimeSeries {
        format!("{}TimeSeries", pascal_case(&di.data_type))
    } else {
        pascal_case(&di.data_type)
    };
    let text = match &obs.value {
        ObservationValue::Scalar(s) => s.clone(),
        ObservationValue::Message { native_code, text } => {
            attrs.push(("nativeCode".to_string(), native_code.clone()));
            text.clone()
        }
        ObservationValue::Alarm { code, native_code, severity, state, text } => {
            attrs.push(("code".to_string(), code.clone()));
            attrs.push(("nativeCode".to_string(), native_code.clone()));
            attrs.push(("severity".to_string(), severity.clone()));
            attrs.push(("state".to_string(), state.clone()));
            text.clone()
        }
        ObservationValue::TimeSeries { sample_count, sample_rate, samples } => {
            attrs.push(("sampleCount".to_string(), sample_count.clone()));
            attrs.push(("sampleRate".to_string(), sample_rate.clone()));
            samples.clone()
        }
        ObservationValue::Condition { .. } => String::new(),
    };
    let mut node = XmlNode::Element { name: tag, attrs, children: Vec::new() };
    node.set_text(text);
    node
}

fn condition_entry_node(obs: &Observation) -> XmlNode {
    let ObservationValue::Condition { level, native_code, native_severity, qualifier, message } = &obs.value else {
        return XmlNode::element("Entry");
    };
    let mut node = XmlNode::Element {
        name: "Entry".to_string(),
        attrs: vec![
            ("level".to_string(), level.as_str().to_string()),
            ("nativeCode".to_string(), native_code.clone()),
            ("nativeSeverity".to_string(), native_severity.clone()),
            ("qualifier".to_string(), qualifier.clone()),
        ],
        children: Vec::new(),
    };
    node.set_text(message.clone());
    node
}

fn dataitem_schema_node(di: &DataItem) -> XmlNode {
    let mut attrs = vec![
        ("id".to_string(), di.id.clone()),
        ("name".to_string(), di.name.clone()),
        ("category".to_string(), category_str(di.category).to_string()),
        ("type".to_string(), di.data_type.clone()),
    ];
    if let Some(sub) = &di.sub_type {
        attrs.push(("subType".to_string(), sub.clone()));
    }
    XmlNode::Element { name: pascal_case(&di.data_type), attrs, children: Vec::new() }
}

fn device_node(device: &Device, children: Vec<XmlNode>) -> XmlNode {
    XmlNode::Element {
        name: "Device".to_string(),
        attrs: vec![
            ("uuid".to_string(), device.uuid.clone()),
            ("name".to_string(), device.name.clone()),
        ],
        children,
    }
}

fn push_child(node: &mut XmlNode, child: XmlNode) {
    if let XmlNode::Element { children, .. } = node {
        children.push(child);
    }
}

/// Insert a leaf into the component tree following `path`, merging branches
/// that share a component id rather than duplicating them.
fn insert_into_tree(children: &mut Vec<XmlNode>, path: &[ComponentRef], leaf: XmlNode) {
    let Some((head, rest)) = path.split_first() else {
        children.push(leaf);
        return;
    };
    let existing = children.iter_mut().find(|n| match n {
        XmlNode::Element { name, attrs, .. } => {
            name == &head.component_type && attrs.iter().any(|(k, v)| k == "id" && v == &head.id)
        }
        XmlNode::Text(_) => false,
    });
    match existing {
        Some(XmlNode::Element { children: inner, .. }) => insert_into_tree(inner, rest, leaf),
        _ => {
            let mut inner = Vec::new();
            insert_into_tree(&mut inner, rest, leaf);
            children.push(XmlNode::Element {
                name: head.component_type.clone(),
                attrs: vec![("id".to_string(), head.id.clone())],
                children: inner,
            });
        }
    }
}

fn category_str(c: Category) -> &'static str {
    match c {
        Category::Sample => "SAMPLE",
        Category::Event => "EVENT",
        Category::Condition => "CONDITION",
    }
}

fn pascal_case(type_name: &str) -> String {
    type_name
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}
