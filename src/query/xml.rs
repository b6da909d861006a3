//! MTConnect XML document assembly: wraps a query result tree with the
//! standard header/namespace envelope and handles the asset multi-status
//! serialization rule (`spec.md` §4.5).

use crate::models::asset::{Asset, XmlNode};
use crate::models::query::MTConnectError;
use crate::xmltree;

const MTCONNECT_VERSION: &str = "1.3";

/// Wrap a response body (`MTConnectDevices`/`MTConnectStreams`/`MTConnectAssets`
/// root element) with the XML declaration, schema namespace, and a `Header`.
pub fn serialize_document(mut root: XmlNode, sender: &str) -> String {
    if let XmlNode::Element { name, attrs, children } = &mut root {
        attrs.push((
            "xmlns".to_string(),
            format!("urn:mtconnect.org:{name}:{MTCONNECT_VERSION}"),
        ));
        let mut header = XmlNode::element("Header");
        if let XmlNode::Element { attrs: header_attrs, .. } = &mut header {
            header_attrs.push(("sender".to_string(), sender.to_string()));
            header_attrs.push(("version".to_string(), MTCONNECT_VERSION.to_string()));
            header_attrs.push(("creationTime".to_string(), crate::shdr::current_wall_time()));
        }
        children.insert(0, header);
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
        xmltree::serialize(&root)
    )
}

pub fn serialize_error(err: &MTConnectError) -> String {
    let mut node = XmlNode::element("Error");
    if let XmlNode::Element { attrs, .. } = &mut node {
        attrs.push(("errorCode".to_string(), err.error_code.clone()));
    }
    node.set_text(err.message.clone());

    let mut errors = XmlNode::element("Errors");
    if let XmlNode::Element { children, .. } = &mut errors {
        children.push(node);
    }
    let mut root = XmlNode::element("MTConnectError");
    if let XmlNode::Element { children, .. } = &mut root {
        children.push(errors);
    }
    serialize_document(root, "mtconnect-agent")
}

/// Render one asset snapshot, applying the authoritative `assetId`/`timestamp`
/// /`removed` attributes and expanding comma-separated multi-status values
/// into repeated sibling elements (`spec.md` §4.5).
pub fn asset_node(asset: &Asset) -> XmlNode {
    let mut value = expand_multi_status(&asset.value);
    if let XmlNode::Element { attrs, .. } = &mut value {
        attrs.push(("assetId".to_string(), asset.asset_id.clone()));
        attrs.push(("timestamp".to_string(), asset.time.clone()));
        if asset.removed {
            attrs.push(("removed".to_string(), "true".to_string()));
        }
    }
    value
}

/// If an element's only content is a comma-separated text value, split it
/// into repeated sibling elements of the same tag (one per value, order
/// preserved) — otherwise recurse unchanged.
pub fn expand_multi_status(node: &XmlNode) -> XmlNode {
    match node {
        XmlNode::Text(_) => node.clone(),
        XmlNode::Element { name, attrs, children } => XmlNode::Element {
            name: name.clone(),
            attrs: attrs.clone(),
            children: expand_children(children),
        },
    }
}

fn expand_children(children: &[XmlNode]) -> Vec<XmlNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            XmlNode::Element { name, attrs, children: grandchildren } if grandchildren.len() == 1 => {
                if let XmlNode::Text(text) = &grandchildren[0] {
                    if text.contains(',') {
                        for part in text.split(',') {
                            let mut sibling = XmlNode::Element {
                                name: name.clone(),
                                attrs: attrs.clone(),
                                children: Vec::new(),
                            };
                            sibling.set_text(part.trim().to_string());
                            out.push(sibling);
                        }
                        continue;
                    }
                }
                out.push(expand_multi_status(child));
            }
            other => out.push(expand_multi_status(other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_status_text_becomes_repeated_siblings() {
        let mut cutter = XmlNode::element("CutterStatus");
        cutter.set_text("USED,AVAILABLE");
        let mut parent = XmlNode::element("CuttingTool");
        if let XmlNode::Element { children, .. } = &mut parent {
            children.push(cutter);
        }
        let expanded = expand_multi_status(&parent);
        let XmlNode::Element { children, .. } = expanded else { panic!("expected element") };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text_content(), "USED");
        assert_eq!(children[1].text_content(), "AVAILABLE");
    }

    #[test]
    fn error_document_carries_code_and_message() {
        let err = MTConnectError::new("OUT_OF_RANGE", "from is before firstSequence");
        let xml = serialize_error(&err);
        assert!(xml.contains("errorCode=\"OUT_OF_RANGE\""));
        assert!(xml.contains("from is before firstSequence"));
    }
}
