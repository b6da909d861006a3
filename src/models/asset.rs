use serde::{Deserialize, Serialize};

/// An asset tree node — element or text, with no upward references
/// (`spec.md` §9, "Cyclic/shared XML trees in assets").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XmlNode {
    Element {
        name: String,
        #[serde(default)]
        attrs: Vec<(String, String)>,
        #[serde(default)]
        children: Vec<XmlNode>,
    },
    Text(String),
}

impl XmlNode {
    pub fn element(name: impl Into<String>) -> Self {
        XmlNode::Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            XmlNode::Element { name, .. } => Some(name),
            XmlNode::Text(_) => None,
        }
    }

    /// Depth-first search for the first descendant element named `name`,
    /// mutable. First match wins, per the Open Question resolution in
    /// `spec.md` §9.
    pub fn find_first_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        if let XmlNode::Element { children, .. } = self {
            for child in children.iter_mut() {
                if child.name() == Some(name) {
                    return Some(child);
                }
                if let Some(found) = child.find_first_mut(name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Replace the text content of this element with `text`, discarding any
    /// existing children (mirrors the KV-pair update form of `@UPDATE_ASSET@`).
    pub fn set_text(&mut self, text: impl Into<String>) {
        if let XmlNode::Element { children, .. } = self {
            children.clear();
            children.push(XmlNode::Text(text.into()));
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            XmlNode::Text(s) => s.clone(),
            XmlNode::Element { children, .. } => {
                children.iter().map(XmlNode::text_content).collect()
            }
        }
    }
}

/// An out-of-band entity whose lifecycle is independent of device state
/// (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    pub asset_type: String,
    pub time: String,
    pub value: XmlNode,
    pub removed: bool,
    pub sequence: u64,
}

/// The shape of an `@UPDATE_ASSET@` value region.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetUpdate {
    KeyValue(Vec<(String, String)>),
    Fragment(String),
}

/// One of the four asset command verbs parsed from an SHDR line
/// (`spec.md` §4.1, §4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum AssetCommand {
    Asset {
        time: String,
        asset_id: String,
        asset_type: String,
        body: String,
    },
    UpdateAsset {
        time: String,
        asset_id: String,
        update: AssetUpdate,
    },
    RemoveAsset {
        time: String,
        asset_id: String,
    },
    RemoveAllAssets {
        time: String,
        asset_type: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_first_mut_prefers_document_order_over_shallower_sibling() {
        // <Root><A><Target>deep</Target></A><Target>shallow</Target></Root>
        // The true first-in-document-order match is the one nested inside
        // <A>, even though the top-level <Target> sibling is shallower.
        let mut inner_target = XmlNode::element("Target");
        inner_target.set_text("deep");
        let a = XmlNode::Element {
            name: "A".to_string(),
            attrs: Vec::new(),
            children: vec![inner_target],
        };
        let mut shallow_target = XmlNode::element("Target");
        shallow_target.set_text("shallow");
        let mut root = XmlNode::Element {
            name: "Root".to_string(),
            attrs: Vec::new(),
            children: vec![a, shallow_target],
        };

        let found = root.find_first_mut("Target").unwrap();
        assert_eq!(found.text_content(), "deep");
    }
}
