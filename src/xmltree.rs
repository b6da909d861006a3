//! Conversion between the crate's generic [`XmlNode`] tree and wire XML, used
//! both to ingest asset bodies/fragments and to serialize MTConnect
//! responses (`spec.md` §9, "Cyclic/shared XML trees in assets").

use crate::models::asset::XmlNode;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;
use quick_xml::Writer;
use std::io::Cursor;

/// Parse one well-formed XML fragment into a single root [`XmlNode`].
pub fn parse_fragment(body: &str) -> Result<XmlNode, quick_xml::Error> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(element_from_start(&e)?);
            }
            Event::Empty(e) => {
                let node = element_from_start(&e)?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                if !text.is_empty() {
                    attach(&mut stack, &mut root, XmlNode::Text(text));
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| quick_xml::Error::UnexpectedEof("no root element".to_string()))
}

fn element_from_start(e: &BytesStart) -> Result<XmlNode, quick_xml::Error> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(quick_xml::Error::InvalidAttr)?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode::Element {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    if let Some(XmlNode::Element { children, .. }) = stack.last_mut() {
        children.push(node);
    } else {
        *root = Some(node);
    }
}

/// Serialize an [`XmlNode`] subtree back to UTF-8 XML text (no declaration).
pub fn serialize(node: &XmlNode) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let _ = write_node(&mut writer, node);
    String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &XmlNode) -> quick_xml::Result<()> {
    match node {
        XmlNode::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        XmlNode::Element { name, attrs, children } => {
            let mut start = BytesStart::new(name.as_str());
            for (k, v) in attrs {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            if children.is_empty() {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for child in children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_fragment() {
        let xml = r#"<CuttingTool serialNumber="123"><CuttingToolLifeCycle><ToolLife type="MINUTES">120</ToolLife></CuttingToolLifeCycle></CuttingTool>"#;
        let tree = parse_fragment(xml).unwrap();
        assert_eq!(tree.name(), Some("CuttingTool"));
        let mut tree2 = tree.clone();
        let life = tree2.find_first_mut("ToolLife").unwrap();
        assert_eq!(life.text_content(), "120");
    }

    #[test]
    fn serialize_emits_attributes_and_text() {
        let mut node = XmlNode::element("ToolLife");
        if let XmlNode::Element { attrs, .. } = &mut node {
            attrs.push(("type".to_string(), "MINUTES".to_string()));
        }
        node.set_text("120");
        let xml = serialize(&node);
        assert!(xml.contains("type=\"MINUTES\""));
        assert!(xml.contains(">120<"));
    }
}
