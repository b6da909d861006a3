use serde::{Deserialize, Serialize};

/// Pre-parsed device description, as produced by the (out-of-scope) XSD
/// validation / XML-to-JSON step named in `spec.md` §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSchema {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub dataitems: Vec<DataItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub dataitems: Vec<DataItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "SAMPLE")]
    Sample,
    #[serde(rename = "EVENT")]
    Event,
    #[serde(rename = "CONDITION")]
    Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Representation {
    #[default]
    #[serde(rename = "VALUE")]
    Value,
    #[serde(rename = "TIME_SERIES")]
    TimeSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub category: Category,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub representation: Representation,
}
