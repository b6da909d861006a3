use serde::{Deserialize, Serialize};

/// A single recorded channel update, as defined in `spec.md` §3.
///
/// `sequence` is assigned by the store, never by the parser — a freshly
/// parsed observation carries `sequence: 0` as a placeholder until the
/// ingest sequencer commits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub sequence: u64,
    pub time: String,
    pub id: String,
    pub data_item_name: String,
    pub value: ObservationValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionLevel {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "FAULT")]
    Fault,
    #[serde(rename = "UNAVAILABLE")]
    Unavailable,
}

impl ConditionLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(Self::Normal),
            "WARNING" => Some(Self::Warning),
            "FAULT" => Some(Self::Fault),
            "UNAVAILABLE" => Some(Self::Unavailable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Fault => "FAULT",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

/// The dynamic-typed `value` field of an Observation, modeled as a tagged
/// sum per `spec.md` §9 ("Dynamic-typed Observation `value`").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObservationValue {
    Scalar(String),
    Condition {
        level: ConditionLevel,
        native_code: String,
        native_severity: String,
        qualifier: String,
        message: String,
    },
    Message {
        native_code: String,
        text: String,
    },
    Alarm {
        code: String,
        native_code: String,
        severity: String,
        state: String,
        text: String,
    },
    TimeSeries {
        sample_count: String,
        sample_rate: String,
        samples: String,
    },
}

impl ObservationValue {
    /// True for representations that participate in duplicate suppression
    /// (§3 invariant: "Consecutive observations ... whose value equals
    /// hashCurrent[id].value are suppressed. Exception: CONDITION always
    /// records" and the Open Question resolving TIME_SERIES to never
    /// suppress).
    pub fn suppresses_on_equal(&self) -> bool {
        matches!(self, ObservationValue::Scalar(_) | ObservationValue::Message { .. } | ObservationValue::Alarm { .. })
    }
}
