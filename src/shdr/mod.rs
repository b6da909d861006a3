//! SHDR line parser — turns one pipe-delimited wire line into normalized
//! observations or an asset command (`spec.md` §4.1).

use crate::models::device::{Category, Representation};
use crate::models::observation::{ConditionLevel, ObservationValue};
use crate::models::asset::{AssetCommand, AssetUpdate};
use regex::Regex;
use std::sync::LazyLock;

static MULTILINE_SENTINEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--multiline--(\S+)$").unwrap());

/// What the registry knows about a dataitem name, scoped to one device —
/// the minimum the parser needs to decide how many fields a dataitem's
/// value group consumes.
#[derive(Debug, Clone)]
pub struct ResolvedDataItem {
    pub id: String,
    pub category: Category,
    pub representation: Representation,
    pub data_type: String,
}

pub trait DataItemLookup {
    fn resolve(&self, device_uuid: &str, name: &str) -> Option<ResolvedDataItem>;
}

/// One resolved (dataitem, value) pair parsed from a line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedObservation {
    pub id: String,
    pub name: String,
    pub value: ObservationValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// One or more dataitem updates sharing a single timestamp.
    Observations {
        time: String,
        items: Vec<ParsedObservation>,
    },
    Asset(AssetCommand),
    /// A multi-line asset body is still being accumulated; nothing to emit yet.
    Buffering,
    /// Recoverable per §7: unknown dataitem, malformed line, or a skipped pair.
    Skipped(String),
}

enum PendingVerb {
    Asset { asset_type: String },
    UpdateAssetFragment,
}

struct MultilineBuffer {
    sentinel: String,
    time: String,
    asset_id: String,
    verb: PendingVerb,
    lines: Vec<String>,
}

/// Stateful decoder: most lines are parsed in one shot, but a multi-line
/// asset body spans several `feed` calls (`spec.md` §4.1 rule 4).
#[derive(Default)]
pub struct ShdrDecoder {
    buffering: Option<MultilineBuffer>,
}

impl ShdrDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a multi-line asset body is being accumulated.
    pub fn is_buffering(&self) -> bool {
        self.buffering.is_some()
    }

    /// Discard an in-progress multi-line buffer (connection dropped, or the
    /// sentinel never arrived). Recoverable per §7.
    pub fn abort_buffering(&mut self) -> bool {
        self.buffering.take().is_some()
    }

    pub fn feed(
        &mut self,
        line: &str,
        device_uuid: &str,
        lookup: &dyn DataItemLookup,
    ) -> ParseOutcome {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(buf) = &mut self.buffering {
            if line == buf.sentinel {
                let buf = self.buffering.take().unwrap();
                let body = buf.lines.join("\n");
                return match buf.verb {
                    PendingVerb::Asset { asset_type } => ParseOutcome::Asset(AssetCommand::Asset {
                        time: buf.time,
                        asset_id: buf.asset_id,
                        asset_type,
                        body,
                    }),
                    PendingVerb::UpdateAssetFragment => {
                        ParseOutcome::Asset(AssetCommand::UpdateAsset {
                            time: buf.time,
                            asset_id: buf.asset_id,
                            update: AssetUpdate::Fragment(body),
                        })
                    }
                };
            }
            buf.lines.push(line.to_string());
            return ParseOutcome::Buffering;
        }

        if line.is_empty() {
            return ParseOutcome::Skipped("empty line".to_string());
        }

        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 2 {
            return ParseOutcome::Skipped(format!("malformed line: {line}"));
        }

        match parts[1] {
            "@ASSET@" => self.parse_asset_line(line, parts),
            "@UPDATE_ASSET@" => self.parse_update_asset_line(line, parts),
            "@REMOVE_ASSET@" => parse_remove_asset_line(line, parts),
            "@REMOVE_ALL_ASSETS@" => parse_remove_all_assets_line(line, parts),
            _ => self.parse_observation_line(parts, device_uuid, lookup),
        }
    }

    fn parse_asset_line(&mut self, line: &str, _parts: Vec<&str>) -> ParseOutcome {
        let fields: Vec<&str> = line.splitn(5, '|').collect();
        if fields.len() < 5 {
            return ParseOutcome::Skipped(format!("malformed @ASSET@ line: {line}"));
        }
        let time = resolve_time(fields[0], false);
        let asset_id = fields[2].to_string();
        let asset_type = fields[3].to_string();
        let body = fields[4];

        if let Some(cap) = MULTILINE_SENTINEL.captures(body.trim()) {
            let sentinel = format!("--multiline--{}", &cap[1]);
            self.buffering = Some(MultilineBuffer {
                sentinel,
                time,
                asset_id,
                verb: PendingVerb::Asset { asset_type },
                lines: Vec::new(),
            });
            return ParseOutcome::Buffering;
        }

        ParseOutcome::Asset(AssetCommand::Asset {
            time,
            asset_id,
            asset_type,
            body: body.to_string(),
        })
    }

    fn parse_update_asset_line(&mut self, line: &str, _parts: Vec<&str>) -> ParseOutcome {
        let fields: Vec<&str> = line.splitn(4, '|').collect();
        if fields.len() < 4 {
            return ParseOutcome::Skipped(format!("malformed @UPDATE_ASSET@ line: {line}"));
        }
        let time = resolve_time(fields[0], false);
        let asset_id = fields[2].to_string();
        let rest = fields[3];

        if let Some(cap) = MULTILINE_SENTINEL.captures(rest.trim()) {
            let sentinel = format!("--multiline--{}", &cap[1]);
            self.buffering = Some(MultilineBuffer {
                sentinel,
                time,
                asset_id,
                verb: PendingVerb::UpdateAssetFragment,
                lines: Vec::new(),
            });
            return ParseOutcome::Buffering;
        }

        let update = if rest.trim_start().starts_with('<') {
            AssetUpdate::Fragment(rest.to_string())
        } else {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            let mut pairs = Vec::new();
            let mut i = 0;
            while i + 1 < tokens.len() {
                pairs.push((tokens[i].to_string(), tokens[i + 1].to_string()));
                i += 2;
            }
            AssetUpdate::KeyValue(pairs)
        };

        ParseOutcome::Asset(AssetCommand::UpdateAsset {
            time,
            asset_id,
            update,
        })
    }

    fn parse_observation_line(
        &mut self,
        parts: Vec<&str>,
        device_uuid: &str,
        lookup: &dyn DataItemLookup,
    ) -> ParseOutcome {
        let first_name_hint = parts.get(1).copied();
        let in_time_series_context = first_name_hint
            .and_then(|n| lookup.resolve(device_uuid, n))
            .map(|d| d.representation == Representation::TimeSeries)
            .unwrap_or(false);
        let time = resolve_time(parts[0], in_time_series_context);

        let mut items = Vec::new();
        let mut i = 1;
        while i < parts.len() {
            let name = parts[i];
            if name.is_empty() {
                i += 1;
                continue;
            }
            let Some(resolved) = lookup.resolve(device_uuid, name) else {
                tracing::warn!(device_uuid, name, "unknown dataitem, skipping pair");
                i += 2;
                continue;
            };

            match (resolved.category, resolved.representation) {
                (Category::Condition, _) => {
                    if i + 5 >= parts.len() {
                        tracing::warn!(device_uuid, name, "truncated CONDITION fields");
                        break;
                    }
                    let level = ConditionLevel::parse(parts[i + 1]).unwrap_or(ConditionLevel::Unavailable);
                    items.push(ParsedObservation {
                        id: resolved.id,
                        name: name.to_string(),
                        value: ObservationValue::Condition {
                            level,
                            native_code: parts[i + 2].to_string(),
                            native_severity: parts[i + 3].to_string(),
                            qualifier: parts[i + 4].to_string(),
                            message: parts[i + 5].to_string(),
                        },
                    });
                    i += 6;
                }
                (_, Representation::TimeSeries) => {
                    if i + 2 >= parts.len() {
                        tracing::warn!(device_uuid, name, "truncated TIME_SERIES fields");
                        break;
                    }
                    let sample_count = parts[i + 1].to_string();
                    let sample_rate = parts[i + 2].to_string();
                    let samples = parts[(i + 3).min(parts.len())..].join("|");
                    items.push(ParsedObservation {
                        id: resolved.id,
                        name: name.to_string(),
                        value: ObservationValue::TimeSeries {
                            sample_count,
                            sample_rate,
                            samples,
                        },
                    });
                    i = parts.len();
                }
                _ if resolved.data_type == "MESSAGE" => {
                    if i + 2 >= parts.len() {
                        tracing::warn!(device_uuid, name, "truncated MESSAGE fields");
                        break;
                    }
                    items.push(ParsedObservation {
                        id: resolved.id,
                        name: name.to_string(),
                        value: ObservationValue::Message {
                            native_code: parts[i + 1].to_string(),
                            text: parts[i + 2].to_string(),
                        },
                    });
                    i += 3;
                }
                _ if resolved.data_type == "ALARM" => {
                    if i + 5 >= parts.len() {
                        tracing::warn!(device_uuid, name, "truncated ALARM fields");
                        break;
                    }
                    items.push(ParsedObservation {
                        id: resolved.id,
                        name: name.to_string(),
                        value: ObservationValue::Alarm {
                            code: parts[i + 1].to_string(),
                            native_code: parts[i + 2].to_string(),
                            severity: parts[i + 3].to_string(),
                            state: parts[i + 4].to_string(),
                            text: parts[i + 5].to_string(),
                        },
                    });
                    i += 6;
                }
                _ => {
                    if i + 1 >= parts.len() {
                        tracing::warn!(device_uuid, name, "truncated scalar field");
                        break;
                    }
                    items.push(ParsedObservation {
                        id: resolved.id,
                        name: name.to_string(),
                        value: ObservationValue::Scalar(parts[i + 1].to_string()),
                    });
                    i += 2;
                }
            }
        }

        if items.is_empty() {
            ParseOutcome::Skipped("no resolvable dataitems on line".to_string())
        } else {
            ParseOutcome::Observations { time, items }
        }
    }
}

fn parse_remove_asset_line(line: &str, _parts: Vec<&str>) -> ParseOutcome {
    let fields: Vec<&str> = line.splitn(3, '|').collect();
    if fields.len() < 3 {
        return ParseOutcome::Skipped(format!("malformed @REMOVE_ASSET@ line: {line}"));
    }
    ParseOutcome::Asset(AssetCommand::RemoveAsset {
        time: resolve_time(fields[0], false),
        asset_id: fields[2].trim().to_string(),
    })
}

fn parse_remove_all_assets_line(line: &str, _parts: Vec<&str>) -> ParseOutcome {
    let fields: Vec<&str> = line.splitn(3, '|').collect();
    if fields.len() < 3 {
        return ParseOutcome::Skipped(format!("malformed @REMOVE_ALL_ASSETS@ line: {line}"));
    }
    ParseOutcome::Asset(AssetCommand::RemoveAllAssets {
        time: resolve_time(fields[0], false),
        asset_type: fields[2].trim().to_string(),
    })
}

fn looks_like_iso8601(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 5 && b[0..4].iter().all(u8::is_ascii_digit) && b[4] == b'-'
}

fn is_decimal_number(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

/// Resolve the TIMESTAMP field per `spec.md` §4.1 rule 1 and the Open
/// Question resolution in §9 (relative TIME_SERIES timestamps pass through
/// verbatim).
fn resolve_time(first_field: &str, in_time_series_context: bool) -> String {
    if first_field.is_empty() {
        return current_wall_time();
    }
    if looks_like_iso8601(first_field) {
        return first_field.to_string();
    }
    if in_time_series_context && is_decimal_number(first_field) {
        return first_field.to_string();
    }
    current_wall_time()
}

pub(crate) fn current_wall_time() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Vec<(&'static str, ResolvedDataItem)>);

    impl DataItemLookup for FixedLookup {
        fn resolve(&self, _device_uuid: &str, name: &str) -> Option<ResolvedDataItem> {
            self.0
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, d)| d.clone())
        }
    }

    fn item(id: &str, category: Category, representation: Representation, data_type: &str) -> ResolvedDataItem {
        ResolvedDataItem {
            id: id.to_string(),
            category,
            representation,
            data_type: data_type.to_string(),
        }
    }

    #[test]
    fn simple_scalar() {
        let lookup = FixedLookup(vec![("avail", item("avail_id", Category::Event, Representation::Value, "AVAILABILITY"))]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed(
            "2014-08-11T08:32:54.028533Z|avail|AVAILABLE",
            "000",
            &lookup,
        );
        match out {
            ParseOutcome::Observations { time, items } => {
                assert_eq!(time, "2014-08-11T08:32:54.028533Z");
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].name, "avail");
                assert_eq!(items[0].value, ObservationValue::Scalar("AVAILABLE".to_string()));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn condition_tuple() {
        let lookup = FixedLookup(vec![("htemp", item("htemp_id", Category::Condition, Representation::Value, "TEMPERATURE"))]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed(
            "2010-09-29T23:59:33.460470Z|htemp|WARNING|HTEMP|1|HIGH|Oil Temperature High",
            "000",
            &lookup,
        );
        match out {
            ParseOutcome::Observations { items, .. } => {
                assert_eq!(items.len(), 1);
                assert_eq!(
                    items[0].value,
                    ObservationValue::Condition {
                        level: ConditionLevel::Warning,
                        native_code: "HTEMP".to_string(),
                        native_severity: "1".to_string(),
                        qualifier: "HIGH".to_string(),
                        message: "Oil Temperature High".to_string(),
                    }
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn time_series_relative_timestamp() {
        let lookup = FixedLookup(vec![("Va", item("va_id", Category::Sample, Representation::TimeSeries, "VOLTAGE"))]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed("2|Va|10||3499359 3499094 3499071", "000", &lookup);
        match out {
            ParseOutcome::Observations { time, items } => {
                assert_eq!(time, "2");
                assert_eq!(
                    items[0].value,
                    ObservationValue::TimeSeries {
                        sample_count: "10".to_string(),
                        sample_rate: "".to_string(),
                        samples: "3499359 3499094 3499071".to_string(),
                    }
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unresolvable_name_substitutes_wall_clock() {
        let lookup = FixedLookup(vec![]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed("garbage|unknown|1", "000", &lookup);
        assert!(matches!(out, ParseOutcome::Skipped(_)));
    }

    #[test]
    fn multi_dataitem_line() {
        let lookup = FixedLookup(vec![
            ("avail", item("avail_id", Category::Event, Representation::Value, "AVAILABILITY")),
            ("mode", item("mode_id", Category::Event, Representation::Value, "CONTROLLER_MODE")),
        ]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed(
            "2020-01-01T00:00:00Z|avail|AVAILABLE|mode|AUTOMATIC",
            "000",
            &lookup,
        );
        match out {
            ParseOutcome::Observations { items, .. } => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].name, "mode");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn asset_command() {
        let lookup = FixedLookup(vec![]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed(
            "2021-01-01T00:00:00Z|@ASSET@|EM233|CuttingTool|<CuttingTool></CuttingTool>",
            "000",
            &lookup,
        );
        match out {
            ParseOutcome::Asset(AssetCommand::Asset { asset_id, asset_type, body, .. }) => {
                assert_eq!(asset_id, "EM233");
                assert_eq!(asset_type, "CuttingTool");
                assert_eq!(body, "<CuttingTool></CuttingTool>");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn multiline_asset_buffers_until_sentinel() {
        let lookup = FixedLookup(vec![]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed(
            "2021-01-01T00:00:00Z|@ASSET@|EM233|CuttingTool|--multiline--ABC",
            "000",
            &lookup,
        );
        assert!(matches!(out, ParseOutcome::Buffering));
        assert!(decoder.is_buffering());

        let out = decoder.feed("<CuttingTool>", "000", &lookup);
        assert!(matches!(out, ParseOutcome::Buffering));
        let out = decoder.feed("</CuttingTool>", "000", &lookup);
        assert!(matches!(out, ParseOutcome::Buffering));

        let out = decoder.feed("--multiline--ABC", "000", &lookup);
        match out {
            ParseOutcome::Asset(AssetCommand::Asset { body, .. }) => {
                assert_eq!(body, "<CuttingTool>\n</CuttingTool>");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!decoder.is_buffering());
    }

    #[test]
    fn update_asset_kv_pairs() {
        let lookup = FixedLookup(vec![]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed(
            "2021-01-01T00:00:00Z|@UPDATE_ASSET@|EM233|ToolLife 120 CuttingDiameterMax 40",
            "000",
            &lookup,
        );
        match out {
            ParseOutcome::Asset(AssetCommand::UpdateAsset { update, .. }) => {
                assert_eq!(
                    update,
                    AssetUpdate::KeyValue(vec![
                        ("ToolLife".to_string(), "120".to_string()),
                        ("CuttingDiameterMax".to_string(), "40".to_string()),
                    ])
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn remove_all_assets() {
        let lookup = FixedLookup(vec![]);
        let mut decoder = ShdrDecoder::new();
        let out = decoder.feed("2021-01-01T00:00:00Z|@REMOVE_ALL_ASSETS@|CuttingTool", "000", &lookup);
        assert!(matches!(
            out,
            ParseOutcome::Asset(AssetCommand::RemoveAllAssets { .. })
        ));
    }
}
