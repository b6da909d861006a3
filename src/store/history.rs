//! Ring-buffered observation history plus the `current`/`last` hash maps
//! (`spec.md` §3, §4.3).

use crate::models::observation::{ConditionLevel, Observation, ObservationValue};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWindow {
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub next_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("OUT_OF_RANGE: from={from} is before firstSequence={first_sequence} or beyond nextSequence={next_sequence}")]
    OutOfRange {
        from: u64,
        first_sequence: u64,
        next_sequence: u64,
    },
}

/// Owns the circular buffer and the current/last hash maps for one agent
/// run. Mutated only by the ingest sequencer (`spec.md` §5).
pub struct History {
    capacity: usize,
    ring: VecDeque<Observation>,
    hash_current: HashMap<String, Observation>,
    hash_last: HashMap<String, Observation>,
    /// Currently-active (unresolved) condition entries per dataitem id,
    /// keyed internally by nativeCode so a WARNING/FAULT can be replaced or
    /// cleared independently of other active conditions on the same item.
    conditions_active: HashMap<String, Vec<Observation>>,
    next_to_assign: u64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ring: VecDeque::with_capacity(capacity.min(4096)),
            hash_current: HashMap::new(),
            hash_last: HashMap::new(),
            conditions_active: HashMap::new(),
            next_to_assign: 1,
        }
    }

    pub fn sequence_window(&self) -> SequenceWindow {
        let first = self
            .ring
            .front()
            .map(|o| o.sequence)
            .unwrap_or(self.next_to_assign);
        SequenceWindow {
            first_sequence: first,
            last_sequence: self.next_to_assign.saturating_sub(1),
            next_sequence: self.next_to_assign,
        }
    }

    /// Record one dataitem update. Returns `None` when suppressed as an
    /// unchanged duplicate (`spec.md` §3 invariant).
    pub fn record(&mut self, time: &str, id: &str, name: &str, value: ObservationValue) -> Option<Observation> {
        self.record_with_suppression(time, id, name, value, true)
    }

    /// Record one dataitem update, bypassing duplicate suppression entirely.
    /// Used for `ASSET_CHANGED`/`ASSET_REMOVED` synthetic events, which
    /// `spec.md` §3 requires to be recorded unconditionally on every
    /// successful asset command even when the assetId value repeats.
    pub fn record_unconditional(&mut self, time: &str, id: &str, name: &str, value: ObservationValue) -> Observation {
        self.record_with_suppression(time, id, name, value, false)
            .expect("unconditional record never suppresses")
    }

    fn record_with_suppression(
        &mut self,
        time: &str,
        id: &str,
        name: &str,
        value: ObservationValue,
        allow_suppression: bool,
    ) -> Option<Observation> {
        if allow_suppression && value.suppresses_on_equal() {
            if let Some(prev) = self.hash_current.get(id) {
                if prev.value == value {
                    return None;
                }
            }
        }

        let sequence = self.next_to_assign;
        self.next_to_assign += 1;

        let obs = Observation {
            sequence,
            time: time.to_string(),
            id: id.to_string(),
            data_item_name: name.to_string(),
            value,
        };

        if let Some(prev_current) = self.hash_current.insert(id.to_string(), obs.clone()) {
            self.hash_last.insert(id.to_string(), prev_current);
        }

        self.ring.push_back(obs.clone());
        if self.ring.len() > self.capacity {
            self.ring.pop_front();
        }

        if matches!(obs.value, ObservationValue::Condition { .. }) {
            self.apply_condition(&obs);
        }

        Some(obs)
    }

    fn apply_condition(&mut self, obs: &Observation) {
        let ObservationValue::Condition { level, native_code, .. } = &obs.value else {
            return;
        };
        let entry = self.conditions_active.entry(obs.id.clone()).or_default();
        let clears = matches!(level, ConditionLevel::Normal)
            || (matches!(level, ConditionLevel::Unavailable) && native_code.is_empty());
        if clears {
            entry.clear();
        } else {
            entry.retain(|o| match &o.value {
                ObservationValue::Condition { native_code: nc, .. } => nc != native_code,
                _ => true,
            });
            entry.push(obs.clone());
        }
    }

    pub fn current(&self, id: &str) -> Option<&Observation> {
        self.hash_current.get(id)
    }

    pub fn last(&self, id: &str) -> Option<&Observation> {
        self.hash_last.get(id)
    }

    pub fn active_conditions(&self, id: &str) -> &[Observation] {
        self.conditions_active.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// `sampleWindow(ids, from, count)` (`spec.md` §4.3). `ids` empty means
    /// no filter. Truncates silently when `count` exceeds what the ring
    /// still holds — the caller reports the actual length served.
    pub fn sample_window(
        &self,
        ids: &HashSet<String>,
        from: u64,
        count: u64,
    ) -> Result<Vec<Observation>, HistoryError> {
        let window = self.sequence_window();
        if from < window.first_sequence || from > window.next_sequence {
            return Err(HistoryError::OutOfRange {
                from,
                first_sequence: window.first_sequence,
                next_sequence: window.next_sequence,
            });
        }
        let end = from.saturating_add(count);
        Ok(self
            .ring
            .iter()
            .filter(|o| o.sequence >= from && o.sequence < end)
            .filter(|o| ids.is_empty() || ids.contains(&o.id))
            .cloned()
            .collect())
    }

    /// `snapshotCurrent([ids])` (`spec.md` §4.3) — the raw current hash
    /// entries, one per id (condition multi-status is resolved one layer up
    /// in the query engine, which knows dataitem categories).
    pub fn snapshot_current(&self, ids: &HashSet<String>) -> Vec<Observation> {
        if ids.is_empty() {
            let mut all: Vec<Observation> = self.hash_current.values().cloned().collect();
            all.sort_by_key(|o| o.sequence);
            all
        } else {
            let mut out: Vec<Observation> = ids
                .iter()
                .filter_map(|id| self.hash_current.get(id).cloned())
                .collect();
            out.sort_by_key(|o| o.sequence);
            out
        }
    }

    /// Observation state "as of" sequence `at`: the latest observation per
    /// id with `sequence <= at`, found by a single forward scan of the ring
    /// (`SPEC_FULL.md` §B, `at=<seq>` support for `/current`). A dataitem
    /// whose last change predates everything still retained in the ring is
    /// omitted rather than reconstructed from an evicted record.
    pub fn snapshot_at(&self, ids: &HashSet<String>, at: u64) -> HashMap<String, Observation> {
        let mut result = HashMap::new();
        for o in self.ring.iter() {
            if o.sequence > at {
                break;
            }
            if !ids.is_empty() && !ids.contains(&o.id) {
                continue;
            }
            result.insert(o.id.clone(), o.clone());
        }
        result
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut h = History::new(10);
        let a = h.record("t1", "id1", "n1", ObservationValue::Scalar("A".into())).unwrap();
        let b = h.record("t2", "id2", "n2", ObservationValue::Scalar("B".into())).unwrap();
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
    }

    #[test]
    fn duplicate_scalar_is_suppressed() {
        let mut h = History::new(10);
        h.record("t1", "id1", "n1", ObservationValue::Scalar("A".into())).unwrap();
        let second = h.record("t2", "id1", "n1", ObservationValue::Scalar("A".into()));
        assert!(second.is_none());
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn unconditional_record_ignores_duplicate_value() {
        let mut h = History::new(10);
        h.record_unconditional("t1", "dev_asset_chg", "dev_asset_chg", ObservationValue::Scalar("EM233".into()));
        let second =
            h.record_unconditional("t2", "dev_asset_chg", "dev_asset_chg", ObservationValue::Scalar("EM233".into()));
        assert_eq!(second.sequence, 2);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn condition_never_suppressed() {
        let mut h = History::new(10);
        let cond = ObservationValue::Condition {
            level: ConditionLevel::Normal,
            native_code: "".into(),
            native_severity: "".into(),
            qualifier: "".into(),
            message: "".into(),
        };
        h.record("t1", "id1", "n1", cond.clone()).unwrap();
        let second = h.record("t2", "id1", "n1", cond);
        assert!(second.is_some());
    }

    #[test]
    fn ring_evicts_but_current_survives() {
        let mut h = History::new(2);
        h.record("t1", "a", "a", ObservationValue::Scalar("1".into()));
        h.record("t2", "b", "b", ObservationValue::Scalar("2".into()));
        h.record("t3", "c", "c", ObservationValue::Scalar("3".into()));
        assert_eq!(h.len(), 2);
        assert!(h.current("a").is_some());
        assert_eq!(h.sequence_window().first_sequence, 2);
    }

    #[test]
    fn sample_window_out_of_range() {
        let mut h = History::new(10);
        h.record("t1", "a", "a", ObservationValue::Scalar("1".into()));
        let err = h.sample_window(&HashSet::new(), 0, 5).unwrap_err();
        assert!(matches!(err, HistoryError::OutOfRange { .. }));
    }

    #[test]
    fn condition_clear_and_replace() {
        let mut h = History::new(10);
        let warn = ObservationValue::Condition {
            level: ConditionLevel::Warning,
            native_code: "HTEMP".into(),
            native_severity: "1".into(),
            qualifier: "HIGH".into(),
            message: "hot".into(),
        };
        h.record("t1", "htemp", "htemp", warn).unwrap();
        assert_eq!(h.active_conditions("htemp").len(), 1);

        let normal = ObservationValue::Condition {
            level: ConditionLevel::Normal,
            native_code: "".into(),
            native_severity: "".into(),
            qualifier: "".into(),
            message: "".into(),
        };
        h.record("t2", "htemp", "htemp", normal).unwrap();
        assert!(h.active_conditions("htemp").is_empty());
    }
}
