//! Ingest sequencer: the single logical writer that assigns sequence
//! numbers and performs every store mutation (`spec.md` §5). Adapter
//! connections parse lines synchronously and hand the outcome off here
//! rather than touching the store directly.

use super::Store;
use crate::shdr::ParseOutcome;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

struct IngestMessage {
    device_uuid: String,
    outcome: ParseOutcome,
}

/// Handle for submitting a parsed line's outcome. Non-blocking for the
/// adapter connection holding it.
#[derive(Clone)]
pub struct IngestSequencer {
    tx: mpsc::UnboundedSender<IngestMessage>,
}

impl IngestSequencer {
    pub fn submit(&self, device_uuid: impl Into<String>, outcome: ParseOutcome) {
        let _ = self.tx.send(IngestMessage {
            device_uuid: device_uuid.into(),
            outcome,
        });
    }
}

/// Spawn the background writer task and return the handle adapter
/// connections feed.
pub fn spawn(store: Arc<Mutex<Store>>) -> IngestSequencer {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rx, store));
    IngestSequencer { tx }
}

async fn run(mut rx: mpsc::UnboundedReceiver<IngestMessage>, store: Arc<Mutex<Store>>) {
    while let Some(msg) = rx.recv().await {
        match &msg.outcome {
            ParseOutcome::Skipped(reason) => {
                tracing::warn!(device_uuid = %msg.device_uuid, reason, "skipped SHDR line");
                continue;
            }
            ParseOutcome::Buffering => continue,
            _ => {}
        }
        let mut store = store.lock().await;
        store.apply_outcome(msg.outcome);
    }
}
