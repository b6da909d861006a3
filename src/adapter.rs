//! TCP adapter client: connects to one device's SHDR source, reads
//! newline-delimited lines, and forwards the parsed outcome to the ingest
//! sequencer (`SPEC_FULL.md` §A.6; the wire protocol itself is `spec.md`
//! §6's "SHDR inbound", named there as an external collaborator).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::registry::SchemaRegistry;
use crate::shdr::ShdrDecoder;
use crate::store::IngestSequencer;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A source of newline-delimited SHDR lines. `#[async_trait]` lets
/// [`run_adapter`] stay generic over the transport: the real TCP reader and
/// a test in-memory reader both implement it.
#[async_trait]
pub trait LineSource: Send {
    async fn connect(&mut self) -> std::io::Result<()>;
    /// `Ok(None)` on clean EOF, `Ok(Some(line))` per line read (with its
    /// trailing newline still attached — the parser trims it).
    async fn read_line(&mut self) -> std::io::Result<Option<String>>;
}

pub struct TcpLineSource {
    host: String,
    port: u16,
    reader: Option<BufReader<TcpStream>>,
}

impl TcpLineSource {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, reader: None }
    }
}

#[async_trait]
impl LineSource for TcpLineSource {
    async fn connect(&mut self) -> std::io::Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected"))?;
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Connect to `source`, feed every line through a per-connection
/// [`ShdrDecoder`], and forward each outcome to `sequencer` tagged with
/// `device_uuid`. Reconnects with exponential backoff (100 ms → 30 s, cap)
/// on connect failure, read error, or clean EOF (`spec.md` §7 Transient
/// policy). Returns once `shutdown` reports `true`.
pub async fn run_adapter(
    device_uuid: String,
    mut source: impl LineSource,
    sequencer: IngestSequencer,
    registry: Arc<SchemaRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;
    let mut decoder = ShdrDecoder::new();
    let mut first_attempt = true;

    loop {
        if *shutdown.borrow() {
            return;
        }

        if !first_attempt {
            tracing::warn!(device_uuid, backoff_ms = backoff.as_millis(), "reconnecting to adapter");
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
        first_attempt = false;

        if let Err(e) = source.connect().await {
            tracing::warn!(device_uuid, error = %e, "adapter connect failed");
            backoff = (backoff * 2).min(MAX_BACKOFF);
            continue;
        }
        tracing::info!(device_uuid, "adapter connected");
        backoff = INITIAL_BACKOFF;

        loop {
            tokio::select! {
                line = source.read_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let outcome = decoder.feed(&line, &device_uuid, registry.as_ref());
                            sequencer.submit(device_uuid.clone(), outcome);
                        }
                        Ok(None) => {
                            tracing::warn!(device_uuid, "adapter connection closed by peer");
                            warn_if_buffering_aborted(&device_uuid, &mut decoder);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(device_uuid, error = %e, "adapter read error");
                            warn_if_buffering_aborted(&device_uuid, &mut decoder);
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

fn warn_if_buffering_aborted(device_uuid: &str, decoder: &mut ShdrDecoder) {
    if decoder.abort_buffering() {
        tracing::warn!(device_uuid, "multi-line asset body truncated by disconnect, discarding buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::{Category, DataItem, Device, DeviceSchema, Representation};
    use std::collections::VecDeque;
    use std::time::Duration as StdDuration;

    struct InMemoryLineSource {
        lines: VecDeque<String>,
    }

    #[async_trait]
    impl LineSource for InMemoryLineSource {
        async fn connect(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        async fn read_line(&mut self) -> std::io::Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
    }

    #[tokio::test]
    async fn feeds_lines_into_store_via_sequencer() {
        let mut registry = SchemaRegistry::new();
        registry.insert_schema(DeviceSchema {
            devices: vec![Device {
                uuid: "000".to_string(),
                name: "VMC".to_string(),
                components: Vec::new(),
                dataitems: vec![DataItem {
                    id: "avail".to_string(),
                    name: "avail".to_string(),
                    data_type: "AVAILABILITY".to_string(),
                    category: Category::Event,
                    sub_type: None,
                    representation: Representation::Value,
                }],
            }],
        });
        let registry = Arc::new(registry);
        let store = Arc::new(tokio::sync::Mutex::new(crate::store::Store::new(10, 10)));
        let sequencer = crate::store::sequencer::spawn(store.clone());

        let source = InMemoryLineSource {
            lines: VecDeque::from(vec!["2021-01-01T00:00:00Z|avail|AVAILABLE".to_string()]),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_adapter("000".to_string(), source, sequencer, registry, shutdown_rx));

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let _ = shutdown_tx.send(true);
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        let store = store.lock().await;
        assert!(store.history().current("avail").is_some());
    }
}
