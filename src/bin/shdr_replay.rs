use clap::Parser;
use std::io::BufRead;
use tracing_subscriber::EnvFilter;

use mtconnect_agent::models::device::DeviceSchema;
use mtconnect_agent::registry::SchemaRegistry;
use mtconnect_agent::shdr::ShdrDecoder;
use mtconnect_agent::store::Store;

/// Replays a captured SHDR line log against a device schema and prints the
/// resulting current values, for debugging adapter captures offline.
#[derive(Parser, Debug)]
#[command(name = "shdr-replay")]
struct Cli {
    /// Device schema JSON file (same format referenced by `schema_path` in
    /// the agent config).
    #[arg(long)]
    schema: String,

    /// Device uuid the replayed lines are attributed to.
    #[arg(long)]
    device_uuid: String,

    /// File of newline-delimited SHDR lines. Reads stdin if omitted.
    #[arg(long)]
    file: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shdr_replay=info")))
        .init();

    let cli = Cli::parse();

    let schema_contents = std::fs::read_to_string(&cli.schema)?;
    let schema: DeviceSchema = serde_json::from_str(&schema_contents)?;
    let mut registry = SchemaRegistry::new();
    registry.insert_schema(schema);

    let mut store = Store::new(10_000, 1024);
    let mut decoder = ShdrDecoder::new();

    let lines: Box<dyn BufRead> = match &cli.file {
        Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    let mut fed = 0usize;
    for line in lines.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let outcome = decoder.feed(&line, &cli.device_uuid, &registry);
        store.apply_outcome(outcome);
        fed += 1;
    }

    let window = store.history().sequence_window();
    println!("replayed {fed} lines, firstSequence={} nextSequence={}", window.first_sequence, window.next_sequence);
    for id in registry.all_dataitem_ids(&[cli.device_uuid.clone()]) {
        if let Some(obs) = store.history().current(&id) {
            println!("{id} = {:?}", obs.value);
        }
    }

    Ok(())
}
