pub mod adapter;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod query;
pub mod registry;
pub mod shdr;
pub mod store;
pub mod xmltree;

use std::sync::Arc;
use tokio::sync::Mutex;

use registry::SchemaRegistry;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchemaRegistry>,
    pub store: Arc<Mutex<Store>>,
    pub agent_name: String,
}
