pub mod config;
pub mod generator;
pub mod models;
pub mod storage;

pub use config::{DEFAULT_BATCH_SIZE, GeneratorConfig};
pub use generator::AccountGenerator;
pub use models::{AccountBatch, AccountRecord};
pub use storage::{load_batch_from_json, save_batch_to_json};
