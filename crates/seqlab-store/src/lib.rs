pub mod error;
pub mod files;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use files::{default_base_dir, load_dataset, load_experiment, open_history, write_dataset};
pub use store::{RunRecord, RunStore};
