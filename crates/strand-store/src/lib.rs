pub mod backend;
pub mod compose;
pub mod document;
pub mod engine;
pub mod explorer;
pub mod memory;
pub mod sled_store;
pub mod sql;
pub mod store;

pub use backend::Backend;
pub use compose::{FirstMatchSequence, ParallelBroadcast};
pub use document::{DocumentCollection, DocumentStore};
pub use engine::DataNode;
pub use explorer::ExplorerBridge;
pub use memory::MemoryStore;
pub use sled_store::SledStore;
pub use sql::{SqlExecutor, SqlStore};
pub use store::RecordStore;
