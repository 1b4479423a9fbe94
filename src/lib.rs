mod batch;
mod datatypes;
mod record;
mod slice;
mod window;

pub use serde_json;

pub use batch::{BatchError, ShardBatch, SHARD_ID_COLUMN};
pub use datatypes::{Schema, SchemaError, ShardId};
pub use record::Row;
pub use window::{WindowBatch, WindowError, TIMESTAMP_COLUMN};
