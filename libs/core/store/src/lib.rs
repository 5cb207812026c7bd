//! Key-value and stream primitives backing the task queue.
//!
//! `KvStore` covers plain get/set/hash operations used for task records and
//! the fast result tier; `StreamStore` covers the consumer-group dispatch
//! mechanics (append, claim, ack, introspect) used by the dispatcher, worker
//! and janitor. Both wrap the same kind of `ConnectionManager` and are cheap
//! to clone and pass around.

pub mod connect;
pub mod error;
pub mod kv;
pub mod stream;

pub use connect::{connect, connect_from_config};
pub use error::StoreError;
pub use kv::KvStore;
pub use stream::{ConsumerInfo, PendingSummary, StreamEntry, StreamInfo, StreamStore};

use redis::aio::ConnectionManager;

/// Convenience bundle wiring both store facades to one connection.
#[derive(Clone)]
pub struct Store {
    pub kv: KvStore,
    pub stream: StreamStore,
}

impl Store {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            kv: KvStore::new(conn.clone()),
            stream: StreamStore::new(conn),
        }
    }
}
