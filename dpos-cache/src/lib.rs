pub mod layer;
pub mod store;
pub mod wrapper;

pub use layer::{CacheLayer, CacheRead, CacheWrite};
pub use store::{KvBatch, KvStore, MemoryStore};
pub use wrapper::{CacheError, CacheWrapper, Domain};
