// Implementations of the score store port.

pub mod in_memory;
pub mod redis_store;

// Re-export for convenience
pub use in_memory::InMemoryScoreStore;
pub use redis_store::RedisScoreStore;
