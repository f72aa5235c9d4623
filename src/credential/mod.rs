//! 上游凭据（API key）管理。

pub mod pool;

pub use pool::KeyPool;
