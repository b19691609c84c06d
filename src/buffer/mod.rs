mod buffer_pool;
mod frame;
mod lru_replacer;

pub use buffer_pool::*;
pub use frame::*;
pub use lru_replacer::*;
