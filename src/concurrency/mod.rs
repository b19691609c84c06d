mod lock_manager;
mod page_lock;
mod transaction;
mod wait_for_graph;

pub use lock_manager::*;
pub use page_lock::*;
pub use transaction::*;
pub use wait_for_graph::*;
