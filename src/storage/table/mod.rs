mod heap_file;
mod table_iterator;

pub use heap_file::*;
pub use table_iterator::*;
