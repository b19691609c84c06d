mod catalog;
mod loader;

pub use catalog::*;
