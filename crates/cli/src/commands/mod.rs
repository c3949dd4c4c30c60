pub mod collect;
pub mod types;
