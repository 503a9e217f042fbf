//! Unit tests spanning the core aggregate/ratio/format path.

pub mod core_table;
