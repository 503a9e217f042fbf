pub mod aggregate;
pub mod analysis;
pub mod cache;
pub mod groups;
pub mod models;
pub mod pipeline;
pub mod ratios;
pub mod reference;
pub mod table;
pub mod wrds;
