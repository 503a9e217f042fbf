//! Integration tests: full pipeline runs and the HTTP client.

pub mod pipeline_run;
pub mod wrds_client;
