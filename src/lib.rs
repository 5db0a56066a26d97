pub mod autofill;
pub mod config;
pub mod db;
pub mod dedup;
pub mod generate;
pub mod handlers;
pub mod model;
pub mod provider;
