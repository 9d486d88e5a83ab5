pub mod advanced;
pub mod cli;
pub mod club_api;
pub mod config;
pub mod http_client;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod records;
pub mod run_log;
pub mod shot_locations;
pub mod sources;
pub mod store;
pub mod table;
pub mod validate;
