pub mod cli;
pub mod client;
pub mod coalesce;
pub mod config;
pub mod drilldown;
pub mod events;
pub mod filter;
pub mod outcome;
pub mod sequence;
pub mod tree;
pub mod types;
