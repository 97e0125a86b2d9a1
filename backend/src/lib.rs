pub mod adapters;
pub mod aggregator;
pub mod conditions;
pub mod config;
pub mod consensus;
pub mod imaging;
pub mod invoker;
pub mod plan;
pub mod routes;
