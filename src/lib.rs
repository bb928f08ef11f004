pub mod cid;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod server;
