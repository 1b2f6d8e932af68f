//! A lottery service: agencies submit their bets in batches over tcp,
//! and once every agency is done the lottery is drawn and each agency
//! can ask for its winners.

pub mod agency;
pub mod client;
pub mod config;
pub mod lottery;
pub mod protocol;
pub mod server;
pub mod signals;
