//! Chain transports. Everything here talks to the outside world and turns
//! native records into typed values; no watcher state lives here.

pub mod bitmark;
pub mod ethereum;
pub mod signalr;
pub mod tzkt;
pub mod tzkt_hub;
