//! The internal data service: holdings, ledger and watchlist persistence
//! behind an API-key gated XML interface, plus the client the public API
//! uses to reach it.

pub mod client;
pub mod server;
pub mod xml;

pub use client::{DataClient, DataClientError};
pub use server::{router, DataError, DataState};
