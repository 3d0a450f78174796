pub mod error;
pub mod routes;
pub mod state;
pub mod streaming;
