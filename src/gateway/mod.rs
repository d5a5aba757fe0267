pub mod client;
pub mod protocol;
pub mod server;

pub use client::ResolutionClient;
pub use server::ResolutionServer;
