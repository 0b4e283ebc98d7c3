//! Paxos RPC - HTTP+JSON surface for a Paxos node
//!
//! Provides:
//! - HTTP server: client submissions plus the acceptor's prepare/propose endpoints
//! - HTTP client: `AcceptorTransport` over peer base urls, and a client for submissions

pub mod http_client;
pub mod http_server;
pub mod methods;

pub use http_client::{HttpTransport, NodeClient, RpcError};
pub use http_server::HttpNodeServer;
pub use methods::{ErrorResponse, NodeContext, SubmitRequest};

