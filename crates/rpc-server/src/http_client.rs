//! HTTP Client - reaches peer acceptors and node endpoints
//!
//! Opens one HTTP/1.1 connection per call; a refused connection, a broken
//! exchange or an undecodable reply all surface as transport failures.

use crate::http_server::{PREPARE_PATH, PROPOSE_PATH, STATE_PATH, SUBMIT_PATH};
use crate::methods::{ErrorResponse, SubmitRequest};
use async_trait::async_trait;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use paxos_consensus::{
    AcceptorState, AcceptorTransport, ConsensusError, PrepareRequest, Proposal, ProposeRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid peer url: {0}")]
    InvalidUrl(String),
    #[error("Connect error: {0}")]
    Connect(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
    #[error("Request error: {0}")]
    Request(#[from] axum::http::Error),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Peer responded {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error(transparent)]
    Rejected(ConsensusError),
}

impl RpcError {
    /// Fold into the core's error, keeping a peer's own rejection as is
    pub fn into_consensus(self, peer: &str) -> ConsensusError {
        match self {
            RpcError::Rejected(e) => e,
            other => ConsensusError::transport(peer, other),
        }
    }
}

/// Check a `http://host:port[/base]` url and return it without a trailing slash
pub fn parse_base_url(url: &str) -> Result<String, RpcError> {
    let base = url.trim_end_matches('/');
    let uri: Uri = base
        .parse()
        .map_err(|_| RpcError::InvalidUrl(url.to_string()))?;
    if uri.scheme_str() != Some("http") || uri.host().is_none() || uri.port().is_none() {
        return Err(RpcError::InvalidUrl(url.to_string()));
    }
    Ok(base.to_string())
}

/// Acceptor transport over HTTP+JSON to a fixed node set
pub struct HttpTransport {
    peers: Vec<String>,
}

impl HttpTransport {
    /// Create a transport over peer base urls such as `http://paxos_3001:3001`
    pub fn new<I, S>(peers: I) -> Result<Self, RpcError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers = peers
            .into_iter()
            .map(|peer| parse_base_url(peer.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { peers })
    }

    async fn call<B: Serialize>(&self, peer: usize, path: &str, body: &B) -> Result<Proposal, ConsensusError> {
        let base = self
            .peers
            .get(peer)
            .ok_or_else(|| ConsensusError::transport(format!("peer {}", peer), "no such peer"))?;

        tracing::debug!("Proposer: sending request to {}{}", base, path);
        let result: Result<Proposal, RpcError> = async {
            let (status, bytes) = post(base, path, body).await?;
            decode_reply::<Proposal>(status, &bytes)
        }
        .await;

        result.map_err(|e| e.into_consensus(base))
    }
}

#[async_trait]
impl AcceptorTransport for HttpTransport {
    fn node_set(&self) -> &[String] {
        &self.peers
    }

    async fn prepare(&self, peer: usize, request: PrepareRequest) -> Result<Proposal, ConsensusError> {
        self.call(peer, PREPARE_PATH, &request).await
    }

    async fn propose(&self, peer: usize, request: ProposeRequest) -> Result<Proposal, ConsensusError> {
        self.call(peer, PROPOSE_PATH, &request).await
    }
}

/// Client for a single node's public endpoints
pub struct NodeClient {
    base: String,
}

impl NodeClient {
    pub fn new(base: &str) -> Result<Self, RpcError> {
        Ok(Self {
            base: parse_base_url(base)?,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Ask the node's proposer to get `value` chosen
    pub async fn submit(&self, value: &str) -> Result<(), RpcError> {
        let body = SubmitRequest {
            value: value.to_string(),
        };
        let (status, bytes) = post(&self.base, SUBMIT_PATH, &body).await?;
        if status.is_success() {
            return Ok(());
        }
        Err(error_reply(status, &bytes))
    }

    /// Read the node's acceptor state
    pub async fn acceptor_state(&self) -> Result<AcceptorState, RpcError> {
        let uri = endpoint(&self.base, STATE_PATH)?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(path_of(&uri))
            .header(HOST, authority_of(&uri))
            .body(Empty::<Bytes>::new())?;
        let (status, bytes) = send(&uri, request).await?;
        decode_reply(status, &bytes)
    }
}

fn endpoint(base: &str, path: &str) -> Result<Uri, RpcError> {
    let url = format!("{}{}", base, path);
    url.parse().map_err(|_| RpcError::InvalidUrl(url))
}

fn path_of(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

fn authority_of(uri: &Uri) -> String {
    uri.authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_default()
}

async fn post<B: Serialize>(base: &str, path: &str, body: &B) -> Result<(StatusCode, Bytes), RpcError> {
    let uri = endpoint(base, path)?;
    let payload = serde_json::to_vec(body)?;
    let request = Request::builder()
        .method(Method::POST)
        .uri(path_of(&uri))
        .header(HOST, authority_of(&uri))
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))?;
    send(&uri, request).await
}

async fn send<B>(uri: &Uri, request: Request<B>) -> Result<(StatusCode, Bytes), RpcError>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let invalid = || RpcError::InvalidUrl(uri.to_string());
    // IPv6 literals keep their brackets in the uri
    let host = uri
        .host()
        .ok_or_else(invalid)?
        .trim_start_matches('[')
        .trim_end_matches(']');
    let port = uri.port_u16().ok_or_else(invalid)?;

    let stream = TcpStream::connect((host, port)).await?;
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("Peer connection closed: {}", e);
        }
    });

    let response = sender.send_request(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok((status, bytes))
}

fn decode_reply<R: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<R, RpcError> {
    if status.is_success() {
        return Ok(serde_json::from_slice(bytes)?);
    }
    Err(error_reply(status, bytes))
}

fn error_reply(status: StatusCode, bytes: &[u8]) -> RpcError {
    match serde_json::from_slice::<ErrorResponse>(bytes) {
        Ok(ErrorResponse {
            error: Some(error), ..
        }) => RpcError::Rejected(error),
        Ok(ErrorResponse { message, .. }) => RpcError::Status { status, message },
        Err(_) => RpcError::Status {
            status,
            message: String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_server::HttpNodeServer;
    use crate::methods::NodeContext;
    use paxos_consensus::{Acceptor, LocalTransport, ProposerConfig};
    use std::sync::Arc;

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("http://paxos_3001:3001/").unwrap(),
            "http://paxos_3001:3001"
        );
        assert_eq!(parse_base_url("http://[::1]:3001").unwrap(), "http://[::1]:3001");
        assert!(parse_base_url("https://example.com:443").is_err());
        assert!(parse_base_url("http://example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("/relative").is_err());
    }

    #[test]
    fn test_transport_keeps_node_order() {
        let transport = HttpTransport::new(["http://a:1", "http://b:2/", "http://c:3"]).unwrap();
        assert_eq!(transport.node_set(), &["http://a:1", "http://b:2", "http://c:3"]);
    }

    #[test]
    fn test_error_reply_keeps_rejection_kind() {
        let body = serde_json::to_vec(&ErrorResponse::from(&ConsensusError::StalePromise {
            requested: 1,
            promised: 4,
        }))
        .unwrap();

        let err = error_reply(StatusCode::CONFLICT, &body).into_consensus("http://a:1");
        assert_eq!(
            err,
            ConsensusError::StalePromise {
                requested: 1,
                promised: 4,
            }
        );
    }

    #[test]
    fn test_untyped_error_is_transport_failure() {
        let err = error_reply(StatusCode::INTERNAL_SERVER_ERROR, b"boom").into_consensus("http://a:1");
        match err {
            ConsensusError::TransportFailure { peer, reason } => {
                assert_eq!(peer, "http://a:1");
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new([format!("http://{}", addr)]).unwrap();
        let err = transport.prepare(0, PrepareRequest { id: 1 }).await.unwrap_err();
        assert!(matches!(err, ConsensusError::TransportFailure { .. }));
    }

    #[tokio::test]
    async fn test_reaches_ipv6_peer() {
        let listener = tokio::net::TcpListener::bind("[::1]:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let context = NodeContext::new(
            Acceptor::shared(),
            LocalTransport::cluster(0).0,
            ProposerConfig::default(),
        );
        tokio::spawn(async move {
            let _ = HttpNodeServer::new(Arc::new(context)).serve(listener).await;
        });

        let transport = HttpTransport::new([url.as_str()]).unwrap();
        let promise = transport.prepare(0, PrepareRequest { id: 2 }).await.unwrap();
        assert_eq!(promise, Proposal::empty(2));

        let state = NodeClient::new(&url).unwrap().acceptor_state().await.unwrap();
        assert_eq!(state.max_seen_id, 2);
    }
}
