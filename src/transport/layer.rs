//! Per-network transport layer for chain providers.

use crate::types::Network;
use alloy::{
    rpc::json_rpc::{RequestPacket, ResponsePacket},
    transports::{TransportError, TransportErrorKind, TransportFut},
};
use futures_util::FutureExt;
use metrics::{counter, histogram};
use std::{
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tower::{Layer, Service};
use tracing::{Instrument, debug_span, warn};

/// Error returned by [`NetworkTransport`] for a request that was not answered in time.
#[derive(Debug, thiserror::Error)]
#[error("request to {network} timed out after {}ms: {method}", .timeout.as_millis())]
pub struct RequestTimeout {
    /// The network the request was sent to.
    pub network: Network,
    /// The JSON-RPC method, or `batch`.
    pub method: String,
    /// The deadline that was exceeded.
    pub timeout: Duration,
}

/// A [`tower::Layer`] bounding every request of a network's provider by a deadline.
///
/// Requests are wrapped in a span carrying the network and method, and their latency and
/// timeouts are recorded per network.
#[derive(Debug, Clone)]
pub struct NetworkLayer {
    network: Network,
    timeout: Duration,
}

impl NetworkLayer {
    /// Create a new [`NetworkLayer`] for `network` with the given request timeout.
    pub const fn new(network: Network, timeout: Duration) -> Self {
        Self { network, timeout }
    }
}

impl<S> Layer<S> for NetworkLayer {
    type Service = NetworkTransport<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NetworkTransport { inner, network: self.network, timeout: self.timeout }
    }
}

/// Transport produced by [`NetworkLayer`].
#[derive(Debug, Clone)]
pub struct NetworkTransport<S> {
    inner: S,
    network: Network,
    timeout: Duration,
}

impl<S> Service<RequestPacket> for NetworkTransport<S>
where
    S: Service<RequestPacket, Future = TransportFut<'static>, Error = TransportError>
        + Send
        + Clone
        + 'static,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        let method = match &request {
            RequestPacket::Single(req) => req.method().to_string(),
            RequestPacket::Batch(_) => "batch".to_string(),
        };
        let network = self.network;
        let timeout = self.timeout;
        let span = debug_span!("rpc", %network, %method);
        let fut = self.inner.call(request);

        async move {
            let started = Instant::now();
            let Ok(result) = tokio::time::timeout(timeout, fut).await else {
                warn!(timeout_secs = timeout.as_secs(), "RPC request timed out");
                counter!("transport.timeouts", "network" => network.as_str()).increment(1);
                return Err(TransportErrorKind::custom(RequestTimeout { network, method, timeout }));
            };

            histogram!("transport.latency", "network" => network.as_str())
                .record(started.elapsed().as_millis() as f64);
            result
        }
        .instrument(span)
        .boxed()
    }
}
