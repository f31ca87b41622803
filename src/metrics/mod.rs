//! Faucet metrics.

use futures_util::future::BoxFuture;
use jsonrpsee::{
    MethodResponse,
    server::middleware::rpc::RpcServiceT,
    types::{Request, error::METHOD_NOT_FOUND_CODE},
};
use metrics::{Counter, counter, histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// Metrics of the [`FaucetService`](crate::faucet::FaucetService).
#[derive(Metrics)]
#[metrics(scope = "faucet")]
pub struct FaucetMetrics {
    /// Number of token requests.
    pub requests: Counter,
    /// Number of token requests rejected by the eligibility policy.
    pub ineligible: Counter,
    /// Number of claims rejected because they were already fulfilled.
    pub already_claimed: Counter,
    /// Number of claims fulfilled.
    pub claimed: Counter,
    /// Number of claims whose transfer failed.
    pub failed: Counter,
    /// Number of failed ledger writes.
    pub ledger_persist_failures: Counter,
}

/// A [`jsonrpsee`] RPC middleware recording the outcome and latency of faucet methods.
#[derive(Debug, Clone)]
pub struct RpcMetricsService<S> {
    service: S,
}

impl<S> RpcMetricsService<S> {
    /// Wraps `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<'a, S> RpcServiceT<'a> for RpcMetricsService<S>
where
    S: RpcServiceT<'a> + Send + Sync + Clone + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let method = req.method_name().to_string();
            let started = Instant::now();
            let response = service.call(req).await;
            let elapsed = started.elapsed();

            let code = response.as_error_code();
            if code == Some(METHOD_NOT_FOUND_CODE) {
                return response;
            }

            debug!(%method, ?code, elapsed_ms = elapsed.as_millis() as u64, "Served RPC call");
            let outcome = if code.is_some() { "error" } else { "ok" };
            counter!("rpc.calls", "method" => method.clone(), "outcome" => outcome).increment(1);
            if let Some(code) = code {
                counter!("rpc.errors", "method" => method.clone(), "code" => code.to_string())
                    .increment(1);
            }
            histogram!("rpc.latency", "method" => method).record(elapsed.as_millis() as f64);

            response
        })
    }
}

/// Builds a Prometheus exporter serving on `metrics_addr`, returning a handle.
///
/// The recorder is installed once per process, later calls return the existing handle. The
/// recorder will perform upkeep every 5 seconds.
pub fn setup_exporter(metrics_addr: impl Into<SocketAddr>) -> eyre::Result<PrometheusHandle> {
    static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

    let mut lock = HANDLE.lock().map_err(|_| eyre::eyre!("metrics handle lock poisoned"))?;
    if let Some(handle) = &*lock {
        return Ok(handle.clone());
    }

    let addr: SocketAddr = metrics_addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| eyre::eyre!("could not set metrics recorder"))?;
    tokio::spawn(exporter);

    info!(%addr, "Started metrics server");

    *lock = Some(handle.clone());

    Ok(handle)
}
