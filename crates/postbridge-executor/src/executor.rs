use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use postbridge_common::protocol::{Envelope, RequestId, RequestOptions};
use postbridge_common::transport::{Delivery, Origin, RealmPort};

use crate::fetch::{resolve_target, ApiFetcher};

/// Constructor-injected executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// The single origin trusted to be the caller. Inbound messages from
    /// any other origin are dropped before their content is looked at.
    pub caller_origin: Origin,
    /// Base for resolving relative endpoints; in the browser deployment
    /// this is the host document's own origin, whose cookie scope the
    /// fetcher rides on.
    pub api_base: Origin,
}

impl ExecutorConfig {
    pub fn new(caller_origin: Origin, api_base: Origin) -> Self {
        Self {
            caller_origin,
            api_base,
        }
    }
}

/// The executor peer of the bridge.
///
/// Receives handshake and call envelopes from the caller realm, performs
/// the network I/O through its [`ApiFetcher`], and relays exactly one
/// `API_RESPONSE` per `API_REQUEST` - carrying either decoded data or an
/// error description, never both, never neither. Every local failure is
/// captured into the error branch; nothing crashes the pump or leaves the
/// caller's request unanswered.
///
/// # Lifecycle
///
/// [`start`](Executor::start) installs the pump once; a second call is a
/// no-op. The receive channel exists from construction, so a handshake
/// arriving before `start` is buffered, not lost.
pub struct Executor {
    inner: Arc<ExecutorInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

struct ExecutorInner {
    config: ExecutorConfig,
    port: RealmPort,
    fetcher: Arc<dyn ApiFetcher>,
}

impl Executor {
    pub fn new(port: RealmPort, fetcher: Arc<dyn ApiFetcher>, config: ExecutorConfig) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                config,
                port,
                fetcher,
            }),
            pump: Mutex::new(None),
        }
    }

    /// Installs the inbound message pump. A second installation attempt is
    /// a no-op.
    pub async fn start(&self) {
        let mut pump = self.pump.lock().await;
        if pump.is_some() {
            debug!("executor already installed");
            return;
        }

        info!(caller = %self.inner.config.caller_origin, "executor installed");
        let inner = Arc::clone(&self.inner);
        *pump = Some(tokio::spawn(async move {
            while let Some(delivery) = inner.port.recv().await {
                inner.handle_delivery(delivery);
            }
        }));
    }

    /// Uninstalls the pump. In-flight fetches still complete and post
    /// their responses; the caller discards any it no longer expects.
    pub async fn stop(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
    }
}

impl ExecutorInner {
    fn handle_delivery(self: &Arc<Self>, delivery: Delivery) {
        // Sole authentication: exact match against the one configured
        // caller origin, before any content is trusted.
        if delivery.sender != self.config.caller_origin {
            warn!(origin = %delivery.sender, "rejected message from untrusted origin");
            return;
        }

        let envelope = match serde_json::from_value::<Envelope>(delivery.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%err, "discarding malformed envelope");
                return;
            }
        };

        match envelope {
            Envelope::IframeReady => {
                // Reply to the requesting sender's own reported origin, not
                // a broadcast. Duplicate handshakes get duplicate replies.
                info!(caller = %delivery.sender, "caller ready, confirming connection");
                self.post(Envelope::ConnectionReady, &delivery.sender);
            }
            Envelope::ApiRequest {
                request_id,
                endpoint,
                options,
            } => {
                // Fetch on its own task so slow network I/O never blocks
                // other inbound messages.
                let inner = Arc::clone(self);
                let requester = delivery.sender;
                tokio::spawn(async move {
                    inner
                        .handle_api_request(requester, request_id, endpoint, options)
                        .await;
                });
            }
            other => {
                debug!(?other, "discarding unexpected envelope");
            }
        }
    }

    /// Serves one API request end to end, always posting exactly one
    /// response: data on success, a description on any failure.
    async fn handle_api_request(
        &self,
        requester: Origin,
        request_id: RequestId,
        endpoint: String,
        options: RequestOptions,
    ) {
        let target = resolve_target(&self.config.api_base, &endpoint);
        debug!(%request_id, %target, "dispatching api request");

        let response = match self.fetcher.fetch(&target, &options).await {
            Ok(data) => Envelope::api_response_ok(request_id, data),
            Err(err) => {
                warn!(%target, %err, "api request failed");
                Envelope::api_response_err(request_id, err.to_string())
            }
        };

        self.post(response, &requester);
    }

    fn post(&self, envelope: Envelope, target: &Origin) {
        let payload = match serde_json::to_value(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "failed to encode envelope");
                return;
            }
        };

        if let Err(err) = self.port.post(payload, target) {
            warn!(%err, "failed to post envelope to caller realm");
        }
    }
}
