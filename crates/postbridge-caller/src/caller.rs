use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use postbridge_common::protocol::envelope::generate_request_id;
use postbridge_common::protocol::{BridgeError, Envelope, RequestId, RequestOptions, Result};
use postbridge_common::transport::{Delivery, Origin, RealmPort};

use crate::endpoint;

/// Default per-request deadline, matching the bridge's 30-second contract.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period before the handshake is posted, giving the host
/// document time to install its listener first.
pub const DEFAULT_HANDSHAKE_DELAY: Duration = Duration::from_millis(500);

/// Constructor-injected caller configuration.
#[derive(Debug, Clone)]
pub struct CallerConfig {
    /// The single origin trusted to be the executor. Inbound messages from
    /// any other origin are dropped; outbound messages are addressed here.
    pub executor_origin: Origin,
    /// Deadline for each individual call.
    pub request_timeout: Duration,
    /// Grace period between `connect()` and the handshake being posted.
    pub handshake_delay: Duration,
}

impl CallerConfig {
    /// Configuration with the default timeout and handshake delay.
    pub fn new(executor_origin: Origin) -> Self {
        Self {
            executor_origin,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            handshake_delay: DEFAULT_HANDSHAKE_DELAY,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }
}

/// The caller peer of the bridge.
///
/// Owns the pending-request table and the connection state. All inbound
/// envelopes pass one gate before anything else: the transport-stamped
/// sender origin must equal the configured executor origin exactly.
///
/// # Lifecycle
///
/// `new` → [`start`](Caller::start) (spawns the inbound pump) →
/// [`connect`](Caller::connect) (posts the handshake) → calls →
/// [`stop`](Caller::stop) (aborts the pump, fails everything in flight
/// with [`BridgeError::ConnectionReset`]).
///
/// # Connection states
///
/// `disconnected --connect()--> handshake-sent --CONNECTION_READY-->
/// connected`. Re-entrant `connect()` while handshaking or connected is a
/// no-op; duplicate ready signals are harmless.
pub struct Caller {
    inner: Arc<CallerInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

struct CallerInner {
    config: CallerConfig,
    port: RealmPort,
    /// In-flight calls keyed by request id. An entry is removed exactly
    /// once: by its response, by its timeout, or by `stop()`.
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Result<Value>>>>,
    connected: watch::Sender<bool>,
    handshake_sent: AtomicBool,
}

impl Caller {
    pub fn new(port: RealmPort, config: CallerConfig) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(CallerInner {
                config,
                port,
                pending: Mutex::new(HashMap::new()),
                connected,
                handshake_sent: AtomicBool::new(false),
            }),
            pump: Mutex::new(None),
        }
    }

    /// Spawns the inbound message pump. Idempotent.
    ///
    /// The receive channel exists from construction, so nothing posted
    /// between `new` and `start` is lost.
    pub async fn start(&self) {
        let mut pump = self.pump.lock().await;
        if pump.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *pump = Some(tokio::spawn(async move {
            while let Some(delivery) = inner.port.recv().await {
                inner.handle_delivery(delivery).await;
            }
        }));
    }

    /// Posts the connection handshake to the executor.
    ///
    /// Idempotent: once a handshake has been sent (or the connection is
    /// already up) further calls do nothing. Waits the configured grace
    /// period first, then posts `IFRAME_READY`; it does *not* wait for the
    /// executor's reply - observe completion via
    /// [`is_connected`](Caller::is_connected) or
    /// [`wait_connected`](Caller::wait_connected).
    pub async fn connect(&self) -> Result<()> {
        if self.inner.handshake_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        tokio::time::sleep(self.inner.config.handshake_delay).await;

        info!(executor = %self.inner.config.executor_origin, "requesting connection");
        let payload = serde_json::to_value(Envelope::IframeReady)?;
        self.inner
            .port
            .post(payload, &self.inner.config.executor_origin)
            .inspect_err(|_| {
                self.inner.handshake_sent.store(false, Ordering::SeqCst);
            })
    }

    /// Whether a valid `CONNECTION_READY` has been received.
    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// A watch on the connected flag, for collaborators that want to be
    /// notified when the connection comes up.
    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Waits until the connected flag is set.
    pub async fn wait_connected(&self) {
        let mut connected = self.inner.connected.subscribe();
        while !*connected.borrow_and_update() {
            if connected.changed().await.is_err() {
                return;
            }
        }
    }

    /// Issues one API call and awaits its outcome.
    ///
    /// Fails immediately with [`BridgeError::NotConnected`] before the
    /// handshake has completed - nothing reaches the transport. Otherwise
    /// registers a pending entry under a fresh request id, posts the
    /// `API_REQUEST`, and settles in exactly one of four ways:
    ///
    /// - a matching success response resolves with its data
    ///   (missing data resolves as [`Value::Null`]);
    /// - a matching error response fails with [`BridgeError::Remote`];
    /// - the deadline elapses: the pending entry is removed and the call
    ///   fails with [`BridgeError::Timeout`] (a response arriving later is
    ///   discarded as unknown);
    /// - [`stop`](Caller::stop) fails it with
    ///   [`BridgeError::ConnectionReset`].
    ///
    /// Any number of calls may be outstanding at once; completions are
    /// correlated by id, not order.
    pub async fn call(&self, endpoint: impl Into<String>, options: RequestOptions) -> Result<Value> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let request_id = generate_request_id();
        let envelope = Envelope::ApiRequest {
            request_id: request_id.clone(),
            endpoint: endpoint.into(),
            options,
        };
        let payload = serde_json::to_value(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .await
            .insert(request_id.clone(), tx);

        if let Err(err) = self
            .inner
            .port
            .post(payload, &self.inner.config.executor_origin)
        {
            self.inner.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // The sender was dropped without settling: torn down by stop().
            Ok(Err(_)) => Err(BridgeError::ConnectionReset),
            Err(_) => {
                // Removing the entry here is the cancellation step; a late
                // response then hits the unknown-id discard path.
                self.inner.pending.lock().await.remove(&request_id);
                debug!(%request_id, "request timed out");
                Err(BridgeError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Convenience wrapper: list matters, optionally filtered by query
    /// parameters such as `("page[size]", "10")`.
    pub async fn matters(&self, params: &[(&str, &str)]) -> Result<Value> {
        self.call(
            endpoint::with_query("api/rest/actions", params),
            RequestOptions::get(),
        )
        .await
    }

    /// Convenience wrapper: list contacts.
    pub async fn contacts(&self, params: &[(&str, &str)]) -> Result<Value> {
        self.call(
            endpoint::with_query("api/rest/participants", params),
            RequestOptions::get(),
        )
        .await
    }

    /// Convenience wrapper: fetch a single matter by id.
    pub async fn matter_by_id(&self, matter_id: &str) -> Result<Value> {
        self.call(
            format!("api/rest/actions/{matter_id}"),
            RequestOptions::get(),
        )
        .await
    }

    /// Tears the caller down: aborts the pump, resets the connection state,
    /// and fails every in-flight call with [`BridgeError::ConnectionReset`].
    pub async fn stop(&self) {
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }

        // Dropping the senders settles the in-flight calls.
        self.inner.pending.lock().await.clear();
        self.inner.connected.send_replace(false);
        self.inner.handshake_sent.store(false, Ordering::SeqCst);
    }
}

impl CallerInner {
    async fn handle_delivery(&self, delivery: Delivery) {
        // Sole authentication: nothing in the payload is trusted until the
        // transport-stamped sender origin matches exactly.
        if delivery.sender != self.config.executor_origin {
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
            Envelope::ConnectionReady => {
                let was_connected = self.connected.send_replace(true);
                if !was_connected {
                    info!("connected to executor");
                }
            }
            Envelope::ApiResponse {
                request_id,
                data,
                error,
            } => {
                let tx = self.pending.lock().await.remove(&request_id);
                let Some(tx) = tx else {
                    debug!(%request_id, "discarding response for unknown or settled request");
                    return;
                };

                let outcome = match error {
                    Some(message) => Err(BridgeError::Remote(message)),
                    None => Ok(data.unwrap_or(Value::Null)),
                };
                // Send fails only if the call just timed out and dropped its
                // receiver; the entry is gone either way.
                let _ = tx.send(outcome);
            }
            other => {
                debug!(?other, "discarding unexpected envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbridge_common::transport::realm_pair;
    use serde_json::json;

    fn origin(s: &str) -> Origin {
        s.parse().expect("test origin should parse")
    }

    /// A caller wired to a hand-driven executor-side port, with no
    /// handshake delay so tests stay fast.
    fn bridge() -> (Caller, RealmPort, Origin) {
        let embed = origin("https://app.example");
        let host = origin("https://host.example");
        let (caller_port, host_port) = realm_pair(embed.clone(), host.clone());

        let config = CallerConfig::new(host.clone())
            .with_handshake_delay(Duration::ZERO)
            .with_request_timeout(Duration::from_secs(30));
        (Caller::new(caller_port, config), host_port, embed)
    }

    async fn handshake(caller: &Caller, host_port: &RealmPort, embed: &Origin) {
        caller.start().await;
        caller.connect().await.unwrap();

        // Consume the IFRAME_READY and confirm.
        let delivery = host_port.recv().await.unwrap();
        let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
        assert_eq!(envelope, Envelope::IframeReady);

        host_port
            .post(serde_json::to_value(Envelope::ConnectionReady).unwrap(), embed)
            .unwrap();
        caller.wait_connected().await;
    }

    #[tokio::test]
    async fn test_call_before_handshake_fails_and_sends_nothing() {
        let (caller, host_port, _embed) = bridge();
        caller.start().await;

        let result = caller.call("api/rest/actions", RequestOptions::get()).await;
        assert!(matches!(result, Err(BridgeError::NotConnected)));

        // Nothing reached the transport: the only message the host ever
        // sees after connect() is the handshake itself.
        caller.connect().await.unwrap();
        let delivery = host_port.recv().await.unwrap();
        let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
        assert_eq!(envelope, Envelope::IframeReady);
    }

    #[tokio::test]
    async fn test_handshake_connects() {
        let (caller, host_port, embed) = bridge();
        assert!(!caller.is_connected());

        handshake(&caller, &host_port, &embed).await;
        assert!(caller.is_connected());

        // connect() is now a no-op: no second IFRAME_READY is posted, so
        // the next message the host sees is the API_REQUEST below.
        caller.connect().await.unwrap();

        // A duplicate ready signal is harmless.
        host_port
            .post(json!({"type": "CONNECTION_READY"}), &embed)
            .unwrap();

        let executor = tokio::spawn(async move {
            let delivery = host_port.recv().await.unwrap();
            let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
            let Envelope::ApiRequest { request_id, .. } = envelope else {
                panic!("expected API_REQUEST after the no-op connect");
            };
            host_port
                .post(
                    serde_json::to_value(Envelope::api_response_ok(request_id, json!(true)))
                        .unwrap(),
                    &embed,
                )
                .unwrap();
        });

        let data = caller
            .call("api/rest/actions", RequestOptions::get())
            .await
            .unwrap();
        assert_eq!(data, json!(true));
        executor.await.unwrap();
    }

    #[tokio::test]
    async fn test_spoofed_ready_from_untrusted_origin_is_ignored() {
        let embed = origin("https://app.example");
        let evil = origin("https://evil-host.example");
        let (caller_port, evil_port) = realm_pair(embed.clone(), evil);

        // The caller trusts host.example, but its peer realm is the
        // attacker: every delivery fails the origin gate.
        let config = CallerConfig::new(origin("https://host.example"))
            .with_handshake_delay(Duration::ZERO);
        let caller = Caller::new(caller_port, config);
        caller.start().await;

        evil_port
            .post(json!({"type": "CONNECTION_READY"}), &embed)
            .unwrap();

        // Give the pump a chance to (not) act on it.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(!caller.is_connected());
    }

    #[tokio::test]
    async fn test_call_resolves_with_matching_response() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;

        let executor = tokio::spawn(async move {
            let delivery = host_port.recv().await.unwrap();
            let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
            let Envelope::ApiRequest {
                request_id,
                endpoint,
                options,
            } = envelope
            else {
                panic!("expected API_REQUEST");
            };
            assert_eq!(endpoint, "api/rest/actions?page[size]=1");
            assert_eq!(options.method.as_deref(), Some("GET"));

            host_port
                .post(
                    serde_json::to_value(Envelope::api_response_ok(
                        request_id,
                        json!({"actions": []}),
                    ))
                    .unwrap(),
                    &embed,
                )
                .unwrap();
        });

        let data = caller
            .call("api/rest/actions?page[size]=1", RequestOptions::get())
            .await
            .unwrap();
        assert_eq!(data, json!({"actions": []}));
        executor.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_rejects_with_remote_error() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;

        let executor = tokio::spawn(async move {
            let delivery = host_port.recv().await.unwrap();
            let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
            let Envelope::ApiRequest { request_id, .. } = envelope else {
                panic!("expected API_REQUEST");
            };

            host_port
                .post(
                    serde_json::to_value(Envelope::api_response_err(
                        request_id,
                        "HTTP 404: Not Found",
                    ))
                    .unwrap(),
                    &embed,
                )
                .unwrap();
        });

        let result = caller.call("api/rest/missing", RequestOptions::get()).await;
        match result {
            Err(BridgeError::Remote(message)) => assert!(message.contains("404")),
            other => panic!("expected Remote error, got {:?}", other),
        }
        executor.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_executor_times_out_and_clears_pending() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;

        // The executor swallows the request and never replies.
        let result = caller.call("api/rest/actions", RequestOptions::get()).await;
        assert!(matches!(result, Err(BridgeError::Timeout(30_000))));
        assert!(caller.inner.pending.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_timeout_is_discarded() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;

        let result = caller.call("api/rest/actions", RequestOptions::get()).await;
        assert!(matches!(result, Err(BridgeError::Timeout(_))));

        // The request is still sitting in the host's inbox; answer it late.
        let delivery = host_port.recv().await.unwrap();
        let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
        let Envelope::ApiRequest { request_id, .. } = envelope else {
            panic!("expected API_REQUEST");
        };
        host_port
            .post(
                serde_json::to_value(Envelope::api_response_ok(request_id, json!(1))).unwrap(),
                &embed,
            )
            .unwrap();

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        // Nothing to settle, nothing pending: the late response was dropped.
        assert!(caller.inner.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_response_id_is_discarded() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;

        host_port
            .post(
                serde_json::to_value(Envelope::api_response_ok("req_never_issued".into(), json!(1)))
                    .unwrap(),
                &embed,
            )
            .unwrap();

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(caller.is_connected());
        assert!(caller.inner.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_calls_correlate_by_id() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;
        let caller = Arc::new(caller);

        // Answer both requests in reverse order, each with a payload that
        // names its own endpoint.
        let executor = tokio::spawn(async move {
            let mut received = Vec::new();
            for _ in 0..2 {
                let delivery = host_port.recv().await.unwrap();
                let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
                let Envelope::ApiRequest {
                    request_id,
                    endpoint,
                    ..
                } = envelope
                else {
                    panic!("expected API_REQUEST");
                };
                received.push((request_id, endpoint));
            }

            for (request_id, endpoint) in received.into_iter().rev() {
                host_port
                    .post(
                        serde_json::to_value(Envelope::api_response_ok(
                            request_id,
                            json!({"endpoint": endpoint}),
                        ))
                        .unwrap(),
                        &embed,
                    )
                    .unwrap();
            }
        });

        let first = tokio::spawn({
            let caller = Arc::clone(&caller);
            async move { caller.call("api/rest/actions", RequestOptions::get()).await }
        });
        let second = tokio::spawn({
            let caller = Arc::clone(&caller);
            async move {
                caller
                    .call("api/rest/participants", RequestOptions::get())
                    .await
            }
        });

        assert_eq!(
            first.await.unwrap().unwrap(),
            json!({"endpoint": "api/rest/actions"})
        );
        assert_eq!(
            second.await.unwrap().unwrap(),
            json!({"endpoint": "api/rest/participants"})
        );
        executor.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_fails_in_flight_calls_with_reset() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;
        let caller = Arc::new(caller);

        let in_flight = tokio::spawn({
            let caller = Arc::clone(&caller);
            async move { caller.call("api/rest/actions", RequestOptions::get()).await }
        });

        // Let the call register and post before tearing down.
        let _ = host_port.recv().await.unwrap();
        caller.stop().await;

        let result = in_flight.await.unwrap();
        assert!(matches!(result, Err(BridgeError::ConnectionReset)));
        assert!(!caller.is_connected());
    }

    #[tokio::test]
    async fn test_convenience_wrappers_build_expected_endpoints() {
        let (caller, host_port, embed) = bridge();
        handshake(&caller, &host_port, &embed).await;
        let caller = Arc::new(caller);

        let executor = tokio::spawn(async move {
            let mut endpoints = Vec::new();
            for _ in 0..3 {
                let delivery = host_port.recv().await.unwrap();
                let envelope: Envelope = serde_json::from_value(delivery.payload).unwrap();
                let Envelope::ApiRequest {
                    request_id,
                    endpoint,
                    ..
                } = envelope
                else {
                    panic!("expected API_REQUEST");
                };
                endpoints.push(endpoint);
                host_port
                    .post(
                        serde_json::to_value(Envelope::api_response_ok(request_id, json!({})))
                            .unwrap(),
                        &embed,
                    )
                    .unwrap();
            }
            endpoints
        });

        caller
            .matters(&[("page[size]", "10"), ("sort", "-id")])
            .await
            .unwrap();
        caller.contacts(&[]).await.unwrap();
        caller.matter_by_id("42").await.unwrap();

        let endpoints = executor.await.unwrap();
        assert_eq!(
            endpoints,
            vec![
                "api/rest/actions?page[size]=10&sort=-id",
                "api/rest/participants",
                "api/rest/actions/42",
            ]
        );
    }
}
