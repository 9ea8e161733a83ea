use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::protocol::error::{BridgeError, Result};
use crate::transport::origin::Origin;

/// One received message: the payload plus the sender's true origin.
///
/// The `sender` field is stamped by the transport when the message is
/// posted; sending code cannot forge it. It is the value receivers compare
/// against their configured trusted origin before acting on the payload.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub sender: Origin,
    pub payload: Value,
}

/// One end of a connected realm pair.
///
/// A port both sends to and receives from exactly one peer realm. Sends are
/// addressed: the message is delivered only when the named target origin is
/// the peer's actual origin, otherwise it is dropped without notice to the
/// sender. Received messages are buffered unbounded and handed out in send
/// order, so messages posted before the receiver starts pumping are kept.
///
/// # Example
///
/// ```
/// use postbridge_common::{realm_pair, Origin};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let host: Origin = "https://host.example".parse().unwrap();
/// let embed: Origin = "https://embed.example".parse().unwrap();
/// let (host_port, embed_port) = realm_pair(host.clone(), embed.clone());
///
/// host_port.post(json!({"hello": true}), &embed).unwrap();
///
/// let delivery = embed_port.recv().await.unwrap();
/// assert_eq!(delivery.sender, host);
/// # }
/// ```
pub struct RealmPort {
    origin: Origin,
    peer_origin: Origin,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<mpsc::UnboundedReceiver<Delivery>>,
}

/// Creates two connected ports, one per realm.
///
/// The first returned port belongs to the realm with origin `a`, the second
/// to the realm with origin `b`.
pub fn realm_pair(a: Origin, b: Origin) -> (RealmPort, RealmPort) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    (
        RealmPort {
            origin: a.clone(),
            peer_origin: b.clone(),
            tx: a_tx,
            rx: Mutex::new(a_rx),
        },
        RealmPort {
            origin: b,
            peer_origin: a,
            tx: b_tx,
            rx: Mutex::new(b_rx),
        },
    )
}

impl RealmPort {
    /// The origin of the realm this port belongs to.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Posts a payload addressed to `target`.
    ///
    /// If `target` is not the peer realm's actual origin the message is
    /// dropped silently (logged at debug) and `Ok(())` is returned; the
    /// sender is never told whether an addressed message was delivered.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the peer realm is gone.
    pub fn post(&self, payload: Value, target: &Origin) -> Result<()> {
        if target != &self.peer_origin {
            debug!(
                target_origin = %target,
                receiver = %self.peer_origin,
                "message dropped: target origin does not match the receiving realm"
            );
            return Ok(());
        }

        self.tx
            .send(Delivery {
                sender: self.origin.clone(),
                payload,
            })
            .map_err(|_| BridgeError::Transport("peer realm is gone".to_string()))
    }

    /// Awaits the next delivery; `None` means the peer realm is gone and no
    /// buffered messages remain.
    pub async fn recv(&self) -> Option<Delivery> {
        self.rx.lock().await.recv().await
    }
}
