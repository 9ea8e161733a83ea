//! Postbridge Transport Layer
//!
//! This module provides the cross-realm transport both peers are built on.
//!
//! # Architecture
//!
//! Two realms never share memory; they exchange discrete JSON payloads over
//! a pair of connected [`RealmPort`]s. The transport gives receivers the one
//! piece of metadata the protocol's security model relies on: the sender's
//! true [`Origin`], stamped by the transport itself and never forgeable by
//! the sending code.
//!
//! Sending is addressed: every [`post`](RealmPort::post) names an explicit
//! target origin, and the message is silently dropped unless that target is
//! the receiving realm's actual origin. Receipt is buffered and in-order, so
//! a peer that has not started pumping yet loses nothing.
//!
//! # Components
//!
//! - **[`Origin`]**: scheme+host+port identity with exact equality
//! - **[`RealmPort`]** / **[`realm_pair`]**: connected message ports
//! - **[`Delivery`]**: one received payload plus its sender's origin

pub mod channel;
pub mod origin;

pub use channel::{realm_pair, Delivery, RealmPort};
pub use origin::Origin;
