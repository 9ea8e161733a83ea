use std::fmt;
use std::str::FromStr;

use crate::protocol::error::{BridgeError, Result};

/// The scheme+host+port identity of a document realm.
///
/// Origins are the sole authentication factor in the bridge: both peers
/// compare the transport-stamped sender origin of every inbound message
/// against a single configured trusted value. The comparison is exact -
/// `https://evil-actionstep.com` never matches `https://actionstep.com`,
/// and neither does any other host merely *containing* the trusted domain.
///
/// Default ports are normalized at parse time, so `https://a.example` and
/// `https://a.example:443` compare equal.
///
/// # Example
///
/// ```
/// use postbridge_common::Origin;
///
/// let trusted: Origin = "https://ap-southeast-2.actionstep.com".parse().unwrap();
/// let spoofed: Origin = "https://evil-actionstep.com".parse().unwrap();
/// assert_ne!(trusted, spoofed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    /// Parses `scheme://host[:port]`.
    ///
    /// Only `http` and `https` schemes are accepted (documents have no other
    /// origin schemes this bridge trusts); a missing port defaults to the
    /// scheme's well-known port. Scheme and host are lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidOrigin`] when the string is not a bare
    /// origin (wrong scheme, empty host, a path suffix, or a bad port).
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || BridgeError::InvalidOrigin(input.to_string());

        let (scheme, rest) = input.split_once("://").ok_or_else(invalid)?;
        let scheme = scheme.to_ascii_lowercase();
        let default_port = match scheme.as_str() {
            "http" => 80,
            "https" => 443,
            _ => return Err(invalid()),
        };

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                let port: u16 = port.parse().map_err(|_| invalid())?;
                (host, port)
            }
            None => (rest, default_port),
        };

        if host.is_empty()
            || host.contains(['/', '?', '#', '@', ':'])
            || host.chars().any(char::is_whitespace)
        {
            return Err(invalid());
        }

        Ok(Origin {
            scheme,
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn is_default_port(&self) -> bool {
        matches!(
            (self.scheme.as_str(), self.port),
            ("http", 80) | ("https", 443)
        )
    }
}

impl FromStr for Origin {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Origin::parse(s)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_port() {
            write!(f, "{}://{}", self.scheme, self.host)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}
