//! Transit network (authority) identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid network identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid network id: {reason}")]
pub struct InvalidNetworkId {
    reason: &'static str,
}

/// Identifier of one independent transit data source.
///
/// Network ids are opaque namespaces such as `ca.mtl.stm.bus` or
/// `ca.mtl.bixi`. They must be non-empty and must not contain whitespace,
/// since they are embedded in POI identities and cache keys.
///
/// # Examples
///
/// ```
/// use nearby_server::domain::NetworkId;
///
/// let id = NetworkId::new("ca.mtl.stm.bus").unwrap();
/// assert_eq!(id.as_str(), "ca.mtl.stm.bus");
///
/// assert!(NetworkId::new("").is_err());
/// assert!(NetworkId::new("two words").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkId(String);

impl NetworkId {
    /// Create a network id from a string.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidNetworkId> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidNetworkId {
                reason: "network id cannot be empty",
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(InvalidNetworkId {
                reason: "network id cannot contain whitespace",
            });
        }
        Ok(NetworkId(s))
    }

    /// Returns the network id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NetworkId {
    type Error = InvalidNetworkId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        NetworkId::new(s)
    }
}

impl From<NetworkId> for String {
    fn from(id: NetworkId) -> Self {
        id.0
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({})", self.0)
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
