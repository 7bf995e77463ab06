//! Connection lifecycle state

use std::fmt;

/// Where the link to the bridge currently stands
///
/// ```text
/// Disconnected -> Connecting -> ServiceDiscovery -> Ready
///       ^______________|_______________|____________|   (any disconnect/error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link
    #[default]
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Link up, characteristics not yet resolved
    ServiceDiscovery,
    /// Required characteristics resolved; sends are accepted
    Ready,
}

impl ConnectionState {
    /// Sends are only accepted in this state
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::ServiceDiscovery => "service-discovery",
            ConnectionState::Ready => "ready",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_only_ready_is_ready() {
        assert!(ConnectionState::Ready.is_ready());
        assert!(!ConnectionState::Disconnected.is_ready());
        assert!(!ConnectionState::Connecting.is_ready());
        assert!(!ConnectionState::ServiceDiscovery.is_ready());
    }
}
