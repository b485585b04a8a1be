use thiserror::Error;
use url::Url;

/// Why a client-supplied target was refused before dialing.
#[derive(Debug, Error)]
pub enum TargetRejection {
    #[error("missing ?target=ws://... query parameter")]
    Missing,
    #[error("malformed target URI: {0}")]
    Malformed(url::ParseError),
    #[error("unsupported target scheme '{scheme}' (expected ws or wss)")]
    UnsupportedScheme { scheme: String },
    #[error("target host '{host}' is not allowed by the relay policy")]
    HostNotAllowed { host: String },
}

impl TargetRejection {
    /// WebSocket close code sent to the client alongside the diagnostic
    /// message. 4000 marks a missing target, 4001 a rejected one.
    pub fn close_code(&self) -> u16 {
        match self {
            TargetRejection::Missing => 4000,
            _ => 4001,
        }
    }
}

/// Policy deciding which target hosts the relay may dial on a client's
/// behalf.
///
/// An empty pattern list admits every target, which matches the historical
/// behavior of the relay. Deployments that only ever bridge to a known
/// Home Assistant instance should list its host here.
#[derive(Debug, Clone, Default)]
pub struct TargetPolicy {
    allowed_hosts: Vec<String>,
}

impl TargetPolicy {
    /// A policy that admits any target host.
    pub fn allow_any() -> Self {
        Self::default()
    }

    /// A policy that only admits hosts matching one of the given patterns.
    /// Each pattern may contain `*` as a wildcard that matches any sequence
    /// of characters.
    pub fn allow_hosts(patterns: Vec<String>) -> Self {
        Self {
            allowed_hosts: patterns,
        }
    }

    fn host_allowed(&self, host: &str) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        self.allowed_hosts
            .iter()
            .any(|pattern| glob_match(pattern, host))
    }
}

/// Extracts the `target` query parameter from a raw query string, decoding
/// percent-escapes. Returns `None` if the parameter is absent.
pub fn target_param(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "target")
        .map(|(_, value)| value.into_owned())
}

/// Validates a client-supplied target URI against the policy.
///
/// - `None` or an empty string is a [`TargetRejection::Missing`].
/// - The URI must parse and carry a `ws` or `wss` scheme with a host.
/// - The host must be admitted by the policy's allowlist.
pub fn resolve_target(
    raw: Option<&str>,
    policy: &TargetPolicy,
) -> Result<Url, TargetRejection> {
    let raw = match raw {
        None => return Err(TargetRejection::Missing),
        Some(r) if r.is_empty() => return Err(TargetRejection::Missing),
        Some(r) => r,
    };

    let url = Url::parse(raw).map_err(TargetRejection::Malformed)?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(TargetRejection::UnsupportedScheme {
                scheme: other.to_string(),
            });
        }
    }

    let host = url
        .host_str()
        .ok_or(TargetRejection::Malformed(url::ParseError::EmptyHost))?;

    if !policy.host_allowed(host) {
        return Err(TargetRejection::HostNotAllowed {
            host: host.to_string(),
        });
    }

    Ok(url)
}

/// Performs simple glob matching where `*` matches any sequence of
/// characters.
///
/// Only the `*` wildcard is supported (no `?`, no `[...]` ranges). Multiple
/// `*` characters are allowed.
fn glob_match(pattern: &str, value: &str) -> bool {
    // Split the pattern by '*' and verify that the value contains each
    // segment in order.
    let segments: Vec<&str> = pattern.split('*').collect();

    if segments.len() == 1 {
        // No wildcard -- exact match.
        return pattern == value;
    }

    let mut remaining = value;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }

        if i == 0 {
            // First segment must be a prefix.
            if let Some(rest) = remaining.strip_prefix(segment) {
                remaining = rest;
            } else {
                return false;
            }
        } else if i == segments.len() - 1 {
            // Last segment must be a suffix.
            if !remaining.ends_with(segment) {
                return false;
            }
            remaining = "";
        } else {
            // Middle segments: find the first occurrence.
            if let Some(pos) = remaining.find(segment) {
                remaining = &remaining[pos + segment.len()..];
            } else {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // target_param
    // -----------------------------------------------------------------------

    #[test]
    fn param_absent() {
        assert_eq!(target_param(None), None);
        assert_eq!(target_param(Some("other=1")), None);
    }

    #[test]
    fn param_plain() {
        assert_eq!(
            target_param(Some("target=ws://192.168.1.10:8123/api/websocket")),
            Some("ws://192.168.1.10:8123/api/websocket".to_string())
        );
    }

    #[test]
    fn param_percent_encoded() {
        assert_eq!(
            target_param(Some("target=ws%3A%2F%2Fha.local%3A8123%2Fapi%2Fwebsocket")),
            Some("ws://ha.local:8123/api/websocket".to_string())
        );
    }

    #[test]
    fn param_among_others() {
        assert_eq!(
            target_param(Some("a=1&target=ws://h/x&b=2")),
            Some("ws://h/x".to_string())
        );
    }

    // -----------------------------------------------------------------------
    // resolve_target
    // -----------------------------------------------------------------------

    #[test]
    fn missing_target_is_rejected() {
        let policy = TargetPolicy::allow_any();
        assert!(matches!(
            resolve_target(None, &policy),
            Err(TargetRejection::Missing)
        ));
        assert!(matches!(
            resolve_target(Some(""), &policy),
            Err(TargetRejection::Missing)
        ));
    }

    #[test]
    fn malformed_target_is_rejected() {
        let policy = TargetPolicy::allow_any();
        assert!(matches!(
            resolve_target(Some("not a uri"), &policy),
            Err(TargetRejection::Malformed(_))
        ));
    }

    #[test]
    fn non_websocket_scheme_is_rejected() {
        let policy = TargetPolicy::allow_any();
        match resolve_target(Some("http://ha.local:8123/"), &policy) {
            Err(TargetRejection::UnsupportedScheme { scheme }) => {
                assert_eq!(scheme, "http");
            }
            other => panic!("expected UnsupportedScheme, got {:?}", other),
        }
    }

    #[test]
    fn ws_and_wss_are_accepted() {
        let policy = TargetPolicy::allow_any();
        assert!(resolve_target(Some("ws://ha.local:8123/api/websocket"), &policy).is_ok());
        assert!(resolve_target(Some("wss://ha.example.com/api/websocket"), &policy).is_ok());
    }

    #[test]
    fn empty_allowlist_admits_any_host() {
        let policy = TargetPolicy::allow_any();
        assert!(resolve_target(Some("ws://anything.example.org/"), &policy).is_ok());
    }

    #[test]
    fn allowlisted_host_is_admitted() {
        let policy = TargetPolicy::allow_hosts(vec!["ha.local".to_string()]);
        assert!(resolve_target(Some("ws://ha.local:8123/api/websocket"), &policy).is_ok());
    }

    #[test]
    fn unlisted_host_is_rejected() {
        let policy = TargetPolicy::allow_hosts(vec!["ha.local".to_string()]);
        match resolve_target(Some("ws://evil.example.com/"), &policy) {
            Err(TargetRejection::HostNotAllowed { host }) => {
                assert_eq!(host, "evil.example.com");
            }
            other => panic!("expected HostNotAllowed, got {:?}", other),
        }
    }

    #[test]
    fn wildcard_patterns_match_subdomains() {
        let policy = TargetPolicy::allow_hosts(vec!["*.example.com".to_string()]);
        assert!(resolve_target(Some("ws://ha.example.com/"), &policy).is_ok());
        assert!(resolve_target(Some("ws://other.example.com/"), &policy).is_ok());
        assert!(resolve_target(Some("ws://example.org/"), &policy).is_err());
    }

    #[test]
    fn close_codes_distinguish_missing_from_rejected() {
        assert_eq!(TargetRejection::Missing.close_code(), 4000);
        assert_eq!(
            TargetRejection::UnsupportedScheme {
                scheme: "http".to_string()
            }
            .close_code(),
            4001
        );
        assert_eq!(
            TargetRejection::HostNotAllowed {
                host: "h".to_string()
            }
            .close_code(),
            4001
        );
    }

    // -----------------------------------------------------------------------
    // glob_match
    // -----------------------------------------------------------------------

    #[test]
    fn glob_exact() {
        assert!(glob_match("ha.local", "ha.local"));
        assert!(!glob_match("ha.local", "ha.locals"));
        assert!(!glob_match("ha.local", "ha.loca"));
    }

    #[test]
    fn glob_star_positions() {
        assert!(glob_match("192.168.*", "192.168.1.10"));
        assert!(glob_match("*.local", "ha.local"));
        assert!(glob_match("ha*com", "ha.example.com"));
        assert!(!glob_match("*.local", "ha.lan"));
    }

    #[test]
    fn glob_only_star() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("*", ""));
    }
}
