use ahash::AHashMap as HashMap;
use std::net::IpAddr;

/// Describes a single request, as reported by the proxy that received it.
///
/// Optional fields that are unset are evaluated as empty strings, so they
/// never satisfy a presence (`*`) match.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// The peer's authenticated identity, e.g. `cluster.local/ns/default/sa/sleep`.
    pub principal: Option<String>,

    /// The request's authenticated principal, e.g. `<iss>/<sub>` from a JWT.
    pub request_principal: Option<String>,

    /// The peer's namespace.
    pub namespace: Option<String>,

    pub source_ip: Option<IpAddr>,

    /// The original client address, e.g. from `X-Forwarded-For`.
    pub remote_ip: Option<IpAddr>,

    pub destination_ip: Option<IpAddr>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub sni: Option<String>,
    pub audiences: Vec<String>,
    pub presenter: Option<String>,

    /// Request headers keyed by lowercase name.
    pub headers: HashMap<String, Vec<String>>,

    /// Additional request attributes keyed by condition key, e.g.
    /// `request.auth.claims[iss]`.
    pub attributes: HashMap<String, Vec<String>>,
}

/// Identifies which request attribute a condition inspects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    SourceIp,
    RemoteIp,
    DestinationIp,
    SourceNamespace,
    SourcePrincipal,
    RequestPrincipal,
    DestinationPort,
    ConnectionSni,
    Audiences,
    Presenter,
    Header(String),
    Other(String),
}

// === impl RequestContext ===

impl RequestContext {
    /// Returns the `namespace/name` service account encoded in the peer
    /// principal, if the principal has the form `<td>/ns/<ns>/sa/<name>`.
    pub fn service_account(&self) -> Option<String> {
        let principal = self.principal.as_deref()?;
        let principal = principal.strip_prefix("spiffe://").unwrap_or(principal);
        let mut parts = principal.split('/');
        let _trust_domain = parts.next()?;
        match (parts.next()?, parts.next()?, parts.next()?, parts.next()?) {
            ("ns", ns, "sa", sa) if parts.next().is_none() => Some(format!("{ns}/{sa}")),
            _ => None,
        }
    }

    /// Returns the request path without its query string or fragment.
    pub fn path_only(&self) -> Option<&str> {
        let path = self.path.as_deref()?;
        path.split(['?', '#']).next()
    }

    pub fn address(&self, key: &AttributeKey) -> Option<IpAddr> {
        match key {
            AttributeKey::SourceIp => self.source_ip,
            AttributeKey::RemoteIp => self.remote_ip,
            AttributeKey::DestinationIp => self.destination_ip,
            _ => None,
        }
    }

    /// Returns every value of a string-valued attribute. An absent attribute
    /// yields no values.
    pub fn values(&self, key: &AttributeKey) -> Vec<String> {
        fn one(v: &Option<String>) -> Vec<String> {
            v.iter().cloned().collect()
        }

        match key {
            AttributeKey::SourceNamespace => one(&self.namespace),
            AttributeKey::SourcePrincipal => one(&self.principal),
            AttributeKey::RequestPrincipal => one(&self.request_principal),
            AttributeKey::DestinationPort => self.port.iter().map(u16::to_string).collect(),
            AttributeKey::ConnectionSni => one(&self.sni),
            AttributeKey::Audiences => self.audiences.clone(),
            AttributeKey::Presenter => one(&self.presenter),
            AttributeKey::Header(name) => self.headers.get(name).cloned().unwrap_or_default(),
            AttributeKey::Other(key) => self.attributes.get(key).cloned().unwrap_or_default(),
            AttributeKey::SourceIp | AttributeKey::RemoteIp | AttributeKey::DestinationIp => self
                .address(key)
                .iter()
                .map(IpAddr::to_string)
                .collect(),
        }
    }
}

// === impl AttributeKey ===

impl AttributeKey {
    pub fn parse(key: &str) -> Self {
        match key {
            "source.ip" => Self::SourceIp,
            "remote.ip" => Self::RemoteIp,
            "destination.ip" => Self::DestinationIp,
            "source.namespace" => Self::SourceNamespace,
            "source.principal" => Self::SourcePrincipal,
            "request.auth.principal" => Self::RequestPrincipal,
            "destination.port" => Self::DestinationPort,
            "connection.sni" => Self::ConnectionSni,
            "request.auth.audiences" => Self::Audiences,
            "request.auth.presenter" => Self::Presenter,
            key => match key
                .strip_prefix("request.headers[")
                .and_then(|k| k.strip_suffix(']'))
            {
                Some(name) => Self::Header(name.to_ascii_lowercase()),
                None => Self::Other(key.to_string()),
            },
        }
    }

    /// Returns true if the attribute holds an IP address and is matched
    /// against CIDR blocks.
    pub fn is_address(&self) -> bool {
        matches!(self, Self::SourceIp | Self::RemoteIp | Self::DestinationIp)
    }
}
