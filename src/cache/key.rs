use {
    http::{header::*, uri::*, *},
    std::fmt,
};

//
// RequestCacheKey
//

/// User key for an HTTP request.
///
/// Query parameters are sorted, so requests that differ only in parameter order share a key. They
/// are kept raw (not percent-decoded).
///
/// Use its [Display](fmt::Display) form as the key for [CacheBase](super::CacheBase).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RequestCacheKey {
    /// Method.
    pub method: Method,

    /// Optional scheme.
    pub scheme: Option<Scheme>,

    /// Optional host.
    pub host: Option<String>,

    /// Optional port.
    pub port: Option<u16>,

    /// Path.
    pub path: String,

    /// Query parameters (sorted).
    pub query: Vec<(String, String)>,
}

impl RequestCacheKey {
    /// Constructor.
    ///
    /// When the URI has no authority the host and port are taken from the `Host` header.
    pub fn for_request(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let authority = uri.authority().cloned().or_else(|| {
            headers
                .get(HOST)
                .and_then(|host| Authority::try_from(host.as_bytes()).ok())
        });

        let host = authority.as_ref().map(|authority| authority.host().to_ascii_lowercase());
        let port = authority.as_ref().and_then(Authority::port_u16);

        let mut query: Vec<_> = uri
            .query()
            .map(|query| {
                query
                    .split('&')
                    .filter(|parameter| !parameter.is_empty())
                    .map(|parameter| match parameter.split_once('=') {
                        Some((name, value)) => (name.into(), value.into()),
                        None => (parameter.into(), String::default()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        query.sort();

        Self {
            method: method.clone(),
            scheme: uri.scheme().cloned(),
            host,
            port,
            path: uri.path().into(),
            query,
        }
    }
}

impl fmt::Display for RequestCacheKey {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let scheme = self
            .scheme
            .as_ref()
            .map(|scheme| scheme.as_str())
            .unwrap_or_default();
        let host = self.host.as_deref().unwrap_or_default();
        let port = self.port.map(|port| port.to_string()).unwrap_or_default();

        let query: Vec<_> = self
            .query
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();

        write!(
            formatter,
            "{}|{}|{}|{}|{}|{}",
            self.method,
            scheme,
            host,
            port,
            self.path,
            query.join("&")
        )
    }
}

//
// CacheKeyForRequest
//

/// [RequestCacheKey] for [Request].
pub trait CacheKeyForRequest {
    /// Create a cache key.
    fn cache_key(&self) -> RequestCacheKey;
}

impl<RequestBodyT> CacheKeyForRequest for Request<RequestBodyT> {
    fn cache_key(&self) -> RequestCacheKey {
        RequestCacheKey::for_request(self.method(), self.uri(), self.headers())
    }
}
