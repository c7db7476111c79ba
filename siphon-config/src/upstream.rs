use std::fmt;
use std::str::FromStr;

use url::Url;

/// The connection scheme of an upstream.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Returns the port used when none is given explicitly.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// Raised if a URL cannot be parsed into an upstream descriptor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum UpstreamParseError {
    /// Raised if an upstream could not be parsed as URL.
    #[error("invalid upstream URL: bad URL format")]
    BadUrl,
    /// Raised if a path was added to a URL.
    #[error("invalid upstream URL: non root URL given")]
    NonOriginUrl,
    /// Raised if an unknown or unsupported scheme is encountered.
    #[error("invalid upstream URL: unknown or unsupported URL scheme")]
    UnknownScheme,
    /// Raised if no host was provided.
    #[error("invalid upstream URL: no host")]
    NoHost,
}

/// The metrics API endpoint measurements are submitted to.
///
/// Only origins are accepted, paths are appended with [`get_url`](Self::get_url).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UpstreamDescriptor {
    host: String,
    port: u16,
    scheme: Scheme,
}

impl UpstreamDescriptor {
    /// Manually constructs an upstream descriptor.
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Returns the host as a string.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the upstream port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the upstream's connection scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns a URL relative to the upstream.
    pub fn get_url(&self, path: &str) -> Result<Url, url::ParseError> {
        format!("{}{}", self, path.trim_start_matches('/')).parse()
    }
}

impl Default for UpstreamDescriptor {
    fn default() -> Self {
        Self::new("metrics-api.librato.com", 443, Scheme::Https)
    }
}

impl fmt::Display for UpstreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if self.port != self.scheme.default_port() {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "/")
    }
}

impl FromStr for UpstreamDescriptor {
    type Err = UpstreamParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|_| UpstreamParseError::BadUrl)?;
        if url.path() != "/" || !matches!(url.query(), None | Some("")) {
            return Err(UpstreamParseError::NonOriginUrl);
        }

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(UpstreamParseError::UnknownScheme),
        };

        let host = url.host_str().ok_or(UpstreamParseError::NoHost)?;
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self::new(host, port, scheme))
    }
}

siphon_common::impl_str_serde!(UpstreamDescriptor, "a metrics API origin URL");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_api() {
        let descriptor: UpstreamDescriptor = "https://metrics-api.librato.com/".parse().unwrap();
        assert_eq!(descriptor, UpstreamDescriptor::default());
        assert_eq!(descriptor.port(), 443);
    }

    #[test]
    fn test_parse_plain_http_with_port() {
        let descriptor: UpstreamDescriptor = "http://127.0.0.1:8080".parse().unwrap();
        assert_eq!(descriptor.scheme(), Scheme::Http);
        assert_eq!(descriptor.host(), "127.0.0.1");
        assert_eq!(descriptor.port(), 8080);
        assert_eq!(descriptor.to_string(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "not a url".parse::<UpstreamDescriptor>(),
            Err(UpstreamParseError::BadUrl)
        );
        assert_eq!(
            "https://example.com/v1".parse::<UpstreamDescriptor>(),
            Err(UpstreamParseError::NonOriginUrl)
        );
        assert_eq!(
            "ftp://example.com/".parse::<UpstreamDescriptor>(),
            Err(UpstreamParseError::UnknownScheme)
        );
    }

    #[test]
    fn test_get_url() {
        let descriptor = UpstreamDescriptor::new("localhost", 3000, Scheme::Http);
        let url = descriptor.get_url("/v1/metrics").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/v1/metrics");
    }

    #[test]
    fn test_serde() {
        let descriptor: UpstreamDescriptor =
            serde_json::from_str(r#""http://localhost:3000/""#).unwrap();
        assert_eq!(
            serde_json::to_string(&descriptor).unwrap(),
            r#""http://localhost:3000/""#
        );
    }
}
