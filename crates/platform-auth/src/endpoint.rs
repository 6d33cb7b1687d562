//! Platform endpoint normalization

use url::Url;

use crate::error::{Error, Result};

/// Normalize a platform endpoint to `scheme://host:port[/path][?query]`.
///
/// Only `http` and `https` are accepted. A missing port becomes the
/// scheme default (80 or 443) and trailing slashes are trimmed from the
/// path. Normalizing an already normalized endpoint returns it unchanged.
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(Error::InvalidEndpoint("endpoint is required".into()));
    }

    let url =
        Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidEndpoint(format!(
                "{endpoint}: unsupported scheme {other:?}, expected http or https"
            )));
        }
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidEndpoint(format!("{endpoint}: missing host")))?;
    // `Url` hides default ports, so the port is spelled out by hand.
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::InvalidEndpoint(format!("{endpoint}: missing port")))?;

    let mut normalized = format!(
        "{}://{host}:{port}{}",
        url.scheme(),
        url.path().trim_end_matches('/')
    );
    if let Some(query) = url.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_default_ports() {
        assert_eq!(normalize_endpoint("http://host").unwrap(), "http://host:80");
        assert_eq!(normalize_endpoint("https://host").unwrap(), "https://host:443");
    }

    #[test]
    fn keeps_explicit_ports() {
        assert_eq!(
            normalize_endpoint("http://localhost:8080").unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com:443/").unwrap(),
            "https://api.example.com:443"
        );
    }

    #[test]
    fn trims_trailing_slashes() {
        assert_eq!(
            normalize_endpoint("https://api.example.com/platform///").unwrap(),
            "https://api.example.com:443/platform"
        );
    }

    #[test]
    fn is_idempotent() {
        for input in [
            "http://host",
            "https://api.example.com/",
            "https://api.example.com:8443/base/",
            "http://[::1]:9999",
            "https://h/p?x=1",
        ] {
            let once = normalize_endpoint(input).unwrap();
            let twice = normalize_endpoint(&once).unwrap();
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn rejects_empty_and_bad_schemes() {
        assert!(normalize_endpoint("").is_err());
        assert!(normalize_endpoint("   ").is_err());
        assert!(normalize_endpoint("ftp://host").is_err());
        assert!(normalize_endpoint("grpc://host:443").is_err());
        assert!(normalize_endpoint("not a url").is_err());
    }

    #[test]
    fn rejects_missing_scheme() {
        let err = normalize_endpoint("api.example.com").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)));
    }
}
