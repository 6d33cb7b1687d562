//! Platform configuration discovery
//!
//! The platform publishes its identity provider settings at
//! `{endpoint}/.well-known/opentdf-configuration`:
//!
//! ```json
//! {
//!   "configuration": {
//!     "platform_issuer": "https://idp.example.com/realms/platform",
//!     "idp": {
//!       "issuer": "...",
//!       "authorization_endpoint": "...",
//!       "token_endpoint": "...",
//!       "public_client_id": "...",
//!       "revocation_endpoint": "..."
//!     }
//!   }
//! }
//! ```
//!
//! Every field is optional on read. Callers ask for the fields they need
//! through [`PlatformConfiguration::require`], which reports all missing
//! fields at once.

use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::WELL_KNOWN_PATH;
use crate::error::{Error, Result};
use crate::http::transport_error;

/// A discoverable configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Issuer,
    AuthorizationEndpoint,
    TokenEndpoint,
    PublicClientId,
    RevocationEndpoint,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Issuer => "issuer",
            Field::AuthorizationEndpoint => "authorization_endpoint",
            Field::TokenEndpoint => "token_endpoint",
            Field::PublicClientId => "public_client_id",
            Field::RevocationEndpoint => "revocation_endpoint",
        }
    }
}

/// Identity provider settings resolved from a platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformConfiguration {
    pub issuer: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub public_client_id: Option<String>,
    pub revocation_endpoint: Option<String>,
}

impl PlatformConfiguration {
    /// Extract the known fields from a discovery document. Empty strings
    /// count as missing.
    pub fn from_document(doc: &Value) -> Self {
        let text = |pointer: &str| {
            doc.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Self {
            issuer: text("/configuration/platform_issuer")
                .or_else(|| text("/configuration/idp/issuer")),
            authorization_endpoint: text("/configuration/idp/authorization_endpoint"),
            token_endpoint: text("/configuration/idp/token_endpoint"),
            public_client_id: text("/configuration/idp/public_client_id"),
            revocation_endpoint: text("/configuration/idp/revocation_endpoint"),
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Issuer => self.issuer.as_deref(),
            Field::AuthorizationEndpoint => self.authorization_endpoint.as_deref(),
            Field::TokenEndpoint => self.token_endpoint.as_deref(),
            Field::PublicClientId => self.public_client_id.as_deref(),
            Field::RevocationEndpoint => self.revocation_endpoint.as_deref(),
        }
    }

    /// Check that every field in `fields` resolved.
    ///
    /// Fails with one [`Error::PlatformConfig`] naming all missing fields
    /// rather than stopping at the first.
    pub fn require(&self, fields: &[Field]) -> Result<()> {
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| self.get(**f).is_none())
            .map(|f| f.name().to_owned())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::PlatformConfig { missing })
        }
    }

    /// A single required field.
    pub fn field(&self, field: Field) -> Result<&str> {
        self.get(field).ok_or_else(|| Error::PlatformConfig {
            missing: vec![field.name().to_owned()],
        })
    }
}

/// Fetch the discovery document for a normalized platform endpoint.
///
/// Connection failures are [`Error::PlatformUnreachable`]. A platform that
/// answers but has no usable document yields an empty configuration, so
/// the later [`PlatformConfiguration::require`] names what is missing.
pub async fn discover(client: &reqwest::Client, endpoint: &str) -> Result<PlatformConfiguration> {
    let url = format!("{}{WELL_KNOWN_PATH}", endpoint.trim_end_matches('/'));
    debug!(url, "fetching platform configuration");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| transport_error("fetching platform configuration", e))?;

    let status = response.status();
    if !status.is_success() {
        warn!(url, %status, "platform configuration endpoint returned an error");
        return Ok(PlatformConfiguration::default());
    }

    let document = match response.json::<Value>().await {
        Ok(doc) => doc,
        Err(e) => {
            warn!(url, error = %e, "platform configuration is not valid JSON");
            return Ok(PlatformConfiguration::default());
        }
    };
    Ok(PlatformConfiguration::from_document(&document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn full_document() -> Value {
        json!({
            "configuration": {
                "platform_issuer": "https://idp.example.com/realms/platform",
                "idp": {
                    "issuer": "https://idp.example.com/realms/other",
                    "authorization_endpoint": "https://idp.example.com/auth",
                    "token_endpoint": "https://idp.example.com/token",
                    "public_client_id": "platform-cli",
                    "revocation_endpoint": "https://idp.example.com/revoke"
                }
            }
        })
    }

    #[test]
    fn extracts_all_fields() {
        let config = PlatformConfiguration::from_document(&full_document());
        assert_eq!(
            config.issuer.as_deref(),
            Some("https://idp.example.com/realms/platform")
        );
        assert_eq!(config.token_endpoint.as_deref(), Some("https://idp.example.com/token"));
        assert_eq!(config.public_client_id.as_deref(), Some("platform-cli"));
        assert!(
            config
                .require(&[
                    Field::Issuer,
                    Field::AuthorizationEndpoint,
                    Field::TokenEndpoint,
                    Field::PublicClientId,
                    Field::RevocationEndpoint,
                ])
                .is_ok()
        );
    }

    #[test]
    fn issuer_falls_back_to_idp_issuer() {
        let doc = json!({"configuration": {"idp": {"issuer": "https://fallback"}}});
        let config = PlatformConfiguration::from_document(&doc);
        assert_eq!(config.issuer.as_deref(), Some("https://fallback"));
    }

    #[test]
    fn require_reports_every_missing_field() {
        let doc = json!({
            "configuration": {"idp": {"token_endpoint": "https://t", "public_client_id": ""}}
        });
        let config = PlatformConfiguration::from_document(&doc);

        let err = config
            .require(&[
                Field::Issuer,
                Field::AuthorizationEndpoint,
                Field::TokenEndpoint,
                Field::PublicClientId,
            ])
            .unwrap_err();
        match err {
            Error::PlatformConfig { missing } => {
                assert_eq!(
                    missing,
                    vec!["issuer", "authorization_endpoint", "public_client_id"]
                );
            }
            other => panic!("expected PlatformConfig, got {other}"),
        }
    }

    #[tokio::test]
    async fn discover_reads_well_known_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/opentdf-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_document()))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = discover(&client, &server.uri()).await.unwrap();
        assert_eq!(config.authorization_endpoint.as_deref(), Some("https://idp.example.com/auth"));
    }

    #[tokio::test]
    async fn discover_missing_document_is_incomplete_not_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = discover(&client, &server.uri()).await.unwrap();
        let err = config.require(&[Field::TokenEndpoint]).unwrap_err();
        assert!(matches!(err, Error::PlatformConfig { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn discover_unreachable_platform() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = reqwest::Client::new();
        let err = discover(&client, &format!("http://127.0.0.1:{port}"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PlatformUnreachable(_)), "got: {err}");
    }
}
