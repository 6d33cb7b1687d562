//! Credential validation and token exchange for a profile
//!
//! The functions here are the only path from stored credentials to
//! something a downstream client can authenticate with.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::Secret;
use platform_auth::{PlatformClient, Token};
use tracing::debug;

use crate::credentials::AuthCredentials;
use crate::error::{Error, Result};
use crate::profile::ProfileStore;

/// How a downstream client should authenticate.
#[derive(Debug, Clone)]
pub enum AuthOption {
    /// Run the client-credentials grant with this pair.
    ClientCredentials {
        client_id: String,
        client_secret: Secret<String>,
    },
    /// Present this bearer token as is.
    AccessToken(Token),
}

/// Check that the profile's credentials can be used.
///
/// Client credentials are proven with a live grant. A stored access token
/// is only checked locally: non-empty and not yet expired.
pub async fn validate_profile_auth_credentials(
    profile: &ProfileStore,
    timeout: Duration,
) -> Result<()> {
    match profile.auth_credentials() {
        AuthCredentials::Unconfigured => Err(Error::CredentialsNotFound),
        AuthCredentials::ClientCredentials {
            client_id,
            client_secret,
        } => {
            let client = PlatformClient::new(profile.endpoint(), profile.tls_no_verify(), timeout)?;
            client
                .client_credentials_token(client_id, client_secret.expose())
                .await?;
            debug!(profile = profile.name(), client_id, "client credentials are valid");
            Ok(())
        }
        AuthCredentials::AccessToken {
            access_token,
            expiration,
            ..
        } => check_access_token(access_token.expose(), *expiration, Utc::now()),
    }
}

/// A stored token is usable only when non-empty and not yet expired.
fn check_access_token(access_token: &str, expiration: i64, now: DateTime<Utc>) -> Result<()> {
    if access_token.is_empty() || now.timestamp() >= expiration {
        return Err(Error::AccessTokenExpired);
    }
    Ok(())
}

/// Produce a bearer token from the profile's credentials.
///
/// Client credentials run a fresh grant on every call. A stored access
/// token is returned verbatim; validate it first.
pub async fn get_token_with_profile(profile: &ProfileStore, timeout: Duration) -> Result<Token> {
    match get_sdk_auth_option_from_profile(profile)? {
        AuthOption::ClientCredentials {
            client_id,
            client_secret,
        } => {
            let client = PlatformClient::new(profile.endpoint(), profile.tls_no_verify(), timeout)?;
            Ok(client
                .client_credentials_token(&client_id, client_secret.expose())
                .await?)
        }
        AuthOption::AccessToken(token) => Ok(token),
    }
}

/// Map the stored credential variant to the authentication a downstream
/// client should be built with.
pub fn get_sdk_auth_option_from_profile(profile: &ProfileStore) -> Result<AuthOption> {
    match profile.auth_credentials() {
        AuthCredentials::Unconfigured => Err(Error::CredentialsNotFound),
        AuthCredentials::ClientCredentials {
            client_id,
            client_secret,
        } => Ok(AuthOption::ClientCredentials {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        }),
        AuthCredentials::AccessToken {
            access_token,
            refresh_token,
            expiration,
            ..
        } => {
            if access_token.expose().is_empty() {
                return Err(Error::AccessTokenNotFound);
            }
            Ok(AuthOption::AccessToken(stored_token(
                access_token.expose(),
                refresh_token.expose(),
                *expiration,
            )))
        }
    }
}

fn stored_token(access_token: &str, refresh_token: &str, expiration: i64) -> Token {
    Token {
        access_token: access_token.to_owned(),
        token_type: "Bearer".to_owned(),
        refresh_token: Some(refresh_token.to_owned()).filter(|t| !t.is_empty()),
        expiry: DateTime::from_timestamp(expiration, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn platform_with_token_status(status: u16) -> MockServer {
        let server = MockServer::start().await;
        let token_endpoint = format!("{}/idp/token", server.uri());
        Mock::given(method("GET"))
            .and(path("/.well-known/opentdf-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "configuration": { "idp": { "token_endpoint": token_endpoint } }
            })))
            .mount(&server)
            .await;
        let response = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh", "token_type": "Bearer", "expires_in": 300
            }))
        } else {
            ResponseTemplate::new(status).set_body_json(json!({"error": "invalid_client"}))
        };
        Mock::given(method("POST"))
            .and(path("/idp/token"))
            .and(header_exists("authorization"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    fn client_credentials_profile(endpoint: &str) -> ProfileStore {
        ProfileStore::ephemeral(
            endpoint,
            false,
            AuthCredentials::client_credentials("svc", "s3cret"),
        )
        .unwrap()
    }

    fn access_token_profile(token: &str, expiration: i64) -> ProfileStore {
        ProfileStore::ephemeral(
            // Unroutable: access-token validation must not touch the network.
            "http://127.0.0.1:1",
            false,
            AuthCredentials::access_token("cli", token, "rt", expiration),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn unconfigured_profile_has_no_credentials() {
        let profile =
            ProfileStore::ephemeral("https://h", false, AuthCredentials::Unconfigured).unwrap();
        assert!(matches!(
            validate_profile_auth_credentials(&profile, TIMEOUT).await,
            Err(Error::CredentialsNotFound)
        ));
        assert!(matches!(
            get_token_with_profile(&profile, TIMEOUT).await,
            Err(Error::CredentialsNotFound)
        ));
    }

    #[tokio::test]
    async fn client_credentials_validated_by_live_grant() {
        let server = platform_with_token_status(200).await;
        let profile = client_credentials_profile(&server.uri());
        validate_profile_auth_credentials(&profile, TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_client_credentials_are_distinguishable() {
        let server = platform_with_token_status(401).await;
        let profile = client_credentials_profile(&server.uri());
        let err = validate_profile_auth_credentials(&profile, TIMEOUT)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Auth(platform_auth::Error::CredentialsRejected(_))),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn unreachable_platform_is_distinguishable() {
        let profile = client_credentials_profile("http://127.0.0.1:1");
        let err = validate_profile_auth_credentials(&profile, TIMEOUT)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Auth(platform_auth::Error::PlatformUnreachable(_))),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn client_credentials_always_run_a_fresh_grant() {
        let server = platform_with_token_status(200).await;
        let profile = client_credentials_profile(&server.uri());
        let token = get_token_with_profile(&profile, TIMEOUT).await.unwrap();
        assert_eq!(token.access_token, "fresh");
        get_token_with_profile(&profile, TIMEOUT).await.unwrap();

        let grants = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/idp/token")
            .count();
        assert_eq!(grants, 2);
    }

    #[tokio::test]
    async fn access_token_checked_locally() {
        let future = Utc::now().timestamp() + 3600;
        validate_profile_auth_credentials(&access_token_profile("at", future), TIMEOUT)
            .await
            .unwrap();

        let past = Utc::now().timestamp() - 1;
        assert!(matches!(
            validate_profile_auth_credentials(&access_token_profile("at", past), TIMEOUT).await,
            Err(Error::AccessTokenExpired)
        ));
        assert!(matches!(
            validate_profile_auth_credentials(&access_token_profile("", future), TIMEOUT).await,
            Err(Error::AccessTokenExpired)
        ));
    }

    #[test]
    fn expiry_boundary() {
        let now = DateTime::from_timestamp(1_000, 0).unwrap();
        assert!(check_access_token("at", 1_001, now).is_ok());
        assert!(matches!(check_access_token("at", 1_000, now), Err(Error::AccessTokenExpired)));
        assert!(matches!(check_access_token("at", 0, now), Err(Error::AccessTokenExpired)));
        assert!(matches!(check_access_token("", 1_001, now), Err(Error::AccessTokenExpired)));
    }

    #[tokio::test]
    async fn stored_access_token_returned_verbatim() {
        let profile = access_token_profile("stored-at", 1_700_000_000);
        let token = get_token_with_profile(&profile, TIMEOUT).await.unwrap();
        assert_eq!(token.access_token, "stored-at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert_eq!(token.expiry_unix(), 1_700_000_000);
    }

    #[test]
    fn sdk_option_matches_variant() {
        let cc = client_credentials_profile("https://h");
        match get_sdk_auth_option_from_profile(&cc).unwrap() {
            AuthOption::ClientCredentials {
                client_id,
                client_secret,
            } => {
                assert_eq!(client_id, "svc");
                assert_eq!(client_secret.expose(), "s3cret");
            }
            other => panic!("expected client credentials, got {other:?}"),
        }

        let at = access_token_profile("at", 42);
        assert!(matches!(
            get_sdk_auth_option_from_profile(&at).unwrap(),
            AuthOption::AccessToken(t) if t.access_token == "at"
        ));
    }
}
