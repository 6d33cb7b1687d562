//! Command handlers
//!
//! Results go to stdout; diagnostics go through tracing to stderr.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use common::Config;
use platform_auth::{Field, LOGIN_PATH, LoginOptions, PlatformClient};
use profiles::{
    AuthCredentials, ClientCredentials, ProfileStore, Session, get_token_with_profile,
    validate_profile_auth_credentials,
};
use secret_store::{Driver, StoreBackend, Vault};
use tracing::{info, warn};

use crate::cli::{self, ClientCredsSource, Command, GlobalArgs};

pub async fn run(
    session: &mut Session,
    global: &GlobalArgs,
    command: Command,
    config: &Config,
) -> Result<()> {
    match command {
        Command::ProfileAdd {
            name,
            endpoint,
            set_default,
            tls_no_verify,
        } => {
            session
                .add_profile(&name, &endpoint, tls_no_verify, set_default)
                .with_context(|| format!("failed to add profile {name}"))?;
            println!("Profile {name} added");
        }
        Command::ProfileList => {
            let default = session.global().default_profile().map(str::to_owned);
            for name in session.list_profiles() {
                let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        Command::ProfileGet { name } => {
            let profile = session.get_profile(&name)?;
            let is_default = session.global().default_profile() == Some(name.as_str());
            let auth_type = profile
                .auth_credentials()
                .auth_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "none".to_owned());
            println!("name:          {}", profile.name());
            println!("endpoint:      {}", profile.endpoint());
            println!("tls-no-verify: {}", profile.tls_no_verify());
            println!("auth:          {auth_type}");
            println!("default:       {is_default}");
        }
        Command::ProfileDelete { name } => {
            session
                .delete_profile(&name)
                .with_context(|| format!("failed to delete profile {name}"))?;
            println!("Profile {name} deleted");
        }
        Command::ProfileSetDefault { name } => {
            session.set_default_profile(&name)?;
            println!("Default profile set to {name}");
        }
        Command::ProfileSetEndpoint { name, endpoint } => {
            let profile = session.use_profile(&name)?;
            profile.set_endpoint(&endpoint)?;
            println!("Profile {name} endpoint set to {}", profile.endpoint());
        }
        Command::ProfileSetTlsNoVerify { name, enabled } => {
            session.use_profile(&name)?.set_tls_no_verify(enabled)?;
            println!("Profile {name} tls-no-verify set to {enabled}");
        }
        Command::AuthLogin {
            client_id,
            port,
            no_browser,
        } => {
            let profile = select_profile(session, global)?;
            login(profile, config, client_id, port, no_browser).await?;
        }
        Command::AuthLogout => {
            let profile = select_profile(session, global)?;
            logout(profile, config).await?;
        }
        Command::AuthClientCredentials(source) => {
            let profile = select_profile(session, global)?;
            set_client_credentials(profile, config, source).await?;
        }
        Command::AuthPrintAccessToken => {
            let profile = select_profile(session, global)?;
            print_access_token(profile, config).await?;
        }
        Command::ProfileMigrate { .. } | Command::Help => {
            println!("{}", cli::USAGE);
        }
    }
    Ok(())
}

/// `--profile <name>` when given, else the default profile.
fn select_profile<'a>(
    session: &'a mut Session,
    global: &GlobalArgs,
) -> Result<&'a mut ProfileStore> {
    match global.profile.as_deref() {
        Some(name) => session
            .use_profile(name)
            .with_context(|| format!("failed to load profile {name}")),
        None => session
            .use_default_profile()
            .context("no profile selected; pass --profile or set a default profile"),
    }
}

pub fn migrate_profiles(
    config: &Config,
    vault: Arc<dyn Vault>,
    from: Driver,
    to: Driver,
) -> Result<()> {
    let dir = config.store.profile_dir.as_deref();
    let source = StoreBackend::select(Some(from.as_str()), dir, common::APP_NAME, vault.clone())
        .with_context(|| format!("failed to open {from} storage"))?;
    let target = StoreBackend::select(Some(to.as_str()), dir, common::APP_NAME, vault)
        .with_context(|| format!("failed to open {to} storage"))?;

    let count = profiles::migrate(&source, &target, common::APP_NAME)
        .with_context(|| format!("failed to migrate profiles from {from} to {to}"))?;
    println!("Migrated {count} profile(s) from {from} to {to}");
    Ok(())
}

pub async fn run_ephemeral(global: &GlobalArgs, command: &Command, config: &Config) -> Result<()> {
    if *command != Command::AuthPrintAccessToken {
        bail!(
            "--host, --tls-no-verify and the --with-* flags only apply to auth print-access-token"
        );
    }
    let profile = ephemeral_profile(global)?;
    print_access_token(&profile, config).await
}

/// Build an in-memory profile from `--host` and exactly one credential flag.
fn ephemeral_profile(global: &GlobalArgs) -> Result<ProfileStore> {
    let host = global
        .host
        .as_deref()
        .context("--host must be set when profile-less flags are used")?;

    let given = [
        global.with_access_token.is_some(),
        global.with_client_creds.is_some(),
        global.with_client_creds_file.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if given != 1 {
        bail!(
            "exactly one of --with-access-token, --with-client-creds or --with-client-creds-file \
             must be set"
        );
    }

    let credentials = if let Some(token) = &global.with_access_token {
        let expiration = platform_auth::access_token_expiration(token)
            .context("failed to read the access token")?;
        AuthCredentials::access_token("", token.as_str(), "", expiration)
    } else if let Some(json) = &global.with_client_creds {
        ClientCredentials::from_json(json)?.into_auth_credentials()
    } else if let Some(path) = &global.with_client_creds_file {
        ClientCredentials::from_file(path)?.into_auth_credentials()
    } else {
        bail!("no credentials given");
    };

    Ok(ProfileStore::ephemeral(host, global.tls_no_verify, credentials)?)
}

/// Turn a credential validation failure into an actionable message.
fn explain(err: profiles::Error, endpoint: &str) -> anyhow::Error {
    use platform_auth::Error as AuthError;
    use profiles::Error;

    let hint = match &err {
        Error::Auth(AuthError::PlatformUnreachable(_)) => format!(
            "failed to connect to the platform; is it accepting connections at '{endpoint}'?"
        ),
        Error::Auth(AuthError::PlatformConfig { .. }) => format!(
            "failed to get the platform configuration; \
             is '{endpoint}' serving a well-known configuration?"
        ),
        Error::Auth(AuthError::CredentialsRejected(_)) => {
            "the identity provider rejected the client credentials".to_owned()
        }
        Error::CredentialsNotFound => {
            "profile has no credentials; run auth login or auth client-credentials".to_owned()
        }
        Error::AccessTokenExpired => "access token expired; run auth login again".to_owned(),
        Error::AccessTokenNotFound => "no access token stored; run auth login".to_owned(),
        _ => "failed to authenticate".to_owned(),
    };
    anyhow!(err).context(hint)
}

async fn print_access_token(profile: &ProfileStore, config: &Config) -> Result<()> {
    let timeout = config.network_timeout();
    validate_profile_auth_credentials(profile, timeout)
        .await
        .map_err(|e| explain(e, profile.endpoint()))?;
    let token = get_token_with_profile(profile, timeout)
        .await
        .map_err(|e| explain(e, profile.endpoint()))?;
    println!("{}", token.access_token);
    Ok(())
}

async fn login(
    profile: &mut ProfileStore,
    config: &Config,
    client_id: Option<String>,
    port: Option<u16>,
    no_browser: bool,
) -> Result<()> {
    let client = PlatformClient::new(
        profile.endpoint(),
        profile.tls_no_verify(),
        config.network_timeout(),
    )?;
    let options = LoginOptions {
        client_id: client_id.clone(),
        port: port.unwrap_or(config.login.callback_port),
        timeout: config.login_timeout(),
        open_browser: config.login.open_browser && !no_browser,
    };

    eprintln!(
        "Complete the login in your browser: http://localhost:{}{LOGIN_PATH}",
        options.port
    );
    let token = client
        .login(&options)
        .await
        .with_context(|| format!("login to {} failed", profile.endpoint()))?;

    // Revocation at logout needs the client the tokens were issued to.
    let client_id = match client_id {
        Some(id) => id,
        None => client
            .discover()
            .await?
            .field(Field::PublicClientId)?
            .to_owned(),
    };
    profile.set_auth_credentials(AuthCredentials::from_token(client_id, &token))?;
    info!(profile = profile.name(), "stored access token");
    println!("Logged in to {}", profile.endpoint());
    Ok(())
}

async fn logout(profile: &mut ProfileStore, config: &Config) -> Result<()> {
    if let AuthCredentials::AccessToken {
        client_id,
        refresh_token,
        ..
    } = profile.auth_credentials().clone()
    {
        if !refresh_token.expose().is_empty() {
            let client = PlatformClient::new(
                profile.endpoint(),
                profile.tls_no_verify(),
                config.network_timeout(),
            )?;
            if let Err(e) = client.revoke(&client_id, refresh_token.expose()).await {
                warn!(profile = profile.name(), error = %e, "refresh token revocation failed");
            }
        }
    }
    profile.clear_auth_credentials()?;
    println!("Logged out of {}", profile.name());
    Ok(())
}

/// Validate the pair against the platform before storing it.
async fn set_client_credentials(
    profile: &mut ProfileStore,
    config: &Config,
    source: ClientCredsSource,
) -> Result<()> {
    let credentials = match source {
        ClientCredsSource::Inline {
            client_id,
            client_secret,
        } => AuthCredentials::client_credentials(client_id, client_secret),
        ClientCredsSource::File(path) => {
            ClientCredentials::from_file(&path)?.into_auth_credentials()
        }
    };

    let candidate = ProfileStore::ephemeral(
        profile.endpoint(),
        profile.tls_no_verify(),
        credentials.clone(),
    )?;
    validate_profile_auth_credentials(&candidate, config.network_timeout())
        .await
        .map_err(|e| explain(e, profile.endpoint()))?;

    profile.set_auth_credentials(credentials)?;
    println!("Client credentials stored for {}", profile.name());
    Ok(())
}
