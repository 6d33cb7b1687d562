//! Command-line parsing
//!
//! Global flags come before the command group; command flags after the
//! subcommand.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use secret_store::Driver;

pub const USAGE: &str = "\
usage: platformctl [global flags] <command>

global flags:
  --config <path>                  configuration file
  --profile <name>                 profile to use instead of the default
  --host <endpoint>                use a flag-supplied profile (no storage)
  --tls-no-verify                  skip TLS verification for --host
  --with-client-creds <json>       {\"clientId\":\"..\",\"clientSecret\":\"..\"}
  --with-client-creds-file <path>  same, read from a file
  --with-access-token <jwt>        bearer token for --host

commands:
  profile add <name> <endpoint> [--set-default] [--tls-no-verify]
  profile list
  profile get <name>
  profile delete <name>
  profile set-default <name>
  profile set-endpoint <name> <endpoint>
  profile set-tls-no-verify <name> <true|false>
  profile migrate <from-driver> <to-driver>
  auth login [--client-id <id>] [--port <port>] [--no-browser]
  auth logout
  auth client-credentials (<client-id> <client-secret> | --file <path>)
  auth print-access-token";

#[derive(Debug, Default, PartialEq)]
pub struct GlobalArgs {
    pub config: Option<String>,
    pub profile: Option<String>,
    pub host: Option<String>,
    pub tls_no_verify: bool,
    pub with_client_creds: Option<String>,
    pub with_client_creds_file: Option<PathBuf>,
    pub with_access_token: Option<String>,
}

impl GlobalArgs {
    /// Whether any flag asking for a flag-supplied profile was given.
    pub fn wants_ephemeral(&self) -> bool {
        self.host.is_some()
            || self.tls_no_verify
            || self.with_client_creds.is_some()
            || self.with_client_creds_file.is_some()
            || self.with_access_token.is_some()
    }
}

#[derive(Debug, PartialEq)]
pub enum ClientCredsSource {
    Inline { client_id: String, client_secret: String },
    File(PathBuf),
}

#[derive(Debug, PartialEq)]
pub enum Command {
    ProfileAdd {
        name: String,
        endpoint: String,
        set_default: bool,
        tls_no_verify: bool,
    },
    ProfileList,
    ProfileGet { name: String },
    ProfileDelete { name: String },
    ProfileSetDefault { name: String },
    ProfileSetEndpoint { name: String, endpoint: String },
    ProfileSetTlsNoVerify { name: String, enabled: bool },
    ProfileMigrate { from: Driver, to: Driver },
    AuthLogin {
        client_id: Option<String>,
        port: Option<u16>,
        no_browser: bool,
    },
    AuthLogout,
    AuthClientCredentials(ClientCredsSource),
    AuthPrintAccessToken,
    Help,
}

#[derive(Debug, PartialEq)]
pub struct Cli {
    pub global: GlobalArgs,
    pub command: Command,
}

/// Parse `args` (without the program name).
pub fn parse(args: &[String]) -> Result<Cli> {
    let mut global = GlobalArgs::default();
    let mut rest = args.iter().map(String::as_str).peekable();

    while let Some(flag) = rest.next_if(|a| a.starts_with("--")) {
        match flag {
            "--help" => {
                return Ok(Cli {
                    global,
                    command: Command::Help,
                });
            }
            "--tls-no-verify" => global.tls_no_verify = true,
            "--config" => global.config = Some(value(&mut rest, flag)?),
            "--profile" => global.profile = Some(value(&mut rest, flag)?),
            "--host" => global.host = Some(value(&mut rest, flag)?),
            "--with-client-creds" => global.with_client_creds = Some(value(&mut rest, flag)?),
            "--with-client-creds-file" => {
                global.with_client_creds_file = Some(PathBuf::from(value(&mut rest, flag)?))
            }
            "--with-access-token" => global.with_access_token = Some(value(&mut rest, flag)?),
            other => bail!("unknown flag {other}"),
        }
    }

    let positional: Vec<&str> = rest.collect();
    let command = match positional.as_slice() {
        [] | ["help"] => Command::Help,
        ["profile", sub, tail @ ..] => parse_profile(sub, tail)?,
        ["auth", sub, tail @ ..] => parse_auth(sub, tail)?,
        [group, ..] => bail!("unknown command {group}"),
    };
    Ok(Cli { global, command })
}

fn value<'a>(rest: &mut impl Iterator<Item = &'a str>, flag: &str) -> Result<String> {
    rest.next()
        .map(str::to_owned)
        .with_context(|| format!("{flag} needs a value"))
}

fn parse_profile(sub: &str, tail: &[&str]) -> Result<Command> {
    let (args, flags): (Vec<&str>, Vec<&str>) = tail.iter().partition(|a| !a.starts_with("--"));
    let command = match (sub, args.as_slice()) {
        ("add", [name, endpoint]) => {
            let mut set_default = false;
            let mut tls_no_verify = false;
            for flag in &flags {
                match *flag {
                    "--set-default" => set_default = true,
                    "--tls-no-verify" => tls_no_verify = true,
                    other => bail!("unknown flag {other} for profile add"),
                }
            }
            return Ok(Command::ProfileAdd {
                name: name.to_string(),
                endpoint: endpoint.to_string(),
                set_default,
                tls_no_verify,
            });
        }
        ("list", []) => Command::ProfileList,
        ("get", [name]) => Command::ProfileGet { name: name.to_string() },
        ("delete", [name]) => Command::ProfileDelete { name: name.to_string() },
        ("set-default", [name]) => Command::ProfileSetDefault { name: name.to_string() },
        ("set-endpoint", [name, endpoint]) => Command::ProfileSetEndpoint {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
        },
        ("set-tls-no-verify", [name, enabled]) => Command::ProfileSetTlsNoVerify {
            name: name.to_string(),
            enabled: enabled
                .parse()
                .with_context(|| format!("expected true or false, got {enabled}"))?,
        },
        ("migrate", [from, to]) => {
            let from: Driver = from.parse()?;
            let to: Driver = to.parse()?;
            if from == to {
                bail!("cannot migrate profiles from {from} to itself");
            }
            Command::ProfileMigrate { from, to }
        }
        _ => bail!("invalid profile command; see --help"),
    };
    if let Some(flag) = flags.first() {
        bail!("unknown flag {flag} for profile {sub}");
    }
    Ok(command)
}

fn parse_auth(sub: &str, tail: &[&str]) -> Result<Command> {
    match (sub, tail) {
        ("login", _) => {
            let mut client_id = None;
            let mut port = None;
            let mut no_browser = false;
            let mut it = tail.iter().copied();
            while let Some(flag) = it.next() {
                match flag {
                    "--client-id" => client_id = Some(value(&mut it, flag)?),
                    "--port" => {
                        let raw = value(&mut it, flag)?;
                        port = Some(raw.parse().with_context(|| format!("invalid port {raw}"))?);
                    }
                    "--no-browser" => no_browser = true,
                    other => bail!("unknown argument {other} for auth login"),
                }
            }
            Ok(Command::AuthLogin {
                client_id,
                port,
                no_browser,
            })
        }
        ("logout", []) => Ok(Command::AuthLogout),
        ("print-access-token", []) => Ok(Command::AuthPrintAccessToken),
        ("client-credentials", ["--file", path]) => Ok(Command::AuthClientCredentials(
            ClientCredsSource::File(PathBuf::from(path)),
        )),
        ("client-credentials", [client_id, client_secret]) if !client_id.starts_with("--") => {
            Ok(Command::AuthClientCredentials(ClientCredsSource::Inline {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            }))
        }
        _ => bail!("invalid auth command; see --help"),
    }
}
