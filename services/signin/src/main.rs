//! Extension sign-in harness
//!
//! Drives the extension-auth authenticator from a terminal:
//! 1. Loads the `[auth]`, `[storage]` and `[loopback]` config
//! 2. Persists tokens to a JSON file in place of extension storage
//! 3. Captures the browser redirect on a loopback listener
//! 4. Runs one command (`signin`, `signout`, `status`, `token`, `whoami`)

mod config;
mod loopback;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use capability::{FileStore, ReqwestTransport};
use extension_auth::{AuthState, Authenticator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::loopback::LoopbackIdentity;

/// One harness invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    SignIn,
    SignOut,
    Status,
    Token,
    WhoAmI,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "signin" => Ok(Self::SignIn),
            "signout" => Ok(Self::SignOut),
            "status" => Ok(Self::Status),
            "token" => Ok(Self::Token),
            "whoami" => Ok(Self::WhoAmI),
            other => bail!(
                "unknown command '{other}' (expected signin, signout, status, token or whoami)"
            ),
        }
    }
}

/// Parsed command line: `[--config <path>] <command>`.
#[derive(Debug, PartialEq, Eq)]
struct Args {
    config_path: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut config_path = None;
    let mut command = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config_path = Some(path.clone());
        } else if command.is_none() {
            command = Some(arg.parse()?);
        } else {
            bail!("unexpected argument '{arg}'");
        }
    }

    Ok(Args {
        config_path,
        command: command.unwrap_or(Command::Status),
    })
}

fn describe(state: AuthState) -> &'static str {
    match state {
        AuthState::SignedOut => "signed out",
        AuthState::Authenticating => "sign-in in progress",
        AuthState::Authenticated => "signed in",
        AuthState::Expired => "signed in, access token expired",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let argv: Vec<String> = std::env::args().collect();
    let args = parse_args(&argv)?;

    let config_path = Config::resolve_path(args.config_path.as_deref());
    info!(path = %config_path.display(), command = ?args.command, "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let storage = FileStore::open(config.storage.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open token storage at {}",
                config.storage.path.display()
            )
        })?;
    let transport = ReqwestTransport::new(Duration::from_secs(config.auth.token_timeout_secs))
        .context("failed to build HTTP client")?;
    let identity = LoopbackIdentity::new(
        config.loopback.port,
        config.loopback.wait_secs.map(Duration::from_secs),
    );

    let auth = Authenticator::new(
        config.auth,
        Arc::new(identity),
        Arc::new(storage),
        Arc::new(transport),
    )
    .context("invalid auth configuration")?;

    match args.command {
        Command::SignIn => match auth.authenticate().await {
            Ok(tokens) => {
                info!(expires_in = tokens.expires_in, "sign-in complete");
                match tokens.user_profile {
                    Some(profile) => println!(
                        "Signed in as {}",
                        profile
                            .user_principal_name
                            .or(profile.email)
                            .or(profile.name)
                            .unwrap_or_else(|| "unknown user".into())
                    ),
                    None => println!("Signed in"),
                }
            }
            Err(e) => {
                error!(error = %e, "sign-in failed");
                return Err(e).context("sign-in failed");
            }
        },
        Command::SignOut => {
            auth.sign_out().await.context("sign-out failed")?;
            println!("Signed out");
        }
        Command::Status => println!("{}", describe(auth.state().await)),
        Command::Token => match auth.access_token().await {
            Some(token) => println!("{token}"),
            None => bail!("no usable access token; run `signin` first"),
        },
        Command::WhoAmI => match auth.current_user().await {
            Some(profile) => println!(
                "{}",
                serde_json::to_string_pretty(&profile).context("failed to render profile")?
            ),
            None => bail!("not signed in"),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("extension-auth-signin")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_command_only() {
        let args = parse_args(&argv(&["signin"])).unwrap();
        assert_eq!(args.command, Command::SignIn);
        assert!(args.config_path.is_none());
    }

    #[test]
    fn test_parse_config_before_and_after_command() {
        let before = parse_args(&argv(&["--config", "/etc/auth.toml", "token"])).unwrap();
        let after = parse_args(&argv(&["whoami", "--config", "/etc/auth.toml"])).unwrap();

        assert_eq!(before.config_path.as_deref(), Some("/etc/auth.toml"));
        assert_eq!(before.command, Command::Token);
        assert_eq!(after.config_path.as_deref(), Some("/etc/auth.toml"));
        assert_eq!(after.command, Command::WhoAmI);
    }

    #[test]
    fn test_parse_defaults_to_status() {
        assert_eq!(parse_args(&argv(&[])).unwrap().command, Command::Status);
    }

    #[test]
    fn test_parse_all_commands() {
        for (name, expected) in [
            ("signin", Command::SignIn),
            ("signout", Command::SignOut),
            ("status", Command::Status),
            ("token", Command::Token),
            ("whoami", Command::WhoAmI),
        ] {
            assert_eq!(name.parse::<Command>().unwrap(), expected);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        let err = parse_args(&argv(&["login"])).unwrap_err();
        assert!(err.to_string().contains("unknown command 'login'"));
    }

    #[test]
    fn test_parse_rejects_dangling_config_flag() {
        assert!(parse_args(&argv(&["status", "--config"])).is_err());
    }

    #[test]
    fn test_parse_rejects_extra_argument() {
        assert!(parse_args(&argv(&["signin", "signout"])).is_err());
    }

    #[test]
    fn test_describe_states() {
        assert_eq!(describe(AuthState::SignedOut), "signed out");
        assert_eq!(describe(AuthState::Authenticated), "signed in");
        assert!(describe(AuthState::Expired).contains("expired"));
    }
}
