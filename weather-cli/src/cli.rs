use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use weather_core::{
    Config, Connectivity, FileStore, KeyValueStore, OpenWeatherProvider, Online, PermissionKind,
    Refresh, Services, Session, SessionEvent, SessionSettings, StoredPermissions, TcpConnectivity,
    WeatherCache, map_to_display,
    permission::GrantState,
};

use crate::{prompt, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather where you are")]
pub struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key, coordinates, region and units.
    Configure,

    /// Show the last weather fetched, without using the network.
    Show,

    /// Fetch the weather once and show it.
    Now,

    /// Keep fetching on every location update until Ctrl-C.
    Watch {
        /// Seconds between location updates; overrides the config.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Manage the stored location permission.
    Permissions {
        #[command(subcommand)]
        action: PermissionAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum PermissionAction {
    /// Allow location access.
    Grant,
    /// Deny location access.
    Revoke,
    /// Print the current grant for each permission.
    Status,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => {
                prompt::configure(&mut config).context("Configuration aborted")?;
                config.save()?;
                println!("Saved configuration to {}", Config::config_file_path()?.display());
            }
            Command::Show => {
                let store = open_store()?;
                match WeatherCache::new(store).load()? {
                    Some(resp) => render::print_display(&map_to_display(&resp, &config.effective_region())),
                    None => render::print_no_cache(),
                }
            }
            Command::Now => refresh(&config).await?,
            Command::Watch { interval } => {
                if interval.is_some() {
                    config.update_interval_secs = interval;
                }
                watch(&config).await?;
            }
            Command::Permissions { action } => permissions(action)?,
        }

        Ok(())
    }
}

fn open_store() -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let path = Config::preferences_file_path()?;
    let store = FileStore::open(&path)?;
    Ok(Arc::new(store))
}

fn build_session(config: &Config) -> anyhow::Result<(Session, mpsc::UnboundedReceiver<SessionEvent>)> {
    let settings = SessionSettings::from_config(config)?;
    let store = open_store()?;
    let provider = OpenWeatherProvider::new(config.base_url());

    let connectivity: Arc<dyn Connectivity> = match provider.endpoint() {
        Some((host, port)) => Arc::new(TcpConnectivity::new(host, port)),
        None => Arc::new(Online),
    };

    let permissions = StoredPermissions::new(Arc::clone(&store));
    let services = Services {
        location: Arc::new(prompt::ConfiguredLocation::new(config.coordinates())),
        permissions: Arc::new(prompt::InteractivePermissions::new(permissions)),
        connectivity,
        provider: Arc::new(provider),
        store,
    };

    Ok(Session::new(services, settings))
}

async fn refresh(config: &Config) -> anyhow::Result<()> {
    let (session, mut events) = build_session(config)?;

    let refreshed = session.refresh_once().await;

    for notice in pending_notices(&mut events) {
        render::print_event(&notice);
    }

    match refreshed {
        Ok(Refresh::Updated(display)) => render::print_display(&display),
        Ok(Refresh::Offline(cached)) => {
            eprintln!("No network connection; showing last known weather.");
            match cached {
                Some(display) => render::print_display(&display),
                None => render::print_no_cache(),
            }
        }
        Ok(Refresh::Stopped(outcome)) => render::print_outcome(outcome),
        Err(err) => {
            // Stale but available.
            if let Ok(Some(display)) = session.show_cached() {
                render::print_display(&display);
            }
            return Err(err.into());
        }
    }

    Ok(())
}

/// Notices queued during a one-shot refresh; displays are printed from its result.
fn pending_notices(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Notice(_) = event {
            notices.push(event);
        }
    }
    notices
}

async fn watch(config: &Config) -> anyhow::Result<()> {
    let (session, mut events) = build_session(config)?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render::print_event(&event);
        }
    });

    let shutdown = session.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received");
            shutdown.cancel();
        }
    });

    let outcome = session.run().await;

    // Closes the event channel so the printer can finish.
    drop(session);
    printer.await.context("Event printer stopped unexpectedly")?;

    render::print_outcome(outcome?);
    Ok(())
}

fn permissions(action: PermissionAction) -> anyhow::Result<()> {
    let stored = StoredPermissions::new(open_store()?);
    let kinds = PermissionKind::location();

    match action {
        PermissionAction::Grant => {
            stored.grant_all(kinds)?;
            println!("Location access granted.");
        }
        PermissionAction::Revoke => {
            stored.revoke_all(kinds)?;
            println!("Location access revoked.");
        }
        PermissionAction::Status => {
            for kind in kinds {
                let state = match stored.state(*kind)? {
                    GrantState::Granted => "granted",
                    GrantState::Denied => "denied",
                    GrantState::NotAsked => "not asked",
                };
                println!("{kind}: {state}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_watch_interval_and_verbosity() {
        let cli = Cli::try_parse_from(["weather", "-vv", "watch", "--interval", "30"]).expect("parse");
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Watch { interval: Some(30) }));
    }

    #[test]
    fn parses_permission_actions() {
        let cli = Cli::try_parse_from(["weather", "permissions", "revoke"]).expect("parse");
        assert!(matches!(cli.command, Command::Permissions { action: PermissionAction::Revoke }));
    }

    #[tokio::test]
    async fn pending_notices_skips_other_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Offline).expect("send");
        tx.send(SessionEvent::Notice("Location services disabled".into())).expect("send");
        tx.send(SessionEvent::Offline).expect("send");

        let notices = pending_notices(&mut rx);

        assert_eq!(notices.len(), 1);
        assert!(matches!(&notices[0], SessionEvent::Notice(m) if m == "Location services disabled"));
        assert!(pending_notices(&mut rx).is_empty());
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["weather", "forecast"]).is_err());
    }
}
