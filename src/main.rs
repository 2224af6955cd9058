mod backend;

use std::sync::Arc;

use anyhow::Result;
use geotrack_core::{Config, LocationError};
use geotrack_location::LocationFetcher;
use geotrack_session::{SessionEvent, TrackingSession, TrackingStore};

use crate::backend::AppBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Start,
    Stop,
    Toggle,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("status") => Ok(Self::Status),
            Some("start") => Ok(Self::Start),
            Some("stop") => Ok(Self::Stop),
            Some("toggle") => Ok(Self::Toggle),
            Some(other) => {
                anyhow::bail!("Unknown command '{}' (expected status, start, stop or toggle)", other)
            }
        }
    }
}

fn report(event: SessionEvent) {
    match event {
        SessionEvent::Tracking(coordinate) => println!("Tracking started at {}", coordinate),
        SessionEvent::PermissionRequired => {
            println!("{}", LocationError::PermissionDenied.user_message())
        }
        SessionEvent::ProviderPromptRequired => {
            println!("{}", LocationError::ProviderDisabled.user_message())
        }
        SessionEvent::Failed(e) => println!("{}", e.user_message()),
        SessionEvent::Cancelled => println!("Location request cancelled."),
        SessionEvent::Stopped => println!("Tracking stopped."),
        SessionEvent::AlreadyTracking => println!("Already tracking."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    geotrack_core::init()?;

    let command = Command::parse(std::env::args().nth(1).as_deref())?;
    let (config, _) = Config::load_validated().inspect_err(|e| eprintln!("{}", e.user_message()))?;

    let backend = Arc::new(AppBackend::from_config(&config.location)?);
    tracing::info!("Using {} positioning backend", backend.name());

    let fetcher =
        LocationFetcher::with_options(Arc::clone(&backend), config.location.fetch_options());
    let store = TrackingStore::open(&config.prefs_path())?;
    let mut session = TrackingSession::new(fetcher, store, config.profile.display_name.clone());

    // Ctrl-C abandons a pending fetch.
    let interrupt = {
        let stop = session.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.cancel_pending();
            }
        })
    };

    let status = backend.status().await;
    tracing::debug!("Platform status: {:?}", status);

    let event = match command {
        Command::Status => session.restore(&status).await?,
        Command::Start => Some(session.start(&status).await?),
        Command::Stop => Some(session.stop()?),
        Command::Toggle => Some(session.toggle(&status).await?),
    };
    interrupt.abort();

    if let Some(event) = event {
        report(event);
    }
    println!("{}", session.view());

    Ok(())
}
