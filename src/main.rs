use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use scanplay::api::{Device, TrackId};
use scanplay::auth::{FileTokenStore, capture_code, open_in_browser};
use scanplay::player::PlayerCommand;
use scanplay::router::ScreenState;
use scanplay::scan::{ImageSequenceSource, IntervalTicker, QrDecoder, ScanLoop, ScanOutcome};
use scanplay::transport::ReqwestTransport;
use scanplay::{Config, Session};

#[derive(Parser)]
#[command(name = "scanplay", version, about = "Scan a QR code, play the track on Spotify")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in through the browser (or finish a login with a redirect code)
    Login {
        /// Authorization code copied from the redirect, skips the local listener
        #[arg(long)]
        code: Option<String>,
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Scan frames from a directory of images until a track starts playing
    Scan { frames: PathBuf },
    /// Play a track by id, spotify:track URI or open.spotify.com link
    Play { track: String },
    Pause,
    Resume,
    /// List playback devices
    Devices,
    /// Move playback to another device
    Device { id: String },
    /// Forget all stored credentials
    Logout,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scanplay=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_env().context("loading configuration")?);
    let store = Arc::new(FileTokenStore::new(&config.token_path));
    let transport = Arc::new(ReqwestTransport::new());
    let mut session = Session::new(config.clone(), store, transport);
    tokio::spawn(report_screens(session.router().subscribe()));

    match cli.command {
        Command::Logout => {
            session.logout().context("clearing credentials")?;
            return Ok(());
        }
        Command::Login { code, no_browser } => {
            let code = match code {
                Some(code) => code,
                None => {
                    let request = session.auth().begin_authorization()?;
                    if no_browser {
                        println!("Open this URL to log in:\n{}", request.url);
                    } else {
                        open_in_browser(&request);
                    }
                    capture_code(config.redirect_uri.clone(), request.state)
                        .await
                        .context("waiting for the authorization redirect")?
                }
            };
            session.start(Some(&code)).await.context("login failed")?;
            print_devices(session.devices());
            return Ok(());
        }
        _ => {}
    }

    session.start(None).await.context("resuming session")?;
    if session.screen() == ScreenState::Login {
        bail!("not logged in, run `scanplay login` first");
    }

    match cli.command {
        Command::Scan { frames } => scan(&mut session, frames).await?,
        Command::Play { track } => {
            let Some(track) = TrackId::parse(&track) else {
                bail!("{track:?} is not a track id, URI or link");
            };
            session.command(PlayerCommand::Play(track)).await?;
        }
        Command::Pause => session.command(PlayerCommand::Pause).await?,
        Command::Resume => session.command(PlayerCommand::Resume).await?,
        Command::Devices => print_devices(session.devices()),
        Command::Device { id } => session.command(PlayerCommand::TransferDevice(id)).await?,
        Command::Login { .. } | Command::Logout => unreachable!("handled before startup"),
    }
    Ok(())
}

async fn scan(session: &mut Session, frames: PathBuf) -> anyhow::Result<()> {
    let mut scan = ScanLoop::new(ImageSequenceSource::new(frames), QrDecoder);
    let handle = scan.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    let mut ticker = IntervalTicker::frame_paced();
    match session.scan(&mut scan, &mut ticker).await? {
        Some(ScanOutcome::Accepted(payload)) => {
            println!("Playing {payload}. Press Ctrl-C to pause and close.");
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            session.close_playback().await?;
        }
        Some(ScanOutcome::Cancelled) => println!("Scan cancelled."),
        None => {}
    }
    Ok(())
}

async fn report_screens(mut screens: watch::Receiver<ScreenState>) {
    while screens.changed().await.is_ok() {
        let screen = *screens.borrow_and_update();
        println!("[{screen:?}]");
    }
}

fn print_devices(devices: &[Device]) {
    if devices.is_empty() {
        println!("No playback devices found. Open Spotify on a device first.");
        return;
    }
    for device in devices {
        let marker = if device.is_active { "*" } else { " " };
        let id = device.id.as_deref().unwrap_or("-");
        let note = if device.is_selectable() { "" } else { " [cannot be selected]" };
        println!("{marker} {id}  {}{note}", device.label());
    }
}
