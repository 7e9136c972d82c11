use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use trackmix::config::Config;
use trackmix::convert::HttpConversionClient;
use trackmix::file_set::ListItem;
use trackmix::merge::{HttpMergeClient, MergeMode};
use trackmix::models::{ConversionState, SourceFile, TrackFormat, Viewport};
use trackmix::render::{GpxRenderer, InMemoryMap};
use trackmix::session::{SessionCollaborators, SessionEvent, SessionHandle, SessionService};

#[derive(Parser)]
#[command(name = "trackmix", version, about = "Preview and combine GPS track files")]
struct Cli {
    /// Base URL of the conversion and merge service (overrides TRACKMIX_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load tracks and print the file list and the fitted map view
    Preview {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Give up waiting for conversions and renders after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Send tracks to the merge service and save combined.gpx
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Join all inputs into a single track
        #[arg(long)]
        merge_segments: bool,
        /// Directory to save the merged file in
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(server) = cli.server {
        config.server_url = server.trim_end_matches('/').to_string();
    }

    let (session, alert_printer) = match start_session(&config) {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start session: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Command::Preview {
            files,
            timeout_secs,
        } => preview(&session, &files, Duration::from_secs(timeout_secs)).await,
        Command::Merge {
            files,
            merge_segments,
            output,
        } => {
            let mode = if merge_segments {
                MergeMode::Merged
            } else {
                MergeMode::Separate
            };
            let output_dir = output.unwrap_or_else(|| config.output_dir.clone());
            merge(&session, &files, mode, &output_dir).await
        }
    };

    // The alert stream ends once the session and every handle are gone, so
    // alerts raised before shutdown are printed before exiting
    session.shutdown();
    drop(session);
    if tokio::time::timeout(Duration::from_secs(2), alert_printer)
        .await
        .is_err()
    {
        warn!("Gave up waiting for pending alerts");
    }
    std::process::exit(code);
}

fn start_session(config: &Config) -> Result<(SessionHandle, JoinHandle<()>), String> {
    let converter = HttpConversionClient::new(&config.server_url, config.request_timeout)
        .map_err(|e| e.to_string())?;
    let merger = HttpMergeClient::new(&config.server_url, config.request_timeout)
        .map_err(|e| e.to_string())?;

    let collaborators = SessionCollaborators {
        converter: Arc::new(converter),
        renderer: Arc::new(GpxRenderer::new()),
        merger: Arc::new(merger),
        map: Box::new(InMemoryMap::new()),
    };

    let session = SessionService::start(tokio::runtime::Handle::current(), config, collaborators);

    let mut alerts = session.subscribe_alerts();
    let alert_printer = tokio::spawn(async move {
        while let Some(SessionEvent::Alert(alert)) = alerts.recv().await {
            eprintln!("warning: {}", alert.message());
        }
    });

    Ok((session, alert_printer))
}

async fn read_selection(paths: &[PathBuf]) -> Vec<SourceFile> {
    let reads = futures::future::join_all(paths.iter().map(|p| SourceFile::from_path(p))).await;

    paths
        .iter()
        .zip(reads)
        .filter_map(|(path, read)| match read {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

async fn preview(session: &SessionHandle, paths: &[PathBuf], timeout: Duration) -> i32 {
    let mut selection = read_selection(paths).await;
    if let Err(e) = session.add_files(&mut selection) {
        error!("{}", e);
        return 1;
    }

    let snapshot = match tokio::time::timeout(timeout, session.wait_until_settled()).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => {
            error!("{}", e);
            return 1;
        }
        Err(_) => {
            warn!("Tracks did not settle within {:?}", timeout);
            match session.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!("{}", e);
                    return 1;
                }
            }
        }
    };

    for item in &snapshot.items {
        println!("{:<40} {}  {}", item.to_string(), item.color, describe_state(item));
    }

    match snapshot.viewport {
        Viewport::Fitted(b) => println!(
            "view: south {:.5} west {:.5} north {:.5} east {:.5}",
            b.south, b.west, b.north, b.east
        ),
        Viewport::Initial { center, zoom } => println!(
            "view: initial ({:.4}, {:.4}) zoom {}",
            center.lat, center.lng, zoom
        ),
    }

    0
}

async fn merge(
    session: &SessionHandle,
    paths: &[PathBuf],
    mode: MergeMode,
    output_dir: &Path,
) -> i32 {
    let mut selection = read_selection(paths).await;
    if let Err(e) = session.add_files(&mut selection) {
        error!("{}", e);
        return 1;
    }

    match session.merge(mode).await {
        Ok(Some(artifact)) => match artifact.save_to(output_dir).await {
            Ok(path) => {
                println!("{}", path.display());
                0
            }
            Err(e) => {
                error!("Failed to save {}: {}", artifact.file_name, e);
                1
            }
        },
        Ok(None) => {
            info!("No files selected, nothing to merge");
            0
        }
        Err(trackmix::session::SessionError::Merge(e)) => {
            error!("{}", e.user_message());
            1
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

fn describe_state(item: &ListItem) -> &'static str {
    match (item.format, item.state) {
        (TrackFormat::Unrecognized, _) => "unsupported",
        (_, Some(ConversionState::Ready)) => "ready",
        (_, Some(ConversionState::Failed)) => "failed",
        (_, Some(ConversionState::Pending)) => "converting",
        (_, None) => "reading",
    }
}
