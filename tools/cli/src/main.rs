//! Drive Gallery CLI - serve the gallery or work with the Drive account
//! from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use drivegallery_common::FolderId;
use drivegallery_storage::{Authorizer, DriveApi, DriveClient, ImageQuery};
use drivegallery_web::{AppState, ServerConfig};

#[derive(Parser)]
#[command(name = "drivegallery")]
#[command(about = "Drive Gallery - browse Google Drive images in the browser")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding credentials.json and token.json.
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web gallery.
    Serve {
        /// Address to bind.
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory of static assets.
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Authorize now, running the browser consent if needed.
    Authorize,

    /// List folders.
    Folders,

    /// List images, optionally inside one folder.
    Files {
        /// Folder id.
        #[arg(short, long)]
        folder: Option<String>,

        /// Continuation token from a previous listing.
        #[arg(long)]
        page_token: Option<String>,
    },

    /// Delete the saved credential record.
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Serve {
            host,
            port,
            static_dir,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(dir) = static_dir {
                config.static_dir = dir;
            }
            cmd_serve(&config).await
        }

        Commands::Authorize => cmd_authorize(&config).await,

        Commands::Folders => cmd_folders(&config).await,

        Commands::Files { folder, page_token } => cmd_files(&config, folder, page_token).await,

        Commands::Logout => cmd_logout(&config).await,
    }
}

fn authorizer(config: &ServerConfig) -> Result<Authorizer> {
    Authorizer::loopback(config.auth_config()).context("Failed to set up authorization")
}

fn drive(config: &ServerConfig) -> Result<DriveClient> {
    DriveClient::new(config.drive_api_base.clone()).context("Failed to create Drive client")
}

/// Run the web gallery until Ctrl-C.
async fn cmd_serve(config: &ServerConfig) -> Result<()> {
    let state = Arc::new(AppState::new(authorizer(config)?, Arc::new(drive(config)?)));

    let static_dir = if config.static_dir.is_dir() {
        Some(config.static_dir.as_path())
    } else {
        info!(
            "Static directory {} not found, serving routes only",
            config.static_dir.display()
        );
        None
    };
    let app = drivegallery_web::router(state, static_dir);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

/// Authorize and report which credential is now stored.
async fn cmd_authorize(config: &ServerConfig) -> Result<()> {
    let authorizer = authorizer(config)?;
    let session = authorizer.authorize().await.context("Authorization failed")?;

    // Proves the session works before reporting success.
    session.access_token().await.context("Token refresh failed")?;

    println!("Authorized.");
    println!("  Credential record: {}", authorizer.store().token_path().display());
    Ok(())
}

/// List folders.
async fn cmd_folders(config: &ServerConfig) -> Result<()> {
    let session = authorizer(config)?
        .authorize()
        .await
        .context("Authorization failed")?;
    let folders = drive(config)?.list_folders(&session).await?;

    if folders.is_empty() {
        println!("No folders found.");
        return Ok(());
    }

    for folder in &folders {
        println!("  [DIR]  {} ({})", folder.name, folder.id);
    }
    Ok(())
}

/// List one page of images.
async fn cmd_files(
    config: &ServerConfig,
    folder: Option<String>,
    page_token: Option<String>,
) -> Result<()> {
    let query = match folder {
        Some(id) => ImageQuery::in_folder(FolderId::new(id)?),
        None => ImageQuery::all(),
    }
    .with_page_token(page_token);

    let session = authorizer(config)?
        .authorize()
        .await
        .context("Authorization failed")?;
    let page = drive(config)?.list_images(&session, &query).await?;

    if page.is_empty() {
        println!("No files found.");
    }
    for file in &page.files {
        println!("  [FILE] {} ({})", file.name, file.id);
    }
    if let Some(token) = page.next_page_token {
        println!("\nMore results: --page-token {}", token);
    }
    Ok(())
}

/// Remove the credential record.
async fn cmd_logout(config: &ServerConfig) -> Result<()> {
    let authorizer = authorizer(config)?;
    if authorizer.store().clear().await? {
        println!("Credential record removed.");
    } else {
        println!("No credential record to remove.");
    }
    Ok(())
}
