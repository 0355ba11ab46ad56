//! List Movies CLI
//!
//! Lists movie files with their metadata, filtered and sorted on demand.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use list_movies::cli::args::Cli;
use list_movies::cli::commands::{cache, confirm, download, list, upload};
use list_movies::core::cache::CacheStore;
use list_movies::core::resolver::MetadataResolver;
use list_movies::core::scanner::gather_files;
use list_movies::models::config::{default_cache_dir, load_config};
use list_movies::services::opensubtitles::OpenSubtitlesClient;
use list_movies::services::tmdb::TmdbClient;
use list_movies::Error;
use std::path::Path;

/// Log file written with `--debug`.
const LOG_FILE_NAME: &str = "lm_log.txt";

/// Exit status of a run aborted by a connection failure.
const EXIT_CONNECTION_ERROR: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.debug, &default_cache_dir());
    tracing::debug!("Arguments: {:?}", cli);

    let config = load_config();

    if cli.reset {
        return cache::reset(&config.cache_dir);
    }

    let mut store = CacheStore::open(&config.cache_dir).context("Failed to open cache")?;
    let files = gather_files(&cli.files, &store).context("Failed to gather files")?;

    if cli.delete_cache {
        return cache::delete(&files, &mut store);
    }

    store
        .update_paths(&files)
        .context("Failed to update path cache")?;

    let tmdb = TmdbClient::new(&config.tmdb)?;
    let opensubtitles = OpenSubtitlesClient::new(config.opensubtitles.clone());
    let resolver = MetadataResolver::new(&tmdb, &opensubtitles, config.resolver.clone())
        .with_progress(!cli.debug);

    match resolver.run(&mut store).await {
        Ok(()) => {}
        Err(e @ Error::RemoteConnection { .. }) => {
            eprintln!("{}", e.to_string().red());
            std::process::exit(EXIT_CONNECTION_ERROR);
        }
        Err(e) => return Err(e).context("Failed to resolve metadata"),
    }

    let files = list::select_files(files, &store, &cli);

    if cli.confirm {
        confirm::confirm(&files, &mut store, &resolver, cli.detail()).await?;
    } else if cli.upload {
        upload::upload(&files, &mut store, &opensubtitles, cli.detail()).await?;
    } else if let Some(language) = cli.download.as_deref() {
        download::download(&files, &store, &opensubtitles, language).await?;
    } else {
        list::show(&files, &store, &cli)?;
    }

    Ok(())
}

/// Initialize the logging system.
///
/// Errors only by default; `--debug` logs everything to the console and to
/// a file in the cache directory.
fn init_logging(debug: bool, cache_dir: &Path) {
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if debug {
        EnvFilter::new("list_movies=debug,lm=debug")
    } else {
        EnvFilter::new("list_movies=error,lm=error")
    };

    let file_layer = if debug {
        std::fs::create_dir_all(cache_dir)
            .and_then(|_| std::fs::File::create(cache_dir.join(LOG_FILE_NAME)))
            .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .ok()
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(file_layer)
        .with(filter)
        .init();
}
