//! hotelroom - inspect reservation payloads and manage the thumbnail cache
#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hotelroom::images::{FileCache, ImageLoader};
use hotelroom::{Config, parser};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args(std::env::args().skip(1).collect())? {
        Command::Rooms { file } => show_rooms(&file),
        Command::Bookings { file } => show_bookings(&file),
        Command::Photos { file } => show_photos(&file),
        Command::Fetch { urls } => fetch(&urls).await,
        Command::ClearCache => clear_cache().await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            println!("hotelroom {}", hotelroom::VERSION);
            Ok(())
        }
    }
}

/// CLI commands
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Rooms { file: PathBuf },
    Bookings { file: PathBuf },
    Photos { file: PathBuf },
    Fetch { urls: Vec<String> },
    ClearCache,
    Help,
    Version,
}

fn parse_args(args: Vec<String>) -> Result<Command> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };

    let file = || -> Result<PathBuf> {
        args.get(1)
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("Missing JSON file for '{}'", command))
    };

    match command.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),
        "rooms" => Ok(Command::Rooms { file: file()? }),
        "bookings" | "reservations" => Ok(Command::Bookings { file: file()? }),
        "photos" => Ok(Command::Photos { file: file()? }),
        "fetch" => {
            let urls: Vec<String> = args[1..].to_vec();
            if urls.is_empty() {
                anyhow::bail!("Missing image URL(s) for 'fetch'");
            }
            Ok(Command::Fetch { urls })
        }
        "clear-cache" => Ok(Command::ClearCache),
        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'hotelroom --help' for usage"
        )),
    }
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"hotelroom - reservation payloads and thumbnail cache

USAGE:
    hotelroom [COMMAND]

COMMANDS:
    rooms <file>                       Print rooms from a {{"rooms": [...]}} payload
    bookings <file>                    Print reservations from a {{"bookings": [...]}} payload
    photos <file>                      Print URLs from a {{"photos": [...]}} payload
    fetch <url>...                     Download images into the cache
    clear-cache                        Delete every cached image

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

CONFIG:
    {}
"#,
        config_path
    );
}

fn read(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn show_rooms(file: &Path) -> Result<()> {
    let rooms = parser::parse_rooms(&read(file)?)?;
    for room in &rooms {
        println!("{room}");
    }
    println!("\n{} room(s)", rooms.len());
    Ok(())
}

fn show_bookings(file: &Path) -> Result<()> {
    let reservations = parser::parse_reservations(&read(file)?)?;
    for reservation in &reservations {
        match reservation.nights() {
            Some(nights) => println!("{reservation} ({nights} night(s))"),
            None => println!("{reservation}"),
        }
    }
    println!("\n{} reservation(s)", reservations.len());
    Ok(())
}

fn show_photos(file: &Path) -> Result<()> {
    for url in parser::parse_photo_urls(&read(file)?)? {
        println!("{url}");
    }
    Ok(())
}

async fn fetch(urls: &[String]) -> Result<()> {
    let config = Config::load()?;
    let (loader, _dispatcher) = ImageLoader::from_config(&config.images).await?;

    let mut failed = 0;
    for url in urls {
        match loader.load(url).await {
            Ok(image) => println!("✓ {} ({}x{})", url, image.width(), image.height()),
            Err(e) => {
                failed += 1;
                println!("✗ {}: {}", url, e);
            }
        }
    }

    println!("\n{}", loader.memory_stats());
    if failed > 0 {
        anyhow::bail!("{failed} of {} image(s) failed", urls.len());
    }
    Ok(())
}

async fn clear_cache() -> Result<()> {
    let config = Config::load()?;
    let cache = FileCache::new(config.images.resolved_cache_dir()?).await?;
    let removed = cache.clear().await?;
    println!("✓ Removed {} cached image(s) from {}", removed, cache.dir().display());
    Ok(())
}
