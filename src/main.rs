#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use tempo_rooms_server::config;
use tempo_rooms_server::database::{InMemoryDatabase, PlaylistItemRow, RoomCategory, RoomRow};
use tempo_rooms_server::groups::InMemoryGroupNotifier;
use tempo_rooms_server::logging;
use tempo_rooms_server::protocol::QueueMode;
use tempo_rooms_server::server::MultiplayerHub;
use tempo_rooms_server::websocket::{self, AppState};

/// Tempo Rooms -- authoritative realtime multiplayer room server
#[derive(Parser, Debug)]
#[command(name = "tempo-rooms-server")]
#[command(about = "Authoritative realtime multiplayer room server for rhythm game matches")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,

    /// Seed a demo room into the in-memory database for local testing.
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate(&cfg);
    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Storage backend: InMemory");
                println!(
                    "  Database call timeout: {}s",
                    cfg.server.database_timeout_secs
                );
                println!("  Outbound buffer: {}", cfg.server.outbound_buffer);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }
    validation_result?;

    logging::init_with_config(&cfg.logging);

    let database = Arc::new(InMemoryDatabase::new());
    if cli.seed_demo {
        seed_demo_data(&database).await;
    }
    let notifier = Arc::new(InMemoryGroupNotifier::new());
    let hub = Arc::new(MultiplayerHub::new(
        database,
        notifier.clone(),
        &cfg.server,
    ));

    let app = websocket::router(AppState {
        hub,
        notifier,
        outbound_buffer: cfg.server.outbound_buffer,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "tempo rooms server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {error}");
        return;
    }
    tracing::info!("shutdown signal received");
}

/// Seed one realtime room with a known beatmap so a local client can join
/// immediately: room 1, hosted by user 1000.
async fn seed_demo_data(database: &InMemoryDatabase) {
    let beatmap_id = 1001;
    let checksum = "9c3e9a3ac54c2f7b6f0f4a5b8d1e2f30";
    database.seed_beatmap(beatmap_id, checksum).await;
    database
        .seed_room(RoomRow {
            room_id: 1,
            name: "demo lobby".to_string(),
            host_user_id: 1000,
            category: RoomCategory::Realtime,
            queue_mode: QueueMode::HostOnly,
            ends_at: None,
            participant_count: 0,
        })
        .await;
    let item_id = database
        .seed_playlist_item(PlaylistItemRow {
            id: 0,
            room_id: 1,
            owner_id: 1000,
            beatmap_id,
            beatmap_checksum: checksum.to_string(),
            ruleset_id: 0,
            required_mods: Vec::new(),
            allowed_mods: Vec::new(),
            expired: false,
        })
        .await;
    tracing::info!(
        room_id = 1,
        host = 1000,
        item_id,
        "seeded demo room; connect with /ws?user_id=1000"
    );
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["tempo-rooms-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
        assert!(!cli.seed_demo);
    }

    #[test]
    fn test_cli_validate_config_long() {
        let cli = Cli::try_parse_from(["tempo-rooms-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["tempo-rooms-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["tempo-rooms-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_seed_demo() {
        let cli = Cli::try_parse_from(["tempo-rooms-server", "--seed-demo"]).unwrap();
        assert!(cli.seed_demo);
        assert!(!cli.validate_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        // --validate-config and --print-config are mutually exclusive
        let result =
            Cli::try_parse_from(["tempo-rooms-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_help_contains_flags() {
        // Verify help text mentions our flags
        let result = Cli::try_parse_from(["tempo-rooms-server", "--help"]);
        assert!(result.is_err()); // --help causes early exit which is an "error"
        let err = result.unwrap_err();
        let help_text = err.to_string();
        assert!(help_text.contains("--validate-config"));
        assert!(help_text.contains("--print-config"));
        assert!(help_text.contains("--seed-demo"));
        assert!(help_text.contains("-c"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["tempo-rooms-server", "--version"]);
        assert!(result.is_err()); // --version causes early exit
    }
}
