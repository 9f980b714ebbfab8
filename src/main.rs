use std::{process::ExitCode, sync::Arc};

use soundbooth::{
    commands::{CommandRouter, VoiceController, VoiceServices},
    common::{
        banner::{BannerInfo, print_banner},
        logger,
        types::{AnyResult, GuildId},
    },
    configs::Config,
    session::{CommandGate, InactivitySweeper, SessionRegistry},
    soundboard::SoundCatalog,
    terminal::TerminalDriver,
    voice::{
        ConnectionDirectory,
        loopback::{LoopbackDirectory, LoopbackResolver, LoopbackSynthesizer},
    },
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            soundbooth::log_println!("Using built-in configuration: {}", e);
            Config::default()
        }
    };

    logger::init(&config.logging);
    print_banner(&BannerInfo::default(), &config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> AnyResult<()> {
    let guilds = guilds_from_args()?;
    let directory = Arc::new(LoopbackDirectory::new(guilds));

    let registry = Arc::new(SessionRegistry::new());
    registry.initialize(directory.known_guilds().await?);
    info!("Watching {} guilds", registry.len());

    let catalog = SoundCatalog::load(&config.voice.sound_dir).unwrap_or_else(|e| {
        warn!("Soundboard unavailable: {}", e);
        SoundCatalog::default()
    });

    let mut sweeper =
        InactivitySweeper::new(registry.clone(), directory.clone(), &config.voice).spawn();

    let controller = Arc::new(VoiceController::new(
        CommandGate::new(registry),
        VoiceServices {
            directory,
            speech: Arc::new(LoopbackSynthesizer),
            media: Arc::new(LoopbackResolver),
        },
        catalog,
        &config,
    ));
    let shutdown = controller.shutdown_requested();
    let router = Arc::new(CommandRouter::new(controller, config.bot.prefix.clone()));
    let driver = TerminalDriver::new(router);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = driver.run(stdin) => {
            result?;
            info!("Input closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
        _ = shutdown.cancelled() => {
            info!("Shutdown command received");
        }
        result = sweeper.wait() => {
            return match result {
                Ok(()) => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
    }

    sweeper.shutdown().await?;
    Ok(())
}

/// Guild ids to simulate, from the command line. Defaults to guild 1.
fn guilds_from_args() -> AnyResult<Vec<GuildId>> {
    let guilds = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<GuildId>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("guild ids must be numeric: {}", e))?;

    if guilds.is_empty() {
        return Ok(vec![GuildId(1)]);
    }
    Ok(guilds)
}
