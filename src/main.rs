use anyhow::Result;
use chatterly::app::{App, UiCommand};
use chatterly::config::ClientConfig;
use chatterly::protocol::Mode;
use std::io::BufRead;
use std::thread;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatterly=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Chatterly recipe assistant");

    let mut config = ClientConfig::default();
    if let Ok(url) = std::env::var("CHATTERLY_SERVER_URL") {
        config = config.with_server_url(url);
    }
    if let Ok(url) = std::env::var("CHATTERLY_API_URL") {
        config = config.with_api_base_url(url);
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let identity =
        std::env::var("CHATTERLY_IDENTITY").unwrap_or_else(|_| "guest@chatterly".to_string());
    let mode = match std::env::var("CHATTERLY_MODE").as_deref() {
        Ok("voice") => Mode::Voice,
        _ => Mode::Text,
    };

    let app = App::new(config, identity.clone(), mode);
    if std::env::var("CHATTERLY_CALENDAR_AUTHORIZED").as_deref() == Ok("1") {
        app.auth().set_calendar_authorized(&identity, true);
    }

    let ui_tx = app.ui_handle();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let command = parse_command(line.trim());
            let Some(command) = command else { continue };
            let quitting = matches!(command, UiCommand::Quit);
            if ui_tx.send(command).is_err() || quitting {
                break;
            }
        }
        let _ = ui_tx.send(UiCommand::Quit);
    });

    app.run()?;
    info!("Chatterly stopped");
    Ok(())
}

/// Map one input line to a UI command. Anything that is not a slash command
/// is sent as free text.
fn parse_command(line: &str) -> Option<UiCommand> {
    if line.is_empty() {
        return None;
    }
    if let Some(rest) = line.strip_prefix("/mode ") {
        return match rest.trim() {
            "text" => Some(UiCommand::SelectMode(Mode::Text)),
            "voice" => Some(UiCommand::SelectMode(Mode::Voice)),
            _ => None,
        };
    }
    if let Some(rest) = line.strip_prefix("/choice ") {
        // Choices are displayed 1-based.
        let index = rest.trim().parse::<usize>().ok()?.checked_sub(1)?;
        return Some(UiCommand::Choose(index));
    }
    match line {
        "/voice" => Some(UiCommand::StartVoice),
        "/stop" => Some(UiCommand::StopVoice),
        "/cancel" => Some(UiCommand::CancelVoice),
        "/fav" => Some(UiCommand::AddFavourite),
        "/reconnect" => Some(UiCommand::Reconnect),
        "/quit" => Some(UiCommand::Quit),
        _ => Some(UiCommand::SendText(line.to_string())),
    }
}
