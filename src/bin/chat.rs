//! Terminal front end for Chat'Bruti.
//!
//! Reads questions from stdin, one per line, and prints the reply as it
//! streams. Lines starting with `/` are commands:
//!
//! - `/voice` toggles spoken replies
//! - `/voix [name]` picks a voice (lists them without a name)
//! - `/rec` starts recording, or stops and sends the transcript
//! - `/devices` lists audio input and output devices
//! - `/quit` leaves
//!
//! Logs go to stderr so stdout carries only the conversation.

use std::io::Write;

use bruti::audio::{CpalCapture, CpalPlayer};
use bruti::conversation::Role;
use bruti::voice::{PlaybackState, VoicePreference};
use bruti::{ChatConfig, ChatSession, NoticeKind, RecordingOutcome, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bruti=info")),
        )
        .init();

    let config = ChatConfig::load().map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut session = ChatSession::from_config(&config).map_err(|e| {
        tracing::error!(error = %e, "cannot start session");
        anyhow::anyhow!("{}", e.message())
    })?;

    for message in session.conversation() {
        println!("Chat'Bruti: {}", message.content);
    }

    let printer = tokio::spawn(print_events(session.subscribe()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/voice", _) => {
                let enabled = session.toggle_voice_mode();
                println!("Mode vocal {}", if enabled { "activé" } else { "désactivé" });
            }
            ("/voix", "") => {
                for option in VoicePreference::catalogue() {
                    let name = option.preference.name().unwrap_or("auto");
                    println!("  {name:<8} {}", option.label);
                }
            }
            ("/voix", name) => session.set_voice_preference(VoicePreference::parse(name)),
            ("/devices", _) => print_devices(),
            ("/rec", _) => match session.toggle_recording().await {
                Ok(RecordingOutcome::Started) => println!("🎙️  Enregistrement... (/rec pour arrêter)"),
                Ok(RecordingOutcome::Sent { transcript, .. }) => {
                    tracing::debug!(transcript, "transcript sent");
                }
                Err(e) => tracing::debug!(error = %e, "recording toggle failed"),
            },
            _ => {
                if let Err(e) = session.send(line).await {
                    eprintln!("{}", e.user_message());
                }
            }
        }
    }

    session.shutdown();
    drop(session);
    let _ = printer.await;
    Ok(())
}

/// Render session events until the session goes away.
async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    let mut streamed = String::new();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            SessionEvent::MessageAppended(message) if message.role == Role::Bot => {
                streamed.clear();
                print!("Chat'Bruti: ");
                flush();
            }
            SessionEvent::MessageAppended(_) => {}
            SessionEvent::MessageUpdated { fragment, .. } => {
                streamed.push_str(&fragment);
                print!("{fragment}");
                flush();
            }
            SessionEvent::MessageFinalized(message) => {
                if message.content != streamed {
                    // Fallback line or apology replaced what streamed.
                    if !streamed.is_empty() {
                        println!();
                    }
                    print!("{}", message.content);
                }
                println!();
            }
            SessionEvent::Notice(notice) => match notice.kind {
                NoticeKind::PermissionPrompt => eprintln!("⚠️  {}", notice.text),
                NoticeKind::Transient { .. } => eprintln!("{}", notice.text),
            },
            SessionEvent::Playback(PlaybackState::Playing) => eprintln!("🔊"),
            SessionEvent::Playback(PlaybackState::Idle) => {}
            SessionEvent::Recording(state) => tracing::debug!(?state, "recording state"),
            SessionEvent::VoiceMode { .. } => {}
        }
    }
}

/// List audio devices by name, as accepted by the `[audio]` config section.
fn print_devices() {
    for (label, devices) in [
        ("Micros", CpalCapture::list_input_devices()),
        ("Sorties", CpalPlayer::list_output_devices()),
    ] {
        match devices {
            Ok(names) => {
                println!("{label} :");
                for name in names {
                    println!("  {name}");
                }
            }
            Err(e) => eprintln!("{label} : {}", e.message()),
        }
    }
}

fn flush() {
    let _ = std::io::stdout().flush();
}
