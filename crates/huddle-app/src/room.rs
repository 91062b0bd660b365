//! Run one room session against the configured relay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use huddle_common::{HuddleError, SessionError, TimestampRoomIds};
use huddle_config::{HuddleConfig, MediaConfig};
use huddle_session::{
    Coordinator, DeviceSet, Role, RoomRequest, SessionConfig, SessionEvent, SessionHandle,
    WsConfig, WsTransport,
};

use crate::cli::Command;

pub fn session_config(config: &HuddleConfig) -> SessionConfig {
    SessionConfig {
        min_password_length: config.room.min_password_length as usize,
        event_buffer: config.room.event_buffer as usize,
    }
}

pub fn ws_config(config: &HuddleConfig) -> WsConfig {
    WsConfig {
        connect_timeout: Duration::from_secs(u64::from(config.relay.connect_timeout_secs)),
        event_buffer: config.room.event_buffer as usize,
    }
}

pub fn device_set(media: &MediaConfig) -> DeviceSet {
    DeviceSet::new(media.camera, media.microphone)
        .deny_camera(media.deny_camera)
        .start_muted(media.start_video_muted, media.start_audio_muted)
        .with_display(media.screen_capture)
}

pub fn request_for(command: &Command) -> RoomRequest {
    match command {
        Command::Create {
            name,
            password,
            room_id: Some(room_id),
        } => RoomRequest::create_with_id(room_id, name, password),
        Command::Create {
            name,
            password,
            room_id: None,
        } => RoomRequest::create(&TimestampRoomIds, name, password),
        Command::Join {
            room,
            name,
            password,
        } => RoomRequest::join(room, name, password),
    }
}

/// Connect, start the session, and drive it until it ends.
pub async fn run(command: Command, config: &HuddleConfig) -> Result<(), HuddleError> {
    let request = request_for(&command);
    let devices = Arc::new(device_set(&config.media));

    let (transport, transport_events) =
        WsTransport::connect(&config.relay.url, ws_config(config)).await?;
    let (mut coordinator, handle, events) = Coordinator::new(
        request,
        session_config(config),
        transport,
        transport_events,
    );
    coordinator.set_display_source(devices.clone());
    let printer = tokio::spawn(print_events(events));

    if let Err(e) = coordinator.start(&*devices).await {
        drop(coordinator);
        let _ = printer.await;
        return Err(e.into());
    }
    if let Command::Create { password, .. } = &command {
        println!("Password: {}", password.trim());
    }

    let input = tokio::spawn(read_commands(handle.clone()));
    let interrupt = tokio::spawn(leave_on_interrupt(handle));

    coordinator.run().await;
    input.abort();
    interrupt.abort();

    match printer.await {
        Ok(Some(error)) => Err(error.into()),
        Ok(None) => Ok(()),
        Err(e) => Err(HuddleError::Other(format!("event printer failed: {e}"))),
    }
}

/// Print session events. Returns the terminal error, if any, for the
/// caller to report.
async fn print_events(mut events: mpsc::Receiver<SessionEvent>) -> Option<SessionError> {
    let mut terminal = None;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::MediaReady { stream } => println!(
                "Media ready (camera: {}, microphone: {})",
                on_off(stream.has_video && stream.video_enabled),
                on_off(stream.has_audio && stream.audio_enabled),
            ),
            SessionEvent::MediaFallback { reason } => {
                println!("Camera unavailable, joined with audio only ({reason})")
            }
            SessionEvent::Ready {
                self_id,
                room_id,
                role: Role::Creator,
            } => {
                println!("Meeting created. Meeting ID: {room_id}");
                println!("Share the meeting ID and password with participants.");
                tracing::debug!(self_id = %self_id, "creator ready");
            }
            SessionEvent::Ready {
                self_id, room_id, ..
            } => println!("Joined meeting {room_id} as {self_id}"),
            SessionEvent::RosterChanged(participants) => {
                let names: Vec<&str> = participants
                    .iter()
                    .map(|p| p.display_name.as_str())
                    .collect();
                println!("Participants: {}", names.join(", "));
            }
            SessionEvent::SlotAdded(slot) => {
                let video = if slot.show_placeholder {
                    "no video"
                } else {
                    "video"
                };
                println!("{} connected ({video})", slot.label);
            }
            SessionEvent::SlotRemoved { peer_id } => println!("{peer_id} disconnected"),
            SessionEvent::CallFailed { peer_id, reason } => {
                eprintln!("Call to {peer_id} failed: {reason}")
            }
            SessionEvent::LocalTrackToggled { kind, enabled } => {
                println!("Your {kind} is {}", on_off(enabled))
            }
            SessionEvent::ConnectionStatus { connected } => {
                if !connected {
                    eprintln!("Lost connection to the relay");
                }
            }
            SessionEvent::Warning(message) => eprintln!("warning: {message}"),
            SessionEvent::ScreenShare { active: true } => println!("Sharing your screen"),
            SessionEvent::ScreenShare { active: false } => println!("Screen sharing stopped"),
            SessionEvent::Terminated(error) => terminal = Some(error),
            SessionEvent::Left => println!("You left the meeting"),
        }
    }
    terminal
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Interactive commands from stdin: `v` toggles video, `a` toggles audio,
/// `s` shares the screen, `x` stops sharing, `q` leaves.
///
/// Lines are read on a plain thread so a pending read never holds up
/// runtime shutdown once the session has ended.
async fn read_commands(handle: SessionHandle) {
    println!("Commands: v = toggle video, a = toggle audio, s = share screen, x = stop sharing, q = leave");
    let (tx, mut lines) = mpsc::channel::<String>(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    while let Some(line) = lines.recv().await {
        let sent = match line.trim() {
            "v" | "video" => handle.toggle_video().await,
            "a" | "audio" => handle.toggle_audio().await,
            "s" | "share" => handle.share_screen().await,
            "x" | "unshare" => handle.stop_share().await,
            "q" | "quit" | "leave" => {
                let _ = handle.leave().await;
                break;
            }
            "" => Ok(()),
            other => {
                eprintln!("unknown command: {other}");
                Ok(())
            }
        };
        if sent.is_err() {
            break;
        }
    }
}

async fn leave_on_interrupt(handle: SessionHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("interrupt received, leaving");
        let _ = handle.leave().await;
    }
}
