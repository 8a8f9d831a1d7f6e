//! Session manager: owns every live `GenericPlayer` and web-audio
//! player, mints the `SessionId`/`SourceId` values the command surface
//! refers clients back by, and dispatches an incoming
//! `rialto_common::Command` to the right player method. Grounded on
//! `kaleidux-daemon::main`'s single command-processing point (the
//! `cmd_rx` loop fed by the IPC accept loop) — this is that same
//! "one place commands land" role, just addressing sessions instead of
//! a single wallpaper/player state machine.
//!
//! `ClientEvent` delivery is push-based and has no standing per-session
//! connection in this crate (the real IPC framing is out of scope);
//! every player notification lands on one broadcast channel that
//! `main.rs` drains into the log. A transport that keeps a live
//! connection per session would instead filter this channel by
//! `session_id` and forward each event to its socket.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use rialto_common::{
    ClientEvent, Command, MediaSourceType, NetworkState, PlaybackState, QosInfo, RequestId,
    ShmPartitionInfo, SourceId, VideoRequirements, WebAudioPlayerState,
};
use rialto_player::client::{PlayerClient, WebAudioPlayerClient};
use rialto_player::config::PlayerConfig;
use rialto_player::context::WebAudioContext;
use rialto_player::decryption::DataReader;
use rialto_player::tasks::webaudio as webaudio_tasks;
use rialto_player::webaudio::{self, WebAudioWorker, WebAudioWorkerHandle, WriteRendezvous};
use rialto_player::{bus::BusDispatcher, GenericPlayer};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Forwards every `PlayerClient`/`WebAudioPlayerClient` notification
/// into `ClientEvent`s on the session manager's shared broadcast
/// channel, tagging each with the session it came from.
struct ForwardingClient {
    session_id: u32,
    events: broadcast::Sender<ClientEvent>,
}

impl ForwardingClient {
    fn emit(&self, event: ClientEvent) {
        // No subscribers is a normal state (no transport attached yet);
        // `send` failing just means the event is dropped.
        let _ = self.events.send(event);
    }
}

impl PlayerClient for ForwardingClient {
    fn notify_network_state(&self, state: NetworkState) {
        self.emit(ClientEvent::NetworkStateChange { session_id: self.session_id, state });
    }

    fn notify_playback_state(&self, state: PlaybackState) {
        self.emit(ClientEvent::PlaybackStateChange { session_id: self.session_id, state });
    }

    fn notify_position(&self, position_ns: i64) {
        self.emit(ClientEvent::PositionChange { session_id: self.session_id, position_ns });
    }

    fn notify_need_media_data(
        &self,
        source_id: SourceId,
        frame_count: u32,
        request_id: RequestId,
        shm: ShmPartitionInfo,
    ) {
        self.emit(ClientEvent::NeedMediaData {
            session_id: self.session_id,
            source_id,
            frame_count,
            request_id,
            shm,
        });
    }

    fn notify_qos(&self, source_id: SourceId, info: QosInfo) {
        self.emit(ClientEvent::Qos { session_id: self.session_id, source_id, info });
    }

    fn notify_buffer_underflow(&self, source_id: SourceId) {
        self.emit(ClientEvent::BufferUnderflow { session_id: self.session_id, source_id });
    }

    fn notify_source_flushed(&self, source_id: SourceId) {
        self.emit(ClientEvent::SourceFlushed { session_id: self.session_id, source_id });
    }

    fn notify_playback_error(&self, message: &str) {
        self.emit(ClientEvent::PlaybackError {
            session_id: self.session_id,
            message: message.to_string(),
        });
    }
}

impl WebAudioPlayerClient for ForwardingClient {
    fn notify_state(&self, state: WebAudioPlayerState) {
        self.emit(ClientEvent::WebAudioPlayerStateEvent { session_id: self.session_id, state });
    }
}

/// A no-op `DataReader`: this crate's `HaveData` dispatch has no real
/// shared-memory segment source to read from (the transport boundary
/// that excludes a real command socket applies just as much to shm),
/// so a `HaveData` command with `num_frames > 0` surfaces as
/// `PlayerError::ShmCorruption` rather than silently fabricating media.
struct NullDataReader;

impl DataReader for NullDataReader {
    fn read(&mut self, _index: usize) -> Option<rialto_common::MediaSegment> {
        None
    }
}

/// One live generic playback session. `source_types` remembers the
/// `MediaSourceType` a minted `SourceId` was attached for, since several
/// commands (`RemoveSource`, `Flush`, `SetSourcePosition`) address a
/// source by id while `GenericPlayer`'s task constructors key off type.
struct GenericSession {
    player: GenericPlayer,
    source_types: Mutex<HashMap<SourceId, MediaSourceType>>,
    next_source_id: AtomicI32,
}

impl GenericSession {
    fn register_source(&self, source_type: MediaSourceType) -> SourceId {
        let id = SourceId(self.next_source_id.fetch_add(1, Ordering::SeqCst));
        self.source_types.lock().insert(id, source_type);
        id
    }

    fn source_type_of(&self, source_id: SourceId) -> Result<MediaSourceType> {
        self.source_types
            .lock()
            .get(&source_id)
            .copied()
            .ok_or_else(|| anyhow!("unknown source_id {source_id}"))
    }
}

/// One live web-audio session. `mirror` duplicates the element handles
/// `WebAudioContext` holds (cheap refcount clones) so the caller-thread
/// reads (`GetBufferAvailable`/`GetBufferDelay`/`GetDeviceInfo`/
/// `GetVolume`) never wait behind the worker, the same reasoning
/// behind `GenericPlayer::pipeline`.
struct WebAudioSession {
    worker: WebAudioWorker,
    handle: WebAudioWorkerHandle,
    bus: Option<BusDispatcher>,
    mirror: WebAudioContext,
}

pub struct SessionManager {
    config: Arc<PlayerConfig>,
    events: broadcast::Sender<ClientEvent>,
    generic: Mutex<HashMap<u32, GenericSession>>,
    webaudio: Mutex<HashMap<u32, WebAudioSession>>,
    next_session_id: AtomicU32,
}

impl SessionManager {
    pub fn new(config: Arc<PlayerConfig>) -> Self {
        let (events, _) = broadcast::channel(1024);
        SessionManager {
            config,
            events,
            generic: Mutex::new(HashMap::new()),
            webaudio: Mutex::new(HashMap::new()),
            next_session_id: AtomicU32::new(1),
        }
    }

    /// Subscribes to every `ClientEvent` emitted by any session. Used by
    /// `main.rs` to bridge events into the log until a real transport
    /// layer exists to carry them to a specific connection.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn mint_session_id(&self) -> u32 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Executes one command and returns its JSON result (empty object
    /// for fire-and-forget commands). Never blocks for long: every
    /// generic-player call either enqueues onto its Worker or reads
    /// straight off the pipeline.
    pub fn dispatch(&self, command: Command) -> Result<Value> {
        match command {
            Command::CreateSession { max_width, max_height } => self.create_session(max_width, max_height),
            Command::Load { session_id } => {
                // Pipeline construction already happened in CreateSession;
                // Load is folded into construction here since this crate
                // builds the empty pipeline eagerly.
                self.with_generic(session_id, |_| Ok(json!({})))
            }
            Command::AttachSource { session_id, source, switch_source } => {
                self.with_generic(session_id, |session| {
                    let source_id = session.register_source(source.source_type());
                    session.player.attach_source(source_id, source, switch_source);
                    Ok(json!({ "source_id": source_id.0 }))
                })
            }
            Command::RemoveSource { session_id, source_id } => self.with_generic(session_id, |session| {
                let source_type = session.source_type_of(source_id)?;
                session.source_types.lock().remove(&source_id);
                session.player.remove_source(source_type);
                Ok(json!({}))
            }),
            Command::AllSourcesAttached { session_id } => self.with_generic(session_id, |session| {
                session.player.all_sources_attached();
                Ok(json!({}))
            }),
            Command::Play { session_id } => self.with_generic(session_id, |session| {
                session.player.play();
                Ok(json!({}))
            }),
            Command::Pause { session_id } => self.with_generic(session_id, |session| {
                session.player.pause();
                Ok(json!({}))
            }),
            Command::Stop { session_id } => self.destroy_generic(session_id),
            Command::SetPosition { session_id, position_ns } => self.with_generic(session_id, |session| {
                session.player.set_position(position_ns);
                Ok(json!({}))
            }),
            Command::GetPosition { session_id } => self.with_generic(session_id, |session| {
                let position_ns = session.player.get_position()?;
                Ok(json!({ "position_ns": position_ns }))
            }),
            Command::SetPlaybackRate { session_id, rate } => self.with_generic(session_id, |session| {
                session.player.set_playback_rate(rate);
                Ok(json!({}))
            }),
            Command::SetVideoWindow { session_id, geometry } => self.with_generic(session_id, |session| {
                session.player.set_video_geometry(geometry);
                Ok(json!({}))
            }),
            Command::SetVolume { session_id, volume } => self.with_generic(session_id, |session| {
                session.player.set_volume(volume);
                Ok(json!({}))
            }),
            Command::GetVolume { session_id } => {
                self.with_generic(session_id, |session| Ok(json!({ "volume": session.player.get_volume() })))
            }
            Command::SetMute { session_id, muted } => self.with_generic(session_id, |session| {
                session.player.set_mute(muted);
                Ok(json!({}))
            }),
            Command::GetMute { session_id } => {
                self.with_generic(session_id, |session| Ok(json!({ "muted": session.player.get_mute() })))
            }
            Command::Flush { session_id, source_id, reset_time } => self.with_generic(session_id, |session| {
                let source_type = session.source_type_of(source_id)?;
                session.player.flush(source_type, reset_time);
                Ok(json!({}))
            }),
            Command::SetSourcePosition {
                session_id,
                source_id,
                position_ns,
                reset_time,
                applied_rate,
                stop_position_ns,
            } => self.with_generic(session_id, |session| {
                let source_type = session.source_type_of(source_id)?;
                session
                    .player
                    .set_source_position(source_type, position_ns, reset_time, applied_rate, stop_position_ns);
                Ok(json!({}))
            }),
            Command::ProcessAudioGap { session_id, position_ns, duration_ns, discontinuity, is_audio_aac } => {
                self.with_generic(session_id, |session| {
                    session.player.process_audio_gap(position_ns, duration_ns, discontinuity, is_audio_aac);
                    Ok(json!({}))
                })
            }
            Command::SetImmediateOutput { session_id, source_id, enabled } => {
                self.with_generic(session_id, |session| {
                    session.player.set_immediate_output(source_id, enabled);
                    Ok(json!({}))
                })
            }
            Command::GetImmediateOutput { session_id, .. } => self.with_generic(session_id, |session| {
                Ok(json!({ "immediate_output": session.player.get_immediate_output()? }))
            }),
            Command::GetStats { session_id, .. } => {
                self.with_generic(session_id, |session| Ok(serde_json::to_value(session.player.get_stats()?)?))
            }
            Command::HaveData { session_id, status, num_frames, request_id } => {
                self.with_generic(session_id, |session| {
                    session.player.have_data_shm(status, request_id, Box::new(NullDataReader), num_frames as usize);
                    Ok(json!({}))
                })
            }
            Command::DestroySession { session_id } => self.destroy_generic(session_id),

            Command::CreateWebAudioPlayer { pcm, mime, priority } => {
                tracing::debug!(mime = %mime, priority, "create web-audio player");
                self.create_webaudio(pcm)
            }
            Command::DestroyWebAudioPlayer { session_id } => self.destroy_webaudio(session_id),
            Command::WebAudioPlay { session_id } => self.with_webaudio(session_id, |session| {
                session.handle.enqueue(Box::new(webaudio_tasks::Play));
                Ok(json!({}))
            }),
            Command::WebAudioPause { session_id } => self.with_webaudio(session_id, |session| {
                session.handle.enqueue(Box::new(webaudio_tasks::Pause));
                Ok(json!({}))
            }),
            Command::WebAudioSetEos { session_id } => self.with_webaudio(session_id, |session| {
                session.handle.enqueue(Box::new(webaudio_tasks::SetEos));
                Ok(json!({}))
            }),
            Command::WebAudioGetBufferAvailable { session_id } => self.with_webaudio(session_id, |session| {
                Ok(serde_json::to_value(webaudio::get_buffer_available(&session.mirror)?)?)
            }),
            Command::WebAudioGetBufferDelay { session_id } => self.with_webaudio(session_id, |session| {
                let delay = webaudio::get_buffer_delay(&session.mirror)?;
                Ok(json!({ "delay_ns": delay.as_nanos() as u64 }))
            }),
            Command::WebAudioWriteBuffer { session_id, main, wrap, .. } => {
                self.with_webaudio(session_id, |session| {
                    let rendezvous = WriteRendezvous::new();
                    session.handle.enqueue(Box::new(webaudio_tasks::WriteBuffer {
                        main,
                        wrap,
                        rendezvous: rendezvous.clone(),
                    }));
                    let bytes_written = rendezvous.wait(self.config.writebuffer_timeout).unwrap_or(0);
                    Ok(json!({ "bytes_written": bytes_written }))
                })
            }
            Command::WebAudioGetDeviceInfo { session_id } => self
                .with_webaudio(session_id, |session| Ok(serde_json::to_value(webaudio::get_device_info(&session.mirror))?)),
            Command::WebAudioSetVolume { session_id, volume } => self.with_webaudio(session_id, |session| {
                session.handle.enqueue(Box::new(webaudio_tasks::SetVolume { volume }));
                Ok(json!({}))
            }),
            Command::WebAudioGetVolume { session_id } => self
                .with_webaudio(session_id, |session| Ok(json!({ "volume": webaudio::get_volume(&session.mirror)? }))),
        }
    }

    fn create_session(&self, max_width: u32, max_height: u32) -> Result<Value> {
        let session_id = self.mint_session_id();
        let client: Arc<ForwardingClient> =
            Arc::new(ForwardingClient { session_id, events: self.events.clone() });
        let player_client: Arc<dyn PlayerClient> = client;
        let player = GenericPlayer::new_unprivileged(
            player_client,
            self.config.clone(),
            VideoRequirements { max_width, max_height },
        )?;
        self.generic.lock().insert(
            session_id,
            GenericSession {
                player,
                source_types: Mutex::new(HashMap::new()),
                next_source_id: AtomicI32::new(1),
            },
        );
        Ok(json!({ "session_id": session_id }))
    }

    fn destroy_generic(&self, session_id: u32) -> Result<Value> {
        let session = self
            .generic
            .lock()
            .remove(&session_id)
            .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
        session.player.stop();
        Ok(json!({}))
    }

    fn with_generic<T>(&self, session_id: u32, f: impl FnOnce(&GenericSession) -> Result<T>) -> Result<T> {
        let sessions = self.generic.lock();
        let session = sessions.get(&session_id).ok_or_else(|| anyhow!("unknown session {session_id}"))?;
        f(session)
    }

    fn create_webaudio(&self, pcm: rialto_common::WebAudioPcmConfig) -> Result<Value> {
        let session_id = self.mint_session_id();
        let client: Arc<ForwardingClient> =
            Arc::new(ForwardingClient { session_id, events: self.events.clone() });

        let ctx = webaudio::build_pipeline(&pcm, self.config.webaudio_capacity_bytes)?;
        let mirror = WebAudioContext {
            pipeline: ctx.pipeline.clone(),
            app_src: ctx.app_src.clone(),
            volume_element: ctx.volume_element.clone(),
            bytes_per_sample: ctx.bytes_per_sample,
            pcm_rate: ctx.pcm_rate,
            capacity_bytes: ctx.capacity_bytes,
        };
        let bus_pipeline = mirror.pipeline.clone();

        let worker = WebAudioWorker::spawn(ctx, |_ctx, err| {
            tracing::warn!(error = %err, "web-audio worker terminal error");
        });
        let handle = worker.handle();

        let bus = bus_pipeline.and_then(|pipeline| {
            let bus_handle = handle.clone();
            let bus_client: Arc<dyn WebAudioPlayerClient> = client.clone();
            BusDispatcher::spawn(pipeline, move |message| {
                bus_handle.enqueue(Box::new(webaudio_tasks::HandleWebAudioBusMessage {
                    message,
                    client: bus_client.clone(),
                }));
            })
        });

        self.webaudio.lock().insert(session_id, WebAudioSession { worker, handle, bus, mirror });
        Ok(json!({ "session_id": session_id }))
    }

    fn destroy_webaudio(&self, session_id: u32) -> Result<Value> {
        let session = self
            .webaudio
            .lock()
            .remove(&session_id)
            .ok_or_else(|| anyhow!("unknown web-audio session {session_id}"))?;
        if let Some(bus) = session.bus {
            bus.stop();
        }
        session.worker.stop();
        Ok(json!({}))
    }

    fn with_webaudio<T>(&self, session_id: u32, f: impl FnOnce(&WebAudioSession) -> Result<T>) -> Result<T> {
        let sessions = self.webaudio.lock();
        let session = sessions.get(&session_id).ok_or_else(|| anyhow!("unknown web-audio session {session_id}"))?;
        f(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_destroy_a_generic_session() {
        gstreamer::init().ok();
        let manager = SessionManager::new(Arc::new(PlayerConfig::default()));
        let created = manager
            .dispatch(Command::CreateSession { max_width: 1920, max_height: 1080 })
            .expect("create session");
        let session_id = created["session_id"].as_u64().unwrap() as u32;

        manager.dispatch(Command::Play { session_id }).expect("play");
        manager.dispatch(Command::DestroySession { session_id }).expect("destroy session");

        let err = manager.dispatch(Command::Play { session_id }).unwrap_err();
        assert!(err.to_string().contains("unknown session"));
    }

    #[test]
    fn attach_source_mints_and_remembers_a_source_id() {
        gstreamer::init().ok();
        let manager = SessionManager::new(Arc::new(PlayerConfig::default()));
        let created = manager
            .dispatch(Command::CreateSession { max_width: 1920, max_height: 1080 })
            .unwrap();
        let session_id = created["session_id"].as_u64().unwrap() as u32;

        let attached = manager
            .dispatch(Command::AttachSource {
                session_id,
                source: rialto_common::MediaSource::Audio(rialto_common::MediaSourceAudio {
                    mime_type: "audio/mpeg".into(),
                    channels: 2,
                    sample_rate: 48000,
                    codec_specific_config: Vec::new(),
                    segment_alignment: rialto_common::SegmentAlignment::None,
                    stream_format: None,
                    codec_data: None,
                    has_drm: false,
                }),
                switch_source: false,
            })
            .unwrap();
        let source_id = SourceId(attached["source_id"].as_i64().unwrap() as i32);

        manager
            .dispatch(Command::Flush { session_id, source_id, reset_time: true })
            .expect("flush a known source_id succeeds");
    }

    #[test]
    fn unknown_session_commands_return_an_error_not_a_panic() {
        let manager = SessionManager::new(Arc::new(PlayerConfig::default()));
        let err = manager.dispatch(Command::GetVolume { session_id: 404 }).unwrap_err();
        assert!(err.to_string().contains("unknown session"));
    }
}
