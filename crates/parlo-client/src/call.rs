//! The call driver: one session per process run.
//!
//! Joins the channel connect and the capture request, then drives the
//! session state machine from a single select loop over signaling frames,
//! peer events, and local capture frames.

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use parlo_core::{Session, SessionAction, SessionEvent, SessionState, SignalMessage};
use parlo_media::{
    AudioCapturer, AudioFrame, AudioRenderer, CaptureConfig, CpalCapturer, CpalRenderer,
    MediaError, NullRenderer, ToneCapturer,
};

use crate::peer::{AudioPeer, PeerEvent};
use crate::signaling::SignalingChannel;

pub type CapturerFactory =
    Box<dyn FnOnce() -> parlo_media::Result<Box<dyn AudioCapturer>> + Send>;
pub type RendererFactory =
    Box<dyn FnOnce() -> parlo_media::Result<Box<dyn AudioRenderer>> + Send>;

#[derive(Debug, Clone)]
pub struct CallConfig {
    pub relay_url: String,
    /// Use the tone generator instead of the microphone.
    pub tone: bool,
    /// Discard remote audio instead of playing it.
    pub mute: bool,
}

/// Run one call attempt with the devices selected by `config`.
pub async fn run_call(config: CallConfig) -> Result<()> {
    let capture_config = CaptureConfig::default();
    let tone = config.tone;
    let mute = config.mute;

    let capturer: CapturerFactory = Box::new(move || {
        if tone {
            Ok(Box::new(ToneCapturer::new(capture_config)) as Box<dyn AudioCapturer>)
        } else {
            Ok(Box::new(CpalCapturer::new(capture_config)?) as Box<dyn AudioCapturer>)
        }
    });
    let renderer: RendererFactory = Box::new(move || {
        if mute {
            Ok(Box::new(NullRenderer::new()) as Box<dyn AudioRenderer>)
        } else {
            Ok(Box::new(CpalRenderer::new(capture_config)?) as Box<dyn AudioRenderer>)
        }
    });

    run_call_with_media(config, capturer, renderer).await
}

/// Run one call attempt with injected capture/playback. Test seam.
pub async fn run_call_with_media(
    config: CallConfig,
    capturer: CapturerFactory,
    renderer: RendererFactory,
) -> Result<()> {
    let mut session = Session::new();
    if session.on_event(SessionEvent::Start) != Some(SessionAction::RequestCapture) {
        return Err(anyhow!("session did not start"));
    }

    // Channel connect and capture request run in parallel; the peer
    // connection is not created until capture succeeds.
    let connect = SignalingChannel::connect(&config.relay_url);
    let capture = tokio::task::spawn_blocking(capturer);
    let (channel, capture_result) = tokio::join!(connect, capture);

    let channel = match channel {
        Ok(channel) => channel,
        Err(e) => {
            session.on_event(SessionEvent::ChannelClosed);
            return Err(anyhow!("failed to reach signaling relay: {e}"));
        }
    };

    let mut capturer = match capture_result? {
        Ok(capturer) => capturer,
        Err(e) => {
            let (code, reason) = match e {
                MediaError::CaptureDenied { code, reason } => (code, reason),
                other => (0, other.to_string()),
            };
            if let Some(SessionAction::ReportCaptureFailure { code }) =
                session.on_event(SessionEvent::CaptureDenied { code })
            {
                // The one user-visible failure notification. No signaling
                // message is ever sent for this attempt.
                eprintln!("Failed to get access to local media. Error code was {code}.");
            }
            return Err(anyhow!(
                "failed to get access to local media (code {code}): {reason}"
            ));
        }
    };

    let (sender, mut receiver) = channel.start();

    if session.on_event(SessionEvent::CaptureGranted) != Some(SessionAction::SendOffer) {
        return Err(anyhow!("session refused to negotiate"));
    }

    let (event_tx, mut events) = mpsc::channel::<PeerEvent>(64);
    let peer = match AudioPeer::new(sender.clone(), event_tx).await {
        Ok(peer) => peer,
        Err(e) => {
            eprintln!("Cannot create peer connection.");
            return Err(anyhow!("failed to create peer connection: {e}"));
        }
    };

    info!("sending offer to peer");
    let offer = peer.create_offer().await?;
    sender
        .send(SignalMessage::Offer {
            sdp: offer.sdp.clone(),
        })
        .await?;
    peer.begin_candidate_gathering(offer).await?;

    // Local capture pump. The thread exits once the frame channel is
    // dropped at teardown.
    let frame_ms = capturer.config().frame_ms;
    let (frame_tx, mut frames) = mpsc::channel::<AudioFrame>(8);
    std::thread::spawn(move || loop {
        match capturer.next_frame() {
            Ok(frame) => {
                if frame_tx.blocking_send(frame).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("capture stream failed: {}", e);
                break;
            }
        }
    });

    let mut playback: Option<Box<dyn AudioRenderer>> = None;
    let mut renderer = Some(renderer);

    loop {
        tokio::select! {
            msg = receiver.recv() => {
                let Some(signal) = msg else {
                    if let Some(SessionAction::Teardown) = session.on_event(SessionEvent::ChannelClosed) {
                        let _ = peer.close().await;
                    }
                    break;
                };
                match signal {
                    SignalMessage::Answer { sdp } => {
                        if let Some(SessionAction::ApplyAnswer { sdp }) =
                            session.on_event(SessionEvent::AnswerReceived { sdp })
                        {
                            peer.apply_answer(sdp).await?;
                        }
                    }
                    SignalMessage::Candidate { label, candidate } => {
                        if let Some(SessionAction::ApplyCandidate { label, candidate }) =
                            session.on_event(SessionEvent::CandidateReceived { label, candidate })
                        {
                            if let Err(e) = peer.add_remote_candidate(&label, candidate).await {
                                warn!("failed to apply remote candidate: {}", e);
                            }
                        }
                    }
                    SignalMessage::Bye => {
                        if let Some(SessionAction::Teardown) = session.on_event(SessionEvent::ByeReceived) {
                            info!("remote hung up");
                            peer.close().await?;
                            break;
                        }
                    }
                    SignalMessage::Offer { .. } => {
                        debug!("ignoring offer; this client always initiates");
                    }
                    SignalMessage::Unknown => {}
                }
            }
            event = events.recv() => {
                match event {
                    Some(PeerEvent::RemoteTrack) => {
                        if let Some(SessionAction::AttachPlayback) =
                            session.on_event(SessionEvent::RemoteTrackAdded)
                        {
                            match renderer.take().map(|build| build()) {
                                Some(Ok(sink)) => playback = Some(sink),
                                Some(Err(e)) => error!("failed to open playback: {}", e),
                                None => {}
                            }
                        }
                    }
                    Some(PeerEvent::RemoteAudio { payload, timestamp_us }) => {
                        if let Some(sink) = playback.as_mut() {
                            if let Err(e) = sink.render(&payload, timestamp_us) {
                                warn!("playback error: {}", e);
                            }
                        }
                    }
                    None => break,
                }
            }
            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = peer.write_frame(&frame, frame_ms).await {
                            debug!("dropping local frame: {}", e);
                        }
                    }
                    None => {
                        warn!("local capture ended");
                        let _ = peer.close().await;
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("hanging up");
                let _ = sender.send(SignalMessage::Bye).await;
                session.on_event(SessionEvent::ByeReceived);
                let _ = peer.close().await;
                break;
            }
        }
    }

    match session.state() {
        SessionState::Failed => Err(anyhow!("signaling channel lost before the call connected")),
        _ => Ok(()),
    }
}
