//! Peer connection wrapper around the webrtc crate.
//!
//! Owns the local Opus track and the `RTCPeerConnection`; surfaces remote
//! media and connection progress as [`PeerEvent`]s on a channel so the call
//! driver stays a single select loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::signaling::SignalSender;
use parlo_core::SignalMessage;
use parlo_media::AudioFrame;

const STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// What the peer connection reports back to the call driver.
#[derive(Debug)]
pub enum PeerEvent {
    /// The remote audio track arrived.
    RemoteTrack,
    /// One RTP payload from the remote track.
    RemoteAudio { payload: Bytes, timestamp_us: u64 },
}

pub struct AudioPeer {
    pc: Arc<RTCPeerConnection>,
    track: Arc<TrackLocalStaticSample>,
}

impl AudioPeer {
    /// Create the peer connection and attach the local audio track.
    ///
    /// Outbound ICE candidates go straight to `signal_tx` as `candidate`
    /// messages; remote media and track arrival go to `event_tx`.
    pub async fn new(signal_tx: SignalSender, event_tx: mpsc::Sender<PeerEvent>) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let api = APIBuilder::new().with_media_engine(m).build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: vec![STUN_SERVER.to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await?);
        info!("created peer connection");

        let track = Arc::new(TrackLocalStaticSample::new(
            webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                ..Default::default()
            },
            "audio".to_string(),
            "parlo".to_string(),
        ));
        pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        pc.on_ice_candidate(Box::new(move |c| {
            let tx = signal_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let label = init.sdp_mline_index.unwrap_or(0).to_string();
                        let _ = tx
                            .send(SignalMessage::Candidate {
                                label,
                                candidate: init.candidate,
                            })
                            .await;
                    }
                    Err(e) => warn!("failed to serialize local candidate: {}", e),
                }
            })
        }));

        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = event_tx.clone();
            Box::pin(async move {
                info!("remote track added: {}", track.id());
                if tx.send(PeerEvent::RemoteTrack).await.is_err() {
                    return;
                }
                loop {
                    match track.read_rtp().await {
                        Ok((pkt, _)) => {
                            let event = PeerEvent::RemoteAudio {
                                payload: pkt.payload,
                                timestamp_us: pkt.header.timestamp as u64,
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("remote track ended: {}", e);
                            break;
                        }
                    }
                }
            })
        }));

        pc.on_peer_connection_state_change(Box::new(|state| {
            info!("peer connection state: {}", state);
            Box::pin(async {})
        }));

        Ok(Self { pc, track })
    }

    /// Build the offer for this call attempt. Gathering does not start
    /// until the offer is installed via [`Self::begin_candidate_gathering`],
    /// so the caller can put the `offer` message on the wire first and no
    /// `candidate` can ever precede it.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription> {
        Ok(self.pc.create_offer(None).await?)
    }

    /// Install the local description and start ICE candidate gathering.
    pub async fn begin_candidate_gathering(&self, offer: RTCSessionDescription) -> Result<()> {
        self.pc.set_local_description(offer).await?;
        Ok(())
    }

    /// Install the remote answer.
    pub async fn apply_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)?;
        self.pc.set_remote_description(answer).await?;
        Ok(())
    }

    /// Hand a remote candidate to ICE. The record is built from exactly the
    /// `label` and `candidate` fields of the signaling message.
    pub async fn add_remote_candidate(&self, label: &str, candidate: String) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate,
            sdp_mid: None,
            sdp_mline_index: label.parse::<u16>().ok(),
            username_fragment: None,
        };
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    /// Push one frame of local capture onto the outbound track.
    pub async fn write_frame(&self, frame: &AudioFrame, frame_ms: u32) -> Result<()> {
        let mut data = Vec::with_capacity(frame.samples.len() * 2);
        for sample in &frame.samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        self.track
            .write_sample(&Sample {
                data: data.into(),
                duration: Duration::from_millis(frame_ms as u64),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}
