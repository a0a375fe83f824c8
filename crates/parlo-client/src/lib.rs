pub mod call;
pub mod peer;
pub mod signaling;

pub use call::{run_call, run_call_with_media, CallConfig, CapturerFactory, RendererFactory};
pub use peer::{AudioPeer, PeerEvent};
pub use signaling::{SignalReceiver, SignalSender, SignalingChannel};
