use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::media::{MediaRoute, RouteEvent, RouteEventKind, RouteId, RouteSpec, RouteState, RouteStats};
use anyhow::{Context, Result};
use async_trait::async_trait;
use edgecast_core::SdpKind;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_H264, MediaEngine as RtcMediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::util::MarshalSize;

const STATS_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RTP_PACKET: usize = 1500;

#[derive(Default)]
struct RouteCounters {
    bytes_sent: AtomicU64,
    packets_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_received: AtomicU64,
}

impl RouteCounters {
    fn snapshot(&self) -> RouteStats {
        RouteStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
        }
    }
}

/// One viewer's peer connection, fed with RTP the media pipeline pushes to
/// the route's UDP port.
pub(crate) struct RtpRoute {
    id: RouteId,
    peer_connection: Arc<RTCPeerConnection>,
    counters: Arc<RouteCounters>,
    shutdown: CancellationToken,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl RtpRoute {
    pub(crate) async fn open(
        spec: RouteSpec,
        config: &MediaConfig,
        events: mpsc::Sender<RouteEvent>,
    ) -> Result<Self> {
        let RouteSpec { id, source, port } = spec;

        // Bind first so a busy port fails before any peer connection exists.
        let bind_ip: IpAddr = config
            .rtp_bind_address
            .parse()
            .with_context(|| format!("Bad RTP bind address '{}'", config.rtp_bind_address))?;
        let socket = UdpSocket::bind((bind_ip, port))
            .await
            .with_context(|| format!("Failed to bind RTP port {port}"))?;

        let mut m = RtcMediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: config.ice_servers.clone(),
                credential: String::new(),
                username: String::new(),
            }],
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_owned(),
                ..Default::default()
            },
            format!("{}-{}", source.device, source.stream_type).to_lowercase(),
            "edgecast".to_owned(),
        ));

        let rtp_sender = match peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
        {
            Ok(sender) => sender,
            Err(e) => {
                let _ = peer_connection.close().await;
                return Err(e).context("Failed to add video track");
            }
        };

        let counters = Arc::new(RouteCounters::default());
        let shutdown = CancellationToken::new();

        let state_tx = events.clone();
        let state_id = id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let route = state_id.clone();

                Box::pin(async move {
                    info!("Peer connection state for {route}: {s}");
                    let state = match s {
                        RTCPeerConnectionState::New | RTCPeerConnectionState::Connecting => {
                            RouteState::Connecting
                        }
                        RTCPeerConnectionState::Connected => RouteState::Connected,
                        RTCPeerConnectionState::Disconnected => RouteState::Disconnected,
                        RTCPeerConnectionState::Failed => RouteState::Failed,
                        RTCPeerConnectionState::Closed => RouteState::Closed,
                        RTCPeerConnectionState::Unspecified => return,
                    };
                    post_event(&tx, RouteEvent::new(route, RouteEventKind::StateChanged(state)));
                })
            },
        ));

        let ice_tx = events.clone();
        let ice_id = id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let route = ice_id.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let kind = RouteEventKind::IceCandidate {
                    candidate: init.candidate,
                    mline_index: init.sdp_mline_index.unwrap_or(0),
                };
                post_event(&tx, RouteEvent::new(route, kind));
            })
        }));

        // RTCP has to be drained for the interceptors to work. It is also the only
        // thing a viewer sends back, so it makes up the receive counters.
        let rtcp_counters = Arc::clone(&counters);
        let rtcp_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_RTP_PACKET];
            loop {
                tokio::select! {
                    _ = rtcp_shutdown.cancelled() => break,
                    read = rtp_sender.read(&mut buf) => match read {
                        Ok((packets, _)) => {
                            let bytes: usize = packets.iter().map(|p| p.marshal_size()).sum();
                            rtcp_counters.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
                            rtcp_counters.packets_received.fetch_add(packets.len() as u64, Ordering::Relaxed);
                        }
                        Err(_) => break,
                    },
                }
            }
        });

        let forwarder = tokio::spawn(forward_rtp(
            id.clone(),
            socket,
            track,
            Arc::clone(&counters),
            events,
            shutdown.clone(),
        ));

        debug!("Route {id} listening for RTP on {bind_ip}:{port}");

        Ok(Self {
            id,
            peer_connection,
            counters,
            shutdown,
            forwarder: Mutex::new(Some(forwarder)),
        })
    }

    pub(crate) fn id(&self) -> &RouteId {
        &self.id
    }

    async fn apply_remote(&self, kind: SdpKind, sdp: String) -> Result<Option<String>> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;

        if kind == SdpKind::Answer {
            return Ok(None);
        }

        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(Some(answer.sdp))
    }
}

#[async_trait]
impl MediaRoute for RtpRoute {
    async fn create_offer(&self) -> Result<String, MediaError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| MediaError::Negotiation(e.to_string()))?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| MediaError::Negotiation(e.to_string()))?;
        Ok(offer.sdp)
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<Option<String>, MediaError> {
        self.apply_remote(kind, sdp)
            .await
            .map_err(|e| MediaError::Negotiation(format!("{e:#}")))
    }

    async fn add_ice_candidate(
        &self,
        candidate: String,
        mline_index: u16,
    ) -> Result<(), MediaError> {
        let init = RTCIceCandidateInit {
            candidate,
            sdp_mline_index: Some(mline_index),
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| MediaError::Negotiation(e.to_string()))
    }

    async fn close(&self) {
        self.shutdown.cancel();
        // The port goes back to the pool right after this returns, so the
        // socket has to be gone by then.
        let forwarder = self.forwarder.lock().await.take();
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }
        if let Err(e) = self.peer_connection.close().await {
            warn!("Closing route {} failed: {e}", self.id);
        }
    }

    fn stats(&self) -> RouteStats {
        self.counters.snapshot()
    }
}

/// Copy RTP packets from the route's port onto the outgoing track.
async fn forward_rtp(
    id: RouteId,
    socket: UdpSocket,
    track: Arc<TrackLocalStaticRTP>,
    counters: Arc<RouteCounters>,
    events: mpsc::Sender<RouteEvent>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_RTP_PACKET];
    let mut ticker = tokio::time::interval(STATS_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                // Never block here: close() waits for this task.
                let stats = RouteEventKind::Stats(counters.snapshot());
                if let Err(mpsc::error::TrySendError::Closed(_)) =
                    events.try_send(RouteEvent::new(id.clone(), stats))
                {
                    break;
                }
            }
            received = socket.recv_from(&mut buf) => {
                let n = match received {
                    Ok((n, _)) => n,
                    Err(e) => {
                        let reason = format!("RTP socket error: {e}");
                        let _ = events.try_send(RouteEvent::new(id.clone(), RouteEventKind::Failed(reason)));
                        break;
                    }
                };
                match track.write(&buf[..n]).await {
                    Ok(written) => {
                        counters.bytes_sent.fetch_add(written as u64, Ordering::Relaxed);
                        counters.packets_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(webrtc::Error::ErrClosedPipe) => break,
                    Err(e) => debug!("Route {id}: dropped RTP packet: {e}"),
                }
            }
        }
    }

    debug!("RTP forwarder for {id} stopped");
}

/// Queue a connection callback event without waiting. `close()` runs the
/// callbacks inline while the registry pump, the only consumer, may be the
/// caller.
fn post_event(tx: &mpsc::Sender<RouteEvent>, event: RouteEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!(
                "Route event queue full, dropped {:?} for {}",
                event.kind, event.route
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
