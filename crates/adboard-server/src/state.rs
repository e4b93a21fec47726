use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use tokio::sync::broadcast;

use adboard_core::actor::{ActorId, CapabilitySet, SystemClock};
use adboard_core::config::Config;
use adboard_core::service::{AdService, Broadcaster, Notice, Notifier};

/// Capability names arrive from the fronting auth layer in this header,
/// comma separated.
pub const CAPS_HEADER: &str = "x-adboard-caps";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One event on the fan-out channel feeding SSE subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    /// A confirmed or admin ad, delivered to everyone — or, when `audience`
    /// is set, only to subscribers holding that capability.
    Broadcast {
        source: ActorId,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audience: Option<String>,
    },
    /// A notice addressed to a single actor.
    Notice { actor: ActorId, notice: Notice },
    /// A notice for every holder of a capability (staff alerts).
    StaffNotice { audience: String, notice: Notice },
}

impl Envelope {
    pub fn event_name(&self) -> &'static str {
        match self {
            Envelope::Broadcast { .. } => "broadcast",
            Envelope::Notice { .. } | Envelope::StaffNotice { .. } => "notice",
        }
    }

    /// Should this envelope reach a subscriber identified by `viewer` with
    /// `caps`?
    pub fn visible_to(&self, viewer: Option<ActorId>, caps: &CapabilitySet) -> bool {
        match self {
            Envelope::Broadcast { audience: None, .. } => true,
            Envelope::Broadcast {
                audience: Some(required),
                ..
            } => caps.has(required),
            Envelope::Notice { actor, .. } => viewer == Some(*actor),
            Envelope::StaffNotice { audience, .. } => caps.has(audience),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBridge
// ---------------------------------------------------------------------------

/// Bridges the core's notifier/broadcaster seams onto the SSE fan-out
/// channel. A failed send means nobody is subscribed at all, which is the
/// closest this transport gets to "actor unreachable".
pub struct EventBridge {
    pub tx: broadcast::Sender<Envelope>,
}

impl Notifier for EventBridge {
    fn tell(&self, actor: ActorId, notice: Notice) -> bool {
        self.tx.send(Envelope::Notice { actor, notice }).is_ok()
    }

    fn alert(&self, capability: &str, notice: Notice) {
        let _ = self.tx.send(Envelope::StaffNotice {
            audience: capability.to_string(),
            notice,
        });
    }
}

impl Broadcaster for EventBridge {
    fn broadcast(&self, source: ActorId, message: &str, audience: Option<&str>) {
        let _ = self.tx.send(Envelope::Broadcast {
            source,
            message: message.to_string(),
            audience: audience.map(str::to_string),
        });
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AdService>,
    pub event_tx: broadcast::Sender<Envelope>,
    pub config_path: Arc<PathBuf>,
}

impl AppState {
    /// Wire the event channel through the core seams and start the service.
    pub async fn init(config: Config, config_path: PathBuf) -> anyhow::Result<Self> {
        let (event_tx, _) = broadcast::channel(256);
        let bridge = Arc::new(EventBridge {
            tx: event_tx.clone(),
        });
        let service = AdService::start(
            config,
            Arc::clone(&bridge) as Arc<dyn Notifier>,
            bridge as Arc<dyn Broadcaster>,
            Arc::new(SystemClock),
        )
        .await?;

        Ok(Self {
            service: Arc::new(service),
            event_tx,
            config_path: Arc::new(config_path),
        })
    }
}

// ---------------------------------------------------------------------------
// Capability extraction
// ---------------------------------------------------------------------------

pub fn caps_from_headers(headers: &HeaderMap) -> CapabilitySet {
    headers
        .get(CAPS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use adboard_core::actor::caps;
    use axum::http::HeaderValue;

    #[test]
    fn caps_header_is_split_and_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CAPS_HEADER,
            HeaderValue::from_static("adboard.use, adboard.bypass ,,"),
        );
        let caps_set = caps_from_headers(&headers);
        assert!(caps_set.has(caps::USE));
        assert!(caps_set.has(caps::BYPASS));
        assert!(!caps_set.has(caps::ADMIN));
    }

    #[test]
    fn missing_header_means_no_capabilities() {
        assert!(caps_from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn broadcast_visibility_respects_audience() {
        let source = ActorId::new();
        let everyone = Envelope::Broadcast {
            source,
            message: "hello".into(),
            audience: None,
        };
        let staff_only = Envelope::Broadcast {
            source,
            message: "hello".into(),
            audience: Some(caps::REVIEW.to_string()),
        };

        let nobody = CapabilitySet::new();
        let staff: CapabilitySet = [caps::REVIEW].into_iter().collect();

        assert!(everyone.visible_to(None, &nobody));
        assert!(!staff_only.visible_to(None, &nobody));
        assert!(staff_only.visible_to(None, &staff));
    }

    #[test]
    fn notices_only_reach_their_actor() {
        let actor = ActorId::new();
        let envelope = Envelope::Notice {
            actor,
            notice: Notice::Cancelled,
        };
        assert!(envelope.visible_to(Some(actor), &CapabilitySet::new()));
        assert!(!envelope.visible_to(Some(ActorId::new()), &CapabilitySet::new()));
        assert!(!envelope.visible_to(None, &CapabilitySet::new()));
    }
}
