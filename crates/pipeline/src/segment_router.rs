//! C3: Segment Router.
//!
//! Pure dispatcher: for every `AsrSegment`, always publishes a `partial` or
//! `final` event, and fans finals out to the realtime translator, sentence
//! combiner, and paragraph builder, plus queues them for history. Interims
//! go only to the coalescer under the fixed `"original"` slot.

use voice_agent_core::{AsrSegment, EventKind};

use crate::event_bus::EventBus;

pub const ORIGINAL_SLOT: &str = "original";

/// Where a routed segment ends up; the caller (the session driver) performs
/// the actual dispatch since each destination owns different state.
#[derive(Debug, Clone)]
pub enum Routed {
    /// Forward to the coalescer under the fixed `"original"` slot.
    Interim(AsrSegment),
    /// Forward to C4, C7, C8, and C13.
    Final(AsrSegment),
}

pub struct SegmentRouter<'a> {
    bus: &'a EventBus,
}

impl<'a> SegmentRouter<'a> {
    pub fn new(bus: &'a EventBus) -> Self {
        Self { bus }
    }

    /// Publish the segment's own event and return the routing decision for
    /// the caller to act on.
    pub fn route(&self, segment: AsrSegment) -> Routed {
        let kind = if segment.is_final {
            EventKind::Final
        } else {
            EventKind::Partial
        };
        self.bus.publish(
            kind,
            serde_json::json!({
                "id": segment.id,
                "text": segment.text,
                "is_final": segment.is_final,
                "start_ts": segment.start_ts,
                "end_ts": segment.end_ts,
            }),
        );

        if segment.is_final {
            Routed::Final(segment)
        } else {
            Routed::Interim(segment)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn final_segments_route_to_final_fanout() {
        let bus = EventBus::new(Uuid::new_v4());
        let router = SegmentRouter::new(&bus);
        let mut segment = AsrSegment::new("seg-0", "hello", "en");
        segment.is_final = true;

        match router.route(segment) {
            Routed::Final(_) => {}
            Routed::Interim(_) => panic!("expected Final routing"),
        }
    }

    #[test]
    fn interim_segments_route_to_original_slot() {
        let bus = EventBus::new(Uuid::new_v4());
        let router = SegmentRouter::new(&bus);
        let segment = AsrSegment::new("seg-0", "hel", "en");

        match router.route(segment) {
            Routed::Interim(_) => {}
            Routed::Final(_) => panic!("expected Interim routing"),
        }
    }
}
