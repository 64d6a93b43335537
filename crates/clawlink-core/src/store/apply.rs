// ── Inbound frame application ──
//
// Converts decoded relay frames into domain values and applies them to
// the repository. Called only from the connection task.

use clawlink_api::wire::{EntityChangedFrame, SnapshotFrame, WireMute, WireRule};

use super::StateRepository;
use crate::convert::{entity_from_wire, from_millis, rule_from_wire};
use crate::model::{EntityState, MuteState};

impl StateRepository {
    /// Apply a `cat_state_snapshot` frame.
    pub(crate) fn apply_snapshot_frame(&self, frame: SnapshotFrame) {
        let entities = frame
            .entities
            .into_iter()
            .map(|(name, raw)| entity_from_wire(name, raw))
            .collect();
        let rules = frame.rules.into_iter().filter_map(rule_from_wire).collect();

        self.apply_snapshot(entities, rules, frame.mute.map(MuteState::from));
        self.set_last_outside_at(from_millis(frame.last_outside_at));
    }

    /// Apply a `cat_state_changed` frame. Returns `false` if the entity
    /// is unknown.
    pub(crate) fn apply_entity_changed(&self, frame: &EntityChangedFrame) -> bool {
        let state = EntityState::from_wire(Some(&frame.state));
        let applied = self.apply_delta(&frame.name, state, from_millis(frame.state_set_at));

        if applied && state.is_outside() && frame.state_set_at.is_some() {
            self.set_last_outside_at(from_millis(frame.state_set_at));
        }
        applied
    }

    /// Apply a `rules_changed` frame.
    pub(crate) fn apply_rules_frame(&self, rules: Vec<WireRule>) {
        self.apply_rules(rules.into_iter().filter_map(rule_from_wire).collect());
    }

    /// Apply a `mute_state` or `mute_ack` frame.
    pub(crate) fn apply_mute_frame(&self, mute: WireMute) {
        self.apply_mute(mute.into());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::DateTime;
    use clawlink_api::wire::{WireDelivery, WireEntity};
    use pretty_assertions::assert_eq;
    use tokio::sync::{mpsc, watch};

    use super::*;
    use crate::connection::ConnectionStatus;
    use crate::sender::OutboundSender;

    fn repo() -> StateRepository {
        let (tx, _rx) = mpsc::channel(4);
        let (_status, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        StateRepository::new(OutboundSender::new(tx, status_rx))
    }

    fn snapshot() -> SnapshotFrame {
        SnapshotFrame {
            entities: BTreeMap::from([(
                "Tom".to_owned(),
                WireEntity {
                    state: Some("inside".into()),
                    state_set_at: Some(1000),
                    outdoor_only: false,
                    image: None,
                },
            )]),
            rules: vec![
                WireRule {
                    id: "r1".into(),
                    kind: Some("relative".into()),
                    initial_delay_minutes: Some(30),
                    max_delay_minutes: Some(90),
                    absolute_time: None,
                    message: None,
                    delivery: WireDelivery::default(),
                },
                WireRule {
                    id: "r2".into(),
                    kind: Some("lunar".into()),
                    initial_delay_minutes: None,
                    max_delay_minutes: None,
                    absolute_time: None,
                    message: None,
                    delivery: WireDelivery::default(),
                },
            ],
            last_outside_at: Some(500),
            mute: Some(WireMute { until: Some(9000) }),
        }
    }

    #[test]
    fn snapshot_frame_populates_repository() {
        let repo = repo();
        repo.apply_snapshot_frame(snapshot());

        assert_eq!(repo.entity_count(), 1);
        assert_eq!(repo.rule_count(), 1, "unknown rule kinds are skipped");
        assert_eq!(repo.rule("r1").unwrap().timing.max_delay_minutes, 90);
        assert_eq!(repo.mute().until, DateTime::from_timestamp_millis(9000));
        assert_eq!(repo.last_outside_at(), DateTime::from_timestamp_millis(500));
    }

    #[test]
    fn entity_changed_frame_merges_known_entities_only() {
        let repo = repo();
        repo.apply_snapshot_frame(snapshot());

        let frame = EntityChangedFrame {
            name: "Tom".into(),
            state: "outside".into(),
            state_set_at: Some(2000),
            source: "server".into(),
        };
        assert!(repo.apply_entity_changed(&frame));
        let tom = repo.entity("Tom").unwrap();
        assert_eq!(tom.state, EntityState::Outside);
        assert_eq!(tom.state_set_at, DateTime::from_timestamp_millis(2000));
        assert_eq!(repo.last_outside_at(), DateTime::from_timestamp_millis(2000));

        let stranger = EntityChangedFrame {
            name: "Jerry".into(),
            ..frame
        };
        assert!(!repo.apply_entity_changed(&stranger));
        assert_eq!(repo.entity_count(), 1);
    }
}
