// ── State repository ──
//
// The authoritative local view of relay state: tracked entities, rules
// and mute. Inbound snapshots and deltas are applied by the connection
// task; local intents are sent through the `OutboundSender`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use clawlink_api::OutboundMessage;
use clawlink_api::wire::WireRule;

use super::collection::KeyedCollection;
use crate::convert::to_millis;
use crate::error::CoreError;
use crate::model::{EntityState, MuteState, Rule, TrackedEntity};
use crate::sender::OutboundSender;
use crate::stream::{EntitySubscription, RuleSubscription, Subscription};

/// Local view of entities, rules and mute state.
///
/// Reads never block and always return the current snapshot. Mutations
/// notify subscribers through `watch` channels.
pub struct StateRepository {
    pub(crate) entities: KeyedCollection<TrackedEntity>,
    pub(crate) rules: KeyedCollection<Rule>,
    pub(crate) mute: watch::Sender<MuteState>,
    pub(crate) last_outside_at: watch::Sender<Option<DateTime<Utc>>>,
    sender: OutboundSender,
}

impl StateRepository {
    pub fn new(sender: OutboundSender) -> Self {
        let (mute, _) = watch::channel(MuteState::default());
        let (last_outside_at, _) = watch::channel(None);

        Self {
            entities: KeyedCollection::new(),
            rules: KeyedCollection::new(),
            mute,
            last_outside_at,
            sender,
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Replace every entity and rule. `mute`, when present, is assigned.
    pub fn apply_snapshot(
        &self,
        entities: Vec<TrackedEntity>,
        rules: Vec<Rule>,
        mute: Option<MuteState>,
    ) {
        let entity_count = entities.len();
        let rule_count = rules.len();

        self.entities
            .replace_all(entities.into_iter().map(|e| (e.name.clone(), e)));
        self.rules
            .replace_all(rules.into_iter().map(|r| (r.id.clone(), r)));
        if let Some(mute) = mute {
            self.mute.send_replace(mute);
        }

        info!(entities = entity_count, rules = rule_count, "snapshot applied");
    }

    /// Merge a state change into a known entity. Returns `false`, leaving
    /// everything untouched, if `name` has not been seen in a snapshot.
    pub fn apply_delta(
        &self,
        name: &str,
        state: EntityState,
        state_set_at: Option<DateTime<Utc>>,
    ) -> bool {
        let applied = self
            .entities
            .update_existing(name, |entity| entity.with_state(state, state_set_at));

        if applied {
            debug!(entity = name, %state, "entity state updated");
        } else {
            debug!(entity = name, %state, "delta for unknown entity dropped");
        }
        applied
    }

    /// Replace the rule collection without touching entities.
    pub fn apply_rules(&self, rules: Vec<Rule>) {
        let count = rules.len();
        self.rules
            .replace_all(rules.into_iter().map(|r| (r.id.clone(), r)));
        debug!(rules = count, "rules replaced");
    }

    /// Assign the mute state reported by the relay.
    pub fn apply_mute(&self, mute: MuteState) {
        self.mute.send_replace(mute);
    }

    pub(crate) fn set_last_outside_at(&self, at: Option<DateTime<Utc>>) {
        self.last_outside_at.send_replace(at);
    }

    // ── Optimistic intents ───────────────────────────────────────────

    /// Ask the relay to change an entity's state and apply the change
    /// locally straight away, stamped with local time.
    ///
    /// The local update happens even when the send fails; the send error
    /// is still returned. A later snapshot corrects any divergence.
    pub fn request_entity_state_change(
        &self,
        name: &str,
        state: EntityState,
    ) -> Result<(), CoreError> {
        let Some(entity) = self.entities.get(name) else {
            return Err(CoreError::EntityNotFound {
                name: name.to_owned(),
            });
        };
        if entity.locked {
            warn!(entity = name, "editing a locked entity");
        }

        let sent = self.sender.send(OutboundMessage::EntityUpdate {
            cat_name: name.to_owned(),
            state: state.as_wire().to_owned(),
        });
        if let Err(ref e) = sent {
            warn!(entity = name, error = %e, "state change not sent; applied locally only");
        }

        self.apply_delta(name, state, Some(Utc::now()));
        sent
    }

    /// Mute notifications until `until` (`None` unmutes), applied
    /// locally straight away. Same failure policy as
    /// [`request_entity_state_change`](Self::request_entity_state_change).
    pub fn request_mute(&self, until: Option<DateTime<Utc>>) -> Result<(), CoreError> {
        let sent = self.sender.send(OutboundMessage::SetMute {
            until: to_millis(until),
        });
        if let Err(ref e) = sent {
            warn!(error = %e, "mute change not sent; applied locally only");
        }

        self.mute.send_replace(MuteState { until });
        sent
    }

    // ── Rule requests (no local mutation) ───────────────────────────

    pub fn add_rule(&self, rule: &Rule) -> Result<(), CoreError> {
        rule.validate()?;
        self.sender.send(OutboundMessage::AddRule {
            rule: WireRule::from(rule),
        })
    }

    pub fn update_rule(&self, rule: &Rule) -> Result<(), CoreError> {
        rule.validate()?;
        self.require_rule(&rule.id)?;
        self.sender.send(OutboundMessage::UpdateRule {
            rule: WireRule::from(rule),
        })
    }

    pub fn remove_rule(&self, id: &str) -> Result<(), CoreError> {
        self.require_rule(id)?;
        self.sender.send(OutboundMessage::RemoveRule { id: id.to_owned() })
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All entities, ordered by name.
    pub fn entities(&self) -> Arc<Vec<Arc<TrackedEntity>>> {
        self.entities.snapshot()
    }

    pub fn entity(&self, name: &str) -> Option<Arc<TrackedEntity>> {
        self.entities.get(name)
    }

    pub fn subscribe_entities(&self) -> EntitySubscription {
        Subscription::new(self.entities.subscribe())
    }

    /// All rules, ordered by id.
    pub fn rules(&self) -> Arc<Vec<Arc<Rule>>> {
        self.rules.snapshot()
    }

    pub fn rule(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.get(id)
    }

    pub fn subscribe_rules(&self) -> RuleSubscription {
        Subscription::new(self.rules.subscribe())
    }

    pub fn mute(&self) -> MuteState {
        *self.mute.borrow()
    }

    pub fn subscribe_mute(&self) -> watch::Receiver<MuteState> {
        self.mute.subscribe()
    }

    /// When an entity last went outside, as reported by the relay.
    pub fn last_outside_at(&self) -> Option<DateTime<Utc>> {
        *self.last_outside_at.borrow()
    }

    pub fn subscribe_last_outside_at(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_outside_at.subscribe()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Entities currently outside.
    pub fn outside(&self) -> Vec<Arc<TrackedEntity>> {
        self.entities
            .snapshot()
            .iter()
            .filter(|e| e.state.is_outside())
            .cloned()
            .collect()
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn require_rule(&self, id: &str) -> Result<(), CoreError> {
        if self.rules.contains(id) {
            Ok(())
        } else {
            Err(CoreError::RuleNotFound { id: id.to_owned() })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::ConnectionStatus;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    struct Harness {
        repo: StateRepository,
        sent: mpsc::Receiver<OutboundMessage>,
        status: watch::Sender<ConnectionStatus>,
    }

    fn harness() -> Harness {
        let (tx, sent) = mpsc::channel(16);
        let (status, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        Harness {
            repo: StateRepository::new(OutboundSender::new(tx, status_rx)),
            sent,
            status,
        }
    }

    fn at(millis: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
    }

    fn entity(name: &str, state: EntityState, millis: i64) -> TrackedEntity {
        TrackedEntity {
            name: name.into(),
            state,
            state_set_at: at(millis),
            locked: false,
            image: None,
        }
    }

    #[test]
    fn local_edit_during_snapshot_finds_known_entity() {
        let h = harness();
        let repo = Arc::new(h.repo);
        let cats = || -> Vec<TrackedEntity> {
            (0..200)
                .map(|i| entity(&format!("cat{i:03}"), EntityState::Inside, 1000))
                .collect()
        };
        repo.apply_snapshot(cats(), vec![], None);

        let relay = {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    repo.apply_snapshot(cats(), vec![], None);
                }
            })
        };
        let mut not_found = 0;
        while !relay.is_finished() {
            // Disconnected, so the send fails, but the lookup must not.
            if let Err(CoreError::EntityNotFound { .. }) =
                repo.request_entity_state_change("cat199", EntityState::Outside)
            {
                not_found += 1;
            }
        }
        relay.join().unwrap();

        assert_eq!(not_found, 0);
        assert_eq!(repo.entity_count(), 200);
    }

    #[test]
    fn snapshot_then_delta() {
        let h = harness();
        h.repo
            .apply_snapshot(vec![entity("Tom", EntityState::Inside, 1000)], vec![], None);
        assert!(h.repo.apply_delta("Tom", EntityState::Outside, at(2000)));

        let entities = h.repo.entities();
        assert_eq!(entities.len(), 1);
        assert_eq!(*entities[0], entity("Tom", EntityState::Outside, 2000));
    }

    #[test]
    fn delta_for_unknown_entity_is_a_noop() {
        let h = harness();
        h.repo
            .apply_snapshot(vec![entity("Tom", EntityState::Inside, 1000)], vec![], None);
        let sub = h.repo.subscribe_entities();
        let before = h.repo.entities();

        assert!(!h.repo.apply_delta("Jerry", EntityState::Outside, at(2000)));

        assert_eq!(h.repo.entities(), before);
        assert!(h.repo.entity("Jerry").is_none());
        assert!(sub.latest().iter().all(|e| e.name != "Jerry"));
        assert_eq!(sub.seen().len(), 1);
    }

    #[test]
    fn snapshot_replaces_everything_and_assigns_mute() {
        let h = harness();
        let rule = Rule::repeating(30, 120);
        h.repo.apply_snapshot(
            vec![entity("Tom", EntityState::Inside, 1)],
            vec![rule.clone()],
            Some(MuteState { until: at(5000) }),
        );

        h.repo
            .apply_snapshot(vec![entity("Felix", EntityState::Outside, 2)], vec![], None);

        assert!(h.repo.entity("Tom").is_none());
        assert!(h.repo.entity("Felix").is_some());
        assert_eq!(h.repo.rule_count(), 0);
        // Absent mute leaves the previous value in place.
        assert_eq!(h.repo.mute().until, at(5000));

        h.repo.apply_snapshot(vec![], vec![], Some(MuteState::unmuted()));
        assert_eq!(h.repo.mute(), MuteState::unmuted());
    }

    #[test]
    fn entities_are_sorted_by_name() {
        let h = harness();
        h.repo.apply_snapshot(
            vec![
                entity("Zelda", EntityState::Inside, 1),
                entity("Adam", EntityState::Outside, 1),
                entity("Milo", EntityState::Unknown, 1),
            ],
            vec![],
            None,
        );
        let names: Vec<String> = h.repo.entities().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["Adam", "Milo", "Zelda"]);
        assert_eq!(h.repo.outside().len(), 1);
    }

    #[test]
    fn optimistic_change_applies_while_disconnected() {
        let mut h = harness();
        h.repo
            .apply_snapshot(vec![entity("Tom", EntityState::Inside, 1000)], vec![], None);

        let before = Utc::now();
        let result = h.repo.request_entity_state_change("Tom", EntityState::Outside);
        assert!(matches!(result, Err(CoreError::NotConnected)));

        let tom = h.repo.entity("Tom").unwrap();
        assert_eq!(tom.state, EntityState::Outside);
        assert!(tom.state_set_at.unwrap() >= before - Duration::seconds(1));
        assert!(h.sent.try_recv().is_err());
    }

    #[test]
    fn optimistic_change_is_sent_when_registered() {
        let mut h = harness();
        h.repo
            .apply_snapshot(vec![entity("Tom", EntityState::Inside, 1000)], vec![], None);
        h.status.send_replace(ConnectionStatus::Registered);

        h.repo
            .request_entity_state_change("Tom", EntityState::Outside)
            .unwrap();
        assert_eq!(
            h.sent.try_recv().unwrap(),
            OutboundMessage::EntityUpdate {
                cat_name: "Tom".into(),
                state: "outside".into(),
            }
        );
    }

    #[test]
    fn unknown_entity_change_sends_nothing() {
        let mut h = harness();
        h.status.send_replace(ConnectionStatus::Registered);
        assert!(matches!(
            h.repo.request_entity_state_change("Ghost", EntityState::Inside),
            Err(CoreError::EntityNotFound { .. })
        ));
        assert!(h.sent.try_recv().is_err());
    }

    #[test]
    fn locked_entities_can_still_be_edited() {
        let h = harness();
        let mut tom = entity("Tom", EntityState::Outside, 1);
        tom.locked = true;
        h.repo.apply_snapshot(vec![tom], vec![], None);

        let _ = h.repo.request_entity_state_change("Tom", EntityState::Inside);
        assert_eq!(h.repo.entity("Tom").unwrap().state, EntityState::Inside);
    }

    #[test]
    fn mute_is_optimistic() {
        let mut h = harness();
        let until = Utc::now() + Duration::hours(1);

        assert!(h.repo.request_mute(Some(until)).is_err());
        assert!(h.repo.mute().is_active());

        h.status.send_replace(ConnectionStatus::Registered);
        h.repo.request_mute(None).unwrap();
        assert!(!h.repo.mute().is_active());
        assert_eq!(
            h.sent.try_recv().unwrap(),
            OutboundMessage::SetMute { until: None }
        );
    }

    #[test]
    fn rule_requests_do_not_touch_local_rules() {
        let mut h = harness();
        h.status.send_replace(ConnectionStatus::Registered);
        let rule = Rule::repeating(30, 120);

        h.repo.add_rule(&rule).unwrap();
        assert_eq!(h.repo.rule_count(), 0);
        assert!(matches!(
            h.sent.try_recv().unwrap(),
            OutboundMessage::AddRule { .. }
        ));

        assert!(matches!(
            h.repo.remove_rule(&rule.id),
            Err(CoreError::RuleNotFound { .. })
        ));

        h.repo.apply_rules(vec![rule.clone()]);
        h.repo.remove_rule(&rule.id).unwrap();
        assert_eq!(h.repo.rule_count(), 1, "removal waits for confirmation");
        assert_eq!(
            h.sent.try_recv().unwrap(),
            OutboundMessage::RemoveRule { id: rule.id.clone() }
        );
    }

    #[test]
    fn invalid_rules_are_rejected_before_sending() {
        let mut h = harness();
        h.status.send_replace(ConnectionStatus::Registered);

        let bad = Rule::repeating(500, 60);
        assert!(matches!(
            h.repo.add_rule(&bad),
            Err(CoreError::ValidationFailed { .. })
        ));
        assert!(h.sent.try_recv().is_err());
    }
}
