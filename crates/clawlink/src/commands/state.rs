//! `state` and `set` handlers.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use clawlink_core::{EntityState, MuteState, Rule, RuleKind, TrackedEntity};

use super::{Context, Session, one_shot, print_json};
use crate::cli::SetArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StateView<'a> {
    entities: Vec<&'a TrackedEntity>,
    rules: Vec<&'a Rule>,
    mute: MuteState,
    last_outside_at: Option<DateTime<Utc>>,
}

pub async fn show(ctx: &Context) -> Result<(), CliError> {
    let session = Session::open(ctx).await?;
    let repo = session.client.repository().clone();
    session.close().await;

    let entities = repo.entities();
    let rules = repo.rules();
    let view = StateView {
        entities: entities.iter().map(Arc::as_ref).collect(),
        rules: rules.iter().map(Arc::as_ref).collect(),
        mute: repo.mute(),
        last_outside_at: repo.last_outside_at(),
    };

    if ctx.json {
        return print_json(&view);
    }
    print!("{}", render_state(&view, Utc::now()));
    Ok(())
}

pub async fn set(args: SetArgs, ctx: &Context) -> Result<(), CliError> {
    let state = EntityState::from(args.state);
    one_shot(ctx, |client| client.set_entity_state(&args.name, state)).await?;
    eprintln!("{} is now {state}", args.name);
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────

fn render_state(view: &StateView<'_>, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    if view.entities.is_empty() {
        out.push_str("No tracked entities.\n");
    }
    let width = view.entities.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entity in &view.entities {
        let lock = if entity.locked { " (locked)" } else { "" };
        let _ = write!(out, "{:<width$}  {:<7}", entity.name, entity.state.as_ref());
        if let Some(at) = entity.state_set_at {
            let _ = write!(out, "  since {}", local_time(at));
        }
        let _ = writeln!(out, "{lock}");
    }

    if let Some(at) = view.last_outside_at {
        let _ = writeln!(out, "\nLast went outside: {}", local_time(at));
    }

    out.push('\n');
    match view.mute.until {
        Some(until) if view.mute.is_active_at(now) => {
            let _ = writeln!(out, "Notifications muted until {}", local_time(until));
        }
        _ => out.push_str("Notifications active\n"),
    }

    if !view.rules.is_empty() {
        out.push_str("\nRules:\n");
        for rule in &view.rules {
            let _ = writeln!(out, "  {}", describe_rule(rule));
        }
    }
    out
}

pub(crate) fn describe_rule(rule: &Rule) -> String {
    let timing = match (rule.kind, rule.timing.absolute_time) {
        (RuleKind::Absolute, Some(at)) => format!("daily at {}", at.format("%H:%M")),
        (RuleKind::Absolute, None) => "daily (no time set)".to_owned(),
        (RuleKind::Repeating, _) => format!(
            "after {} min, backing off to {} min",
            rule.timing.initial_delay_minutes, rule.timing.max_delay_minutes
        ),
    };
    format!("{}  {timing}  \"{}\"", rule.id, rule.message)
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone};

    fn entity(name: &str, state: EntityState, locked: bool) -> TrackedEntity {
        TrackedEntity {
            name: name.into(),
            state,
            state_set_at: None,
            locked,
            image: None,
        }
    }

    #[test]
    fn renders_entities_mute_and_rules() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let tom = entity("Tom", EntityState::Outside, false);
        let felix = entity("Felix", EntityState::Inside, true);
        let mut rule = Rule::absolute(NaiveTime::from_hms_opt(21, 30, 0).unwrap());
        rule.id = "r1".into();

        let view = StateView {
            entities: vec![&felix, &tom],
            rules: vec![&rule],
            mute: MuteState::until(now + Duration::hours(1)),
            last_outside_at: None,
        };
        let out = render_state(&view, now);

        assert!(out.contains("Tom    outside"));
        assert!(out.contains("Felix  inside  (locked)"));
        assert!(out.contains("Notifications muted until"));
        assert!(out.contains("r1  daily at 21:30"));
    }

    #[test]
    fn expired_mute_reads_as_active() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let view = StateView {
            entities: Vec::new(),
            rules: Vec::new(),
            mute: MuteState::until(now - Duration::minutes(1)),
            last_outside_at: None,
        };
        let out = render_state(&view, now);
        assert!(out.contains("No tracked entities."));
        assert!(out.contains("Notifications active"));
    }

    #[test]
    fn repeating_rule_description() {
        let mut rule = Rule::repeating(30, 120);
        rule.id = "r2".into();
        assert_eq!(
            describe_rule(&rule),
            "r2  after 30 min, backing off to 120 min  \"{cats} have been outside.\""
        );
    }
}
