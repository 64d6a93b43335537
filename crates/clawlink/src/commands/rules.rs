//! `rules` handlers. The relay owns the rule list; changes show up in
//! the next `rules_changed` push, not locally.

use std::sync::Arc;

use clawlink_core::model::{DEFAULT_INITIAL_DELAY_MINUTES, DEFAULT_MAX_DELAY_MINUTES, parse_hh_mm};
use clawlink_core::Rule;

use super::state::describe_rule;
use super::{Context, Session, one_shot, print_json};
use crate::cli::{RuleAddArgs, RulesArgs, RulesCommand};
use crate::error::CliError;

pub async fn handle(args: RulesArgs, ctx: &Context) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List => list(ctx).await,
        RulesCommand::Add(add) => {
            let rule = build_rule(&add)?;
            one_shot(ctx, |client| client.add_rule(&rule)).await?;
            eprintln!("requested rule {}", rule.id);
            Ok(())
        }
        RulesCommand::Remove { id } => {
            one_shot(ctx, |client| client.remove_rule(&id)).await?;
            eprintln!("requested removal of rule {id}");
            Ok(())
        }
    }
}

async fn list(ctx: &Context) -> Result<(), CliError> {
    let session = Session::open(ctx).await?;
    let rules = session.client.rules();
    session.close().await;

    if ctx.json {
        let rules: Vec<&Rule> = rules.iter().map(Arc::as_ref).collect();
        return print_json(&rules);
    }
    if rules.is_empty() {
        println!("No rules.");
    }
    for rule in &*rules {
        println!("{}", describe_rule(rule));
    }
    Ok(())
}

fn build_rule(args: &RuleAddArgs) -> Result<Rule, CliError> {
    let mut rule = match args.at.as_deref() {
        Some(raw) => Rule::absolute(parse_hh_mm(raw).ok_or_else(|| CliError::Validation {
            field: "at".into(),
            reason: format!("expected HH:MM, got '{raw}'"),
        })?),
        None => {
            let after = args.after.unwrap_or(DEFAULT_INITIAL_DELAY_MINUTES);
            let max = args.max.unwrap_or(DEFAULT_MAX_DELAY_MINUTES.max(after));
            Rule::repeating(after, max)
        }
    };
    if let Some(message) = args.message.as_deref().filter(|m| !m.trim().is_empty()) {
        rule.message = message.to_owned();
    }
    rule.validate()?;
    Ok(rule)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clawlink_core::RuleKind;

    fn add(after: Option<u32>, max: Option<u32>, at: Option<&str>) -> RuleAddArgs {
        RuleAddArgs {
            after,
            max,
            at: at.map(str::to_owned),
            message: None,
        }
    }

    #[test]
    fn repeating_defaults() {
        let rule = build_rule(&add(None, None, None)).unwrap();
        assert_eq!(rule.kind, RuleKind::Repeating);
        assert_eq!(rule.timing.initial_delay_minutes, DEFAULT_INITIAL_DELAY_MINUTES);
        assert_eq!(rule.timing.max_delay_minutes, DEFAULT_MAX_DELAY_MINUTES);
    }

    #[test]
    fn long_initial_delay_raises_default_ceiling() {
        let rule = build_rule(&add(Some(500), None, None)).unwrap();
        assert_eq!(rule.timing.max_delay_minutes, 500);
    }

    #[test]
    fn inverted_delays_fail_validation() {
        assert!(matches!(
            build_rule(&add(Some(90), Some(30), None)),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn daily_rule_with_message() {
        let mut args = add(None, None, Some("21:30"));
        args.message = Some("{cats} still out".into());
        let rule = build_rule(&args).unwrap();
        assert_eq!(rule.kind, RuleKind::Absolute);
        assert_eq!(rule.message, "{cats} still out");
        assert!(build_rule(&add(None, None, Some("9pm"))).is_err());
    }
}
