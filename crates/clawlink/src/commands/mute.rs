//! `mute` handler.

use chrono::{DateTime, Days, Duration, Local, TimeZone, Utc};

use clawlink_core::model::parse_hh_mm;

use super::{Context, one_shot};
use crate::cli::MuteArgs;
use crate::error::CliError;

pub async fn handle(args: MuteArgs, ctx: &Context) -> Result<(), CliError> {
    let until = mute_deadline(&args, Local::now())?;

    one_shot(ctx, |client| client.request_mute(until)).await?;

    match until {
        Some(at) => eprintln!(
            "notifications muted until {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => eprintln!("notifications unmuted"),
    }
    Ok(())
}

/// Absolute deadline for the requested mute; `None` unmutes.
fn mute_deadline<Tz: TimeZone>(
    args: &MuteArgs,
    now: DateTime<Tz>,
) -> Result<Option<DateTime<Utc>>, CliError> {
    if args.off {
        return Ok(None);
    }
    if let Some(minutes) = args.minutes {
        return Ok(Some(now.with_timezone(&Utc) + Duration::minutes(i64::from(minutes))));
    }

    let raw = args.until.as_deref().unwrap_or_default();
    let at = parse_hh_mm(raw).ok_or_else(|| CliError::Validation {
        field: "until".into(),
        reason: format!("expected HH:MM, got '{raw}'"),
    })?;

    let tz = now.timezone();
    let mut day = now.date_naive();
    let mut deadline = tz.from_local_datetime(&day.and_time(at)).earliest();
    if deadline.as_ref().is_none_or(|d| *d <= now) {
        day = day.checked_add_days(Days::new(1)).unwrap_or(day);
        deadline = tz.from_local_datetime(&day.and_time(at)).earliest();
    }

    deadline
        .map(|d| Some(d.with_timezone(&Utc)))
        .ok_or_else(|| CliError::Validation {
            field: "until".into(),
            reason: format!("{raw} does not exist in the local timezone"),
        })
}
