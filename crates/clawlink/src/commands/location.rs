//! `location` handlers.

use chrono::Utc;

use clawlink_core::{LocationReport, Motion};

use super::{Context, one_shot};
use crate::cli::{FixArgs, LocationArgs, LocationCommand};
use crate::error::CliError;

pub async fn handle(args: LocationArgs, ctx: &Context) -> Result<(), CliError> {
    match args.command {
        LocationCommand::Report(fix) => {
            let fix = report(&fix)?;
            one_shot(ctx, |client| client.report_location(&fix)).await?;
            eprintln!("location reported");
        }
        LocationCommand::Save { name, fix } => {
            let fix = report(&fix)?;
            one_shot(ctx, |client| client.save_named_location(&name, &fix)).await?;
            eprintln!("location '{name}' saved");
        }
        LocationCommand::Tracking { enabled } => {
            one_shot(ctx, |client| client.set_location_tracking(enabled)).await?;
            eprintln!("location tracking {}", if enabled { "on" } else { "off" });
        }
    }
    Ok(())
}

fn report(args: &FixArgs) -> Result<LocationReport, CliError> {
    if !(-90.0..=90.0).contains(&args.lat) {
        return Err(CliError::Validation {
            field: "lat".into(),
            reason: format!("{} is outside -90..=90", args.lat),
        });
    }
    if !(-180.0..=180.0).contains(&args.lng) {
        return Err(CliError::Validation {
            field: "lng".into(),
            reason: format!("{} is outside -180..=180", args.lng),
        });
    }

    Ok(LocationReport {
        lat: args.lat,
        lng: args.lng,
        accuracy: args.accuracy.filter(|a| a.is_finite() && *a >= 0.0),
        altitude: None,
        wifi: Vec::new(),
        motion: Motion::Stationary,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fix(lat: f64, lng: f64, accuracy: Option<f32>) -> FixArgs {
        FixArgs { lat, lng, accuracy }
    }

    #[test]
    fn builds_stationary_report() {
        let report = report(&fix(52.37, 4.89, Some(12.5))).unwrap();
        assert_eq!(report.motion, Motion::Stationary);
        assert!(report.accuracy.is_some_and(|a| (a - 12.5).abs() < f32::EPSILON));
        assert!(report.wifi.is_empty());
    }

    #[test]
    fn negative_accuracy_is_dropped() {
        assert_eq!(report(&fix(0.0, 0.0, Some(-1.0))).unwrap().accuracy, None);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(report(&fix(91.0, 0.0, None)).is_err());
        assert!(report(&fix(0.0, -181.0, None)).is_err());
    }
}
