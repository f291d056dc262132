use crate::config::validate_autosave_interval;
use crate::{TrackerContext, output};
use anyhow::Result;
use colored::Colorize;

/// Shows or changes the autosave settings stored in the configuration file.
///
/// `toggle` is `Some(true)` for `--enable`, `Some(false)` for `--disable`.
/// With neither a toggle nor an interval the current settings are printed.
/// A running `snaptrack watch` session picks changes up on its next start;
/// use its `autosave` command to change a live session.
///
/// # Errors
///
/// Returns an error if the interval is outside 1-60 minutes or the
/// configuration cannot be written.
pub fn execute(ctx: &TrackerContext, toggle: Option<bool>, interval: Option<u64>) -> Result<()> {
    let current = &ctx.config.schedule;

    if toggle.is_none() && interval.is_none() {
        let state = if current.autosave_enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("autosave: {state}");
        println!("interval: {} minute(s)", current.autosave_interval_minutes);
        return Ok(());
    }

    if let Some(minutes) = interval {
        validate_autosave_interval(minutes)?;
    }

    let mut config = ctx.config.clone();
    if let Some(enabled) = toggle {
        config.schedule.autosave_enabled = enabled;
    }
    if let Some(minutes) = interval {
        config.schedule.autosave_interval_minutes = minutes;
    }
    config.save(&ctx.config_path)?;

    let schedule = &config.schedule;
    if schedule.autosave_enabled {
        output::success(&format!(
            "Autosave enabled every {} minute(s)",
            schedule.autosave_interval_minutes
        ));
    } else {
        output::success(&format!(
            "Autosave disabled (interval {} minute(s))",
            schedule.autosave_interval_minutes
        ));
    }
    output::verbose(&format!("Updated {}", ctx.config_path.display()));
    Ok(())
}
