//! Link statistics command

use colored::Colorize;
use std::sync::Arc;

use crate::cli::CliError;
use crate::services::AnalyticsService;
use crate::storage::{LinkDirectory, SeaOrmStorage};

/// Print click statistics for a single link
pub async fn link_stats(
    storage: Arc<SeaOrmStorage>,
    link_id: String,
    start: Option<String>,
    end: Option<String>,
    include_bots: bool,
) -> Result<(), CliError> {
    let link = storage
        .find_link(&link_id)
        .await
        .map_err(|e| CliError::StorageError(e.to_string()))?;
    let Some(link) = link else {
        println!("{} Link not found: {}", "ℹ".bold().blue(), link_id.cyan());
        return Ok(());
    };

    let (range_start, range_end) =
        AnalyticsService::parse_date_range_strict(start.as_deref(), end.as_deref())
            .map_err(|e| CliError::ParseError(e.to_string()))?;

    let service = AnalyticsService::new(storage);
    let stats = service
        .get_link_stats(&link_id, range_start, range_end, include_bots)
        .await
        .map_err(|e| CliError::CommandError(e.to_string()))?;

    println!(
        "{} {} {}",
        "Link stats:".bold().green(),
        link_id.cyan(),
        format!("({})", link.title).dimmed()
    );
    println!(
        "  {}: {}",
        "Total clicks".cyan(),
        stats.total_clicks.to_string().green()
    );

    if stats.total_clicks == 0 {
        println!("{} No clicks recorded in this range", "ℹ".bold().blue());
        return Ok(());
    }

    if !stats.clicks_over_time.is_empty() {
        println!();
        println!("{}", "Daily clicks:".bold().green());
        for point in &stats.clicks_over_time {
            println!("  {}  {}", point.date.dimmed(), point.clicks);
        }
    }

    if !stats.clicks_by_country.is_empty() {
        println!();
        println!("{}", "Countries:".bold().green());
        for row in &stats.clicks_by_country {
            println!("  {}  {}", row.country.cyan(), row.clicks);
        }
    }

    if !stats.clicks_by_device.is_empty() {
        println!();
        println!("{}", "Devices:".bold().green());
        for row in &stats.clicks_by_device {
            println!("  {}  {}", row.device.cyan(), row.clicks);
        }
    }

    if !stats.clicks_by_browser.is_empty() {
        println!();
        println!("{}", "Browsers:".bold().green());
        for row in &stats.clicks_by_browser {
            println!("  {}  {}", row.browser.cyan(), row.clicks);
        }
    }

    if !stats.referrers.is_empty() {
        println!();
        println!("{}", "Referrers:".bold().green());
        for referrer in &stats.referrers {
            println!("  {}", referrer.blue().underline());
        }
    }

    Ok(())
}
