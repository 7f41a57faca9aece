//! Status dashboard rendering
//!
//! Plain-text dashboard printed by `cache-warmer status`: aggregate
//! statistics, the most recently warmed URLs, recent failures, and the
//! per-sitemap fetch log.

use crate::storage::{WarmStats, WarmStore};
use crate::Result;
use chrono::Utc;

const URL_WIDTH_RECENT: usize = 50;
const URL_WIDTH_FAILED: usize = 45;
const URL_WIDTH_SITEMAP: usize = 55;
const ERROR_WIDTH: usize = 30;
const TIMESTAMP_WIDTH: usize = 19;
const RULE_WIDTH: usize = 70;

/// Prints the full status dashboard to stdout
pub fn print_status(
    store: &WarmStore,
    recent_limit: u32,
    failed_limit: u32,
    config_path: &str,
    db_path: &str,
) -> Result<()> {
    let stats = store.stats()?;

    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("   CACHE WARMER DASHBOARD");
    println!("{}", "=".repeat(RULE_WIDTH));

    print_statistics(&stats);
    print_recent(store, recent_limit)?;
    print_failures(store, failed_limit)?;
    print_sitemaps(store)?;

    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("  Config: {}", config_path);
    println!("  Database: {}", db_path);
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();

    Ok(())
}

/// Prints the flush confirmation block after `cache-warmer flush`
pub fn print_flush_confirmation(store: &WarmStore, reason: &str) -> Result<()> {
    let stats = store.stats()?;

    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("   CACHE FLUSH MARKED");
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();
    println!("  Reason: {}", reason);
    println!("  Time:   {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("  Current stats:");
    println!("     Total URLs warmed: {}", stats.warmed_total);
    println!("     Will be re-warmed on next run!");
    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();

    Ok(())
}

fn print_statistics(stats: &WarmStats) {
    println!("\nSTATISTICS");
    println!("{}", "-".repeat(RULE_WIDTH));
    println!("  Total URLs Warmed:    {}", stats.warmed_total);
    println!("  Successful (2xx-3xx): {}", stats.ok_total);
    println!("  Failed (4xx-5xx):     {}", stats.err_total);
    match &stats.last_flush_utc {
        Some(ts) => println!("  Last Cache Flush:     {}", ts),
        None => println!("  Last Cache Flush:     Never"),
    }
}

fn print_recent(store: &WarmStore, limit: u32) -> Result<()> {
    println!("\nRECENTLY WARMED ({} most recent)", limit);
    println!("{}", "-".repeat(RULE_WIDTH));

    let recent = store.recent_warmed(limit)?;
    if recent.is_empty() {
        println!("  (No URLs warmed yet)");
        return Ok(());
    }

    for row in recent {
        let marker = if row.is_ok() { "ok  " } else { "FAIL" };
        println!(
            "  {} [{}] {} | {}",
            marker,
            row.last_status,
            truncate_timestamp(&row.last_warmed_utc),
            truncate(&row.url, URL_WIDTH_RECENT)
        );
    }
    Ok(())
}

fn print_failures(store: &WarmStore, limit: u32) -> Result<()> {
    println!("\nRECENT FAILURES ({} most recent)", limit);
    println!("{}", "-".repeat(RULE_WIDTH));

    let failed = store.failed(limit)?;
    if failed.is_empty() {
        println!("  (No failures)");
        return Ok(());
    }

    for row in failed {
        let error = row.last_error.as_deref().unwrap_or("(no error msg)");
        println!(
            "  FAIL [{}] {}",
            row.last_status,
            truncate_timestamp(&row.last_warmed_utc)
        );
        println!("     URL: {}", truncate(&row.url, URL_WIDTH_FAILED));
        println!("     Error: {}", truncate(error, ERROR_WIDTH));
    }
    Ok(())
}

fn print_sitemaps(store: &WarmStore) -> Result<()> {
    println!("\nSITEMAP STATUS");
    println!("{}", "-".repeat(RULE_WIDTH));

    let sitemaps = store.sitemap_status()?;
    if sitemaps.is_empty() {
        println!("  (No sitemaps fetched yet)");
        return Ok(());
    }

    for row in sitemaps {
        let marker = if row.is_ok() { "ok  " } else { "FAIL" };
        println!(
            "  {} {} | {}",
            marker,
            truncate_timestamp(&row.last_fetched_utc),
            truncate(&row.sitemap_url, URL_WIDTH_SITEMAP)
        );
        if let Some(error) = &row.last_error {
            println!("     Error: {}", error);
        }
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let cut = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_len.saturating_sub(3))
        .last()
        .unwrap_or(0);
    format!("{}...", &s[..cut])
}

fn truncate_timestamp(s: &str) -> &str {
    if s.len() >= TIMESTAMP_WIDTH && s.is_char_boundary(TIMESTAMP_WIDTH) {
        &s[..TIMESTAMP_WIDTH]
    } else {
        s
    }
}
