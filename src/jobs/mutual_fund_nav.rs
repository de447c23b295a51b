use chrono::Utc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::JobStats;
use crate::database::{PortfolioStore, StoreResult};
use crate::providers::NavProvider;
use crate::types::SecurityType;

pub const JOB_NAME: &str = "mutual_fund_nav";

const PLAN_WORDS: [&str; 4] = ["direct", "regular", "growth", "idcw"];

/// Reduces a stored fund name to something the scheme search matches on.
///
/// Drops an exchange suffix (`.BSE`/`.NSE`), an `MF<digits>` code prefix,
/// everything from a `- Direct|Regular|Growth|IDCW` plan marker onwards and
/// the outermost parenthesised group.
pub fn clean_fund_name(name: &str) -> String {
    let mut s = name.to_string();

    let lower = s.to_ascii_lowercase();
    if lower.ends_with(".bse") || lower.ends_with(".nse") {
        s.truncate(s.len() - 4);
    }

    let bytes = s.as_bytes();
    if bytes.len() > 2 && bytes[..2].eq_ignore_ascii_case(b"mf") && bytes[2].is_ascii_digit() {
        let digits = bytes[2..].iter().take_while(|b| b.is_ascii_digit()).count();
        s = s[2 + digits..].to_string();
    }

    if let Some(cut) = plan_marker(&s) {
        s.truncate(cut);
    }

    if let Some(open) = s.find('(') {
        if let Some(close) = s.rfind(')') {
            if close > open {
                s.replace_range(open..=close, "");
            }
        }
    }

    s.trim().to_string()
}

// Byte offset of the first '-' followed by optional whitespace and a plan word
fn plan_marker(s: &str) -> Option<usize> {
    s.match_indices('-').map(|(i, _)| i).find(|&i| {
        let rest = s[i + 1..].trim_start().to_ascii_lowercase();
        PLAN_WORDS.iter().any(|word| rest.starts_with(word))
    })
}

/// Refreshes `last_price` for mutual funds with the latest NAV.
///
/// Each fund is looked up by its cleaned name and the first match is used.
/// Funds without a match or with a non-positive NAV are skipped.
pub async fn run(store: &dyn PortfolioStore, navs: &dyn NavProvider) -> StoreResult<JobStats> {
    let started = Instant::now();
    let funds = store.securities_by_type(&[SecurityType::MutualFund]).await?;
    let mut stats = JobStats::new(funds.len());

    if funds.is_empty() {
        info!("No mutual funds to update");
        return Ok(stats);
    }

    if !navs.is_configured() {
        warn!(provider = navs.name(), "NAV provider not configured, skipping mutual fund update");
        stats.skipped = stats.total;
        return Ok(stats);
    }

    for fund in &funds {
        let query = clean_fund_name(&fund.name);

        let scheme = match navs.search_scheme(&query).await {
            Ok(Some(scheme)) => scheme,
            Ok(None) => {
                debug!(fund = %fund.name, query = %query, "No scheme found");
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(fund = %fund.name, error = %e, "Scheme search failed");
                stats.errors += 1;
                continue;
            }
        };

        let nav = match navs.latest_nav(&scheme.scheme_code).await {
            Ok(nav) if nav.is_finite() && nav > 0.0 => nav,
            Ok(nav) => {
                debug!(fund = %fund.name, nav, "Ignoring non-positive NAV");
                stats.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(fund = %fund.name, scheme_code = %scheme.scheme_code, error = %e, "NAV fetch failed");
                stats.errors += 1;
                continue;
            }
        };

        match store.update_security_price(fund.id, nav, Utc::now()).await {
            Ok(()) => stats.updated += 1,
            Err(e) => {
                error!(fund = %fund.name, error = %e, "Failed to store NAV");
                stats.errors += 1;
            }
        }
    }

    info!("Updated {}/{} funds", stats.updated, stats.total);
    stats.elapsed = started.elapsed();
    Ok(stats)
}
