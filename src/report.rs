use std::collections::HashMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::models::{CohortTierStats, EliteWeekRecord, MemberTier, TierLevel};

/// Members ordered strongest tier first, then by name.
pub fn rank_members<'a>(
    members: &'a [MemberTier],
    names: &HashMap<Uuid, String>,
) -> Vec<(&'a MemberTier, String)> {
    let mut ranked: Vec<(&MemberTier, String)> = members
        .iter()
        .map(|m| {
            let name = names
                .get(&m.user_id)
                .cloned()
                .unwrap_or_else(|| m.user_id.to_string());
            (m, name)
        })
        .collect();

    ranked.sort_by(|a, b| b.0.tier.cmp(&a.0.tier).then_with(|| a.1.cmp(&b.1)));
    ranked
}

pub fn build_report(
    cohort: &str,
    stats: &CohortTierStats,
    names: &HashMap<Uuid, String>,
    history: &[EliteWeekRecord],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cohort Tier Report");
    let _ = writeln!(
        output,
        "Generated for {} (week of {})",
        cohort, stats.week_start
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Tier Mix");

    for tier in TierLevel::ALL.iter().rev() {
        let _ = writeln!(output, "- {}: {} members", tier, stats.tier_counts.get(*tier));
    }
    let _ = writeln!(
        output,
        "- Average tier: {} (score {:.2})",
        stats.weighted_average_tier, stats.weighted_average_score
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Elite Week");
    let status = if stats.elite_week_achieved {
        "achieved"
    } else {
        "not yet"
    };
    let _ = writeln!(
        output,
        "{} of {} members at elite, {} needed: {}",
        stats.elite_member_count, stats.total_members, stats.members_required, status
    );
    let _ = writeln!(
        output,
        "Elite weeks on record: {}",
        stats.historical_elite_week_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Member Standings");

    for (member, name) in rank_members(&stats.members, names) {
        let _ = writeln!(output, "- {} ({})", name, member.tier);
    }

    if !stats.skipped_members.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Skipped Members");
        for skipped in &stats.skipped_members {
            let name = names
                .get(&skipped.user_id)
                .cloned()
                .unwrap_or_else(|| skipped.user_id.to_string());
            let _ = writeln!(output, "- {}: {}", name, skipped.reason);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Weeks");

    if history.is_empty() {
        let _ = writeln!(output, "No elite week results recorded yet.");
    } else {
        for week in history {
            let _ = writeln!(
                output,
                "- {}: {}/{} elite{}",
                week.week_start,
                week.members_completed,
                week.members_required,
                if week.elite_week_achieved {
                    " (elite week)"
                } else {
                    ""
                }
            );
        }
    }

    output
}
