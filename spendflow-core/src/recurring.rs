//! Detect transactions that repeat on a regular cadence.
//!
//! Best-effort clustering by name and amount similarity, then an interval
//! regularity check. False positives and negatives are acceptable; the
//! output is informational and recomputed per analysis run.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::transaction::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "quarterly")]
    Quarterly,
    #[serde(rename = "yearly")]
    Yearly,
}

impl Frequency {
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Weekly => "Weekly",
            Frequency::BiWeekly => "Bi-weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Quarterly => "Quarterly",
            Frequency::Yearly => "Yearly",
        }
    }
}

/// A cluster of similar transactions judged to recur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringGroup {
    pub name: String,
    /// Members ordered by date ascending; always >= 3.
    pub transactions: Vec<TransactionRecord>,
    pub average_amount: f64,
    pub frequency: Frequency,
    /// Rounded mean interval between consecutive members, in days
    pub frequency_days: i64,
    /// 0..1 score from count, interval regularity, and amount stability
    pub confidence: f64,
    pub next_expected_date: Option<NaiveDate>,
}

impl RecurringGroup {
    /// Projected yearly spend at the observed cadence.
    pub fn annual_cost(&self) -> f64 {
        if self.frequency_days <= 0 {
            return 0.0;
        }
        self.average_amount * (365.0 / self.frequency_days as f64)
    }
}

/// Name similarity in 0..1: exact (case/whitespace-insensitive) is 1.0,
/// containment is 0.8, otherwise normalized Levenshtein.
fn name_similarity(a: &str, b: &str) -> f64 {
    let s1 = a.trim().to_lowercase();
    let s2 = b.trim().to_lowercase();

    if s1 == s2 {
        return 1.0;
    }
    if s1.contains(&s2) || s2.contains(&s1) {
        return 0.8;
    }

    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&s1, &s2);
    (max_len - distance) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut curr = vec![0usize; a.len() + 1];

    for (i, &bc) in b.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &ac) in a.iter().enumerate() {
            let substitution = prev[j] + usize::from(ac != bc);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[a.len()]
}

fn classify_frequency(avg_days: f64) -> Frequency {
    match avg_days {
        d if (5.0..=9.0).contains(&d) => Frequency::Weekly,
        d if (12.0..=16.0).contains(&d) => Frequency::BiWeekly,
        d if (28.0..=33.0).contains(&d) => Frequency::Monthly,
        d if (85.0..=95.0).contains(&d) => Frequency::Quarterly,
        d if (350.0..=380.0).contains(&d) => Frequency::Yearly,
        _ => Frequency::Monthly,
    }
}

/// Weighted score: member count (up to 6 saturates), interval regularity,
/// amount stability (deviation as percent of the average).
fn confidence_score(interval_variance: f64, amount_variance_pct: f64, count: usize) -> f64 {
    let count_score = (count as f64 / 6.0).min(1.0);
    let interval_score = (1.0 - interval_variance / 10.0).max(0.0);
    let amount_score = (1.0 - amount_variance_pct / 50.0).max(0.0);
    count_score * 0.3 + interval_score * 0.4 + amount_score * 0.3
}

/// Cluster `records` into recurring groups, highest confidence first.
///
/// Greedy single pass: each record seeds a group and claims every later
/// unclaimed record whose name similarity is >= 0.7 and whose amount is
/// within 10% of the seed's. Groups need >= 3 members and a mean absolute
/// interval deviation under 15 days to qualify.
pub fn detect_recurring(records: &[TransactionRecord]) -> Vec<RecurringGroup> {
    let mut valid: Vec<&TransactionRecord> = records
        .iter()
        .filter(|r| r.date.is_some() && r.cost > 0.0)
        .collect();
    valid.sort_by_key(|r| r.date);

    let mut grouped = vec![false; valid.len()];
    let mut groups = Vec::new();

    for i in 0..valid.len() {
        if grouped[i] {
            continue;
        }
        let seed = valid[i];
        let mut members = vec![seed];
        grouped[i] = true;

        for j in (i + 1)..valid.len() {
            if grouped[j] {
                continue;
            }
            let other = valid[j];
            let similarity = name_similarity(&seed.name, &other.name);
            let amount_diff = (seed.cost - other.cost).abs() / seed.cost;
            if similarity >= 0.7 && amount_diff <= 0.1 {
                members.push(other);
                grouped[j] = true;
            }
        }

        if members.len() < 3 {
            continue;
        }

        let intervals: Vec<f64> = members
            .windows(2)
            .map(|w| {
                let d1 = w[0].date.unwrap_or_default();
                let d2 = w[1].date.unwrap_or_default();
                (d2 - d1).num_days().unsigned_abs() as f64
            })
            .collect();
        let avg_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let interval_variance = intervals
            .iter()
            .map(|v| (v - avg_interval).abs())
            .sum::<f64>()
            / intervals.len() as f64;

        // Irregular cadence, not a recurring charge
        if interval_variance >= 15.0 {
            continue;
        }

        let avg_amount =
            members.iter().map(|m| m.cost).sum::<f64>() / members.len() as f64;
        let amount_variance = members
            .iter()
            .map(|m| (m.cost - avg_amount).abs())
            .sum::<f64>()
            / members.len() as f64;

        let frequency_days = avg_interval.round() as i64;
        let next_expected_date = members
            .last()
            .and_then(|m| m.date)
            .and_then(|d| d.checked_add_days(Days::new(frequency_days.max(0) as u64)));

        groups.push(RecurringGroup {
            name: seed.name.clone(),
            transactions: members.into_iter().cloned().collect(),
            average_amount: avg_amount,
            frequency: classify_frequency(avg_interval),
            frequency_days,
            confidence: confidence_score(
                interval_variance,
                amount_variance / avg_amount * 100.0,
                intervals.len() + 1,
            ),
            next_expected_date,
        });
    }

    groups.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    groups
}

/// Find the group a transaction belongs to.
///
/// Matches on full record equality rather than the source-assigned
/// `index` alone: CSV-derived records all default to index "0", so the
/// index by itself is not a usable identity.
pub fn find_group_for<'a>(
    record: &TransactionRecord,
    groups: &'a [RecurringGroup],
) -> Option<&'a RecurringGroup> {
    groups
        .iter()
        .find(|g| g.transactions.iter().any(|t| t == record))
}
