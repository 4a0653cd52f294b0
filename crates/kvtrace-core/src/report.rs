use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::message::MessageId;
use crate::reconcile::ReportData;

/// How the "unanswered" counts are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnansweredCount {
    /// `requests - responses`; may be negative when responses repeat.
    #[default]
    Subtraction,
    /// Size of the set of request ids with no response id.
    SetDifference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub get_requests: usize,
    pub get_responses: usize,
    pub put_requests: usize,
    pub put_responses: usize,
    pub unanswered_gets: i64,
    pub unanswered_puts: i64,
    pub get_failures: usize,
    pub redirects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    /// `sorted[count / 2]`: the upper middle element for even counts.
    pub median: f64,
}

impl LatencyStats {
    /// Returns `None` for an empty slice. `sorted` must be ascending.
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        Some(Self {
            count: sorted.len(),
            min,
            max,
            median: sorted[sorted.len() / 2],
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub counts: Counts,
    pub unanswered_gets: BTreeSet<MessageId>,
    pub unanswered_puts: BTreeSet<MessageId>,
    pub repeated_gets: BTreeSet<MessageId>,
    pub repeated_puts: BTreeSet<MessageId>,
    pub redirects: Vec<MessageId>,
    pub get_failures: Vec<MessageId>,
    /// Distinct PUT ids issued.
    pub put_ids: usize,
    /// `executing PUT` lines, re-issues included.
    pub total_puts: usize,
    pub orphan_completions: usize,
    pub latencies: Vec<f64>,
    pub latency: Option<LatencyStats>,
}

impl Report {
    pub fn derive(data: &ReportData, unanswered: UnansweredCount) -> Self {
        let unanswered_gets = set_difference(&data.get_requests, &data.get_responses);
        let unanswered_puts = set_difference(&data.put_requests, &data.put_responses);

        let count_unanswered = |requests: &[MessageId],
                                responses: &[MessageId],
                                set: &BTreeSet<MessageId>| match unanswered {
            UnansweredCount::Subtraction => requests.len() as i64 - responses.len() as i64,
            UnansweredCount::SetDifference => set.len() as i64,
        };

        let counts = Counts {
            get_requests: data.get_requests.len(),
            get_responses: data.get_responses.len(),
            put_requests: data.put_requests.len(),
            put_responses: data.put_responses.len(),
            unanswered_gets: count_unanswered(
                &data.get_requests,
                &data.get_responses,
                &unanswered_gets,
            ),
            unanswered_puts: count_unanswered(
                &data.put_requests,
                &data.put_responses,
                &unanswered_puts,
            ),
            get_failures: data.get_failures.len(),
            redirects: data.redirects.len(),
        };

        let mut latencies: Vec<f64> = data
            .put_timings
            .values()
            .filter_map(|t| t.latency())
            .collect();
        latencies.sort_by(f64::total_cmp);
        let latency = LatencyStats::from_sorted(&latencies);

        Self {
            counts,
            unanswered_gets,
            unanswered_puts,
            repeated_gets: repeated(&data.get_responses),
            repeated_puts: repeated(&data.put_responses),
            redirects: data.redirects.clone(),
            get_failures: data.get_failures.clone(),
            put_ids: data.put_timings.len(),
            total_puts: data.total_puts,
            orphan_completions: data.orphan_completions,
            latencies,
            latency,
        }
    }
}

fn set_difference(requests: &[MessageId], responses: &[MessageId]) -> BTreeSet<MessageId> {
    let answered: BTreeSet<&MessageId> = responses.iter().collect();
    requests
        .iter()
        .filter(|id| !answered.contains(id))
        .cloned()
        .collect()
}

fn repeated(ids: &[MessageId]) -> BTreeSet<MessageId> {
    let mut freq: HashMap<&MessageId, usize> = HashMap::new();
    for id in ids {
        *freq.entry(id).or_insert(0) += 1;
    }
    freq.into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Reconciler;

    fn mid(n: usize) -> String {
        format!("{n:016}")
    }

    fn derive(lines: &[String]) -> Report {
        let data = Reconciler::default().accumulate(lines).unwrap();
        Report::derive(&data, UnansweredCount::Subtraction)
    }

    #[test]
    fn test_single_put_latency() {
        let report = derive(&[
            "0000001 executing PUT mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000005 completed PUT mid: AAAAAAAAAAAAAAAA".to_string(),
        ]);
        assert_eq!(report.put_ids, 1);
        assert_eq!(report.latencies, vec![4.0]);
        let stats = report.latency.unwrap();
        assert_eq!(stats.median, 4.0);
        assert_eq!(stats.min, 4.0);
        assert_eq!(stats.max, 4.0);
    }

    #[test]
    fn test_empty_report() {
        let report = derive(&[]);
        assert_eq!(report.counts, Counts::default());
        assert!(report.unanswered_gets.is_empty());
        assert!(report.unanswered_puts.is_empty());
        assert!(report.latencies.is_empty());
        assert!(report.latency.is_none());
    }

    #[test]
    fn test_unanswered_puts_count_matches_missing_completions() {
        let n = 10;
        let m = 6;
        let mut lines: Vec<String> = (0..n)
            .map(|i| format!("{:07} executing PUT mid: {}", i, mid(i)))
            .collect();
        lines.extend((0..m).map(|i| format!("{:07} completed PUT mid: {}", i + 20, mid(i))));

        let report = derive(&lines);
        assert_eq!(report.unanswered_puts.len(), n - m);
        assert_eq!(report.counts.unanswered_puts, (n - m) as i64);
        assert!(report.unanswered_puts.contains(&MessageId::new(mid(9))));
        assert!(!report.unanswered_puts.contains(&MessageId::new(mid(0))));
        assert_eq!(report.latency.unwrap().count, m);
    }

    #[test]
    fn test_repeated_put_responses() {
        let report = derive(&[
            "0000001 executing PUT mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000002 executing PUT mid: BBBBBBBBBBBBBBBB".to_string(),
            "0000003 completed PUT mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000004 completed PUT mid: BBBBBBBBBBBBBBBB".to_string(),
            "0000005 completed PUT mid: AAAAAAAAAAAAAAAA".to_string(),
        ]);
        let expected: BTreeSet<MessageId> = [MessageId::from("AAAAAAAAAAAAAAAA")].into();
        assert_eq!(report.repeated_puts, expected);
        assert!(report.repeated_gets.is_empty());
        // Naive subtraction goes negative when responses repeat.
        assert_eq!(report.counts.unanswered_puts, -1);
    }

    #[test]
    fn test_set_difference_count() {
        let lines = [
            "0000001 executing GET mid: AAAAAAAAAAAAAAAA",
            "0000002 executing GET mid: BBBBBBBBBBBBBBBB",
            "0000003 completed GET mid: AAAAAAAAAAAAAAAA",
            "0000004 completed GET mid: AAAAAAAAAAAAAAAA",
        ];
        let data = Reconciler::default().accumulate(lines).unwrap();

        let naive = Report::derive(&data, UnansweredCount::Subtraction);
        assert_eq!(naive.counts.unanswered_gets, 0);

        let exact = Report::derive(&data, UnansweredCount::SetDifference);
        assert_eq!(exact.counts.unanswered_gets, 1);
        assert_eq!(
            exact.unanswered_gets.iter().next().unwrap().as_str(),
            "BBBBBBBBBBBBBBBB"
        );
    }

    #[test]
    fn test_median_uses_upper_middle() {
        let stats = LatencyStats::from_sorted(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.count, 4);

        let odd = LatencyStats::from_sorted(&[1.0, 5.0, 9.0]).unwrap();
        assert_eq!(odd.median, 5.0);
        assert!(LatencyStats::from_sorted(&[]).is_none());
    }

    #[test]
    fn test_latencies_sorted_and_incomplete_excluded() {
        let report = derive(&[
            "0000001 executing PUT mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000002 executing PUT mid: BBBBBBBBBBBBBBBB".to_string(),
            "0000003 executing PUT mid: CCCCCCCCCCCCCCCC".to_string(),
            "0000010 completed PUT mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000004 completed PUT mid: BBBBBBBBBBBBBBBB".to_string(),
        ]);
        assert_eq!(report.latencies, vec![2.0, 9.0]);
        assert_eq!(report.put_ids, 3);
        assert_eq!(report.total_puts, 3);
        assert_eq!(report.latency.unwrap().median, 9.0);
    }

    #[test]
    fn test_completion_before_issue_kept() {
        let report = derive(&[
            "0000009 executing PUT mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000005 completed PUT mid: AAAAAAAAAAAAAAAA".to_string(),
        ]);
        assert_eq!(report.latencies, vec![-4.0]);
        let stats = report.latency.unwrap();
        assert_eq!(stats.min, -4.0);
        assert_eq!(stats.median, -4.0);
    }

    #[test]
    fn test_redirects_keep_order_and_duplicates() {
        let report = derive(&[
            "0000001 redirecting to n2 mid: BBBBBBBBBBBBBBBB".to_string(),
            "0000002 redirecting to n3 mid: AAAAAAAAAAAAAAAA".to_string(),
            "0000003 redirecting to n2 mid: BBBBBBBBBBBBBBBB".to_string(),
        ]);
        let ids: Vec<&str> = report.redirects.iter().map(MessageId::as_str).collect();
        assert_eq!(
            ids,
            vec!["BBBBBBBBBBBBBBBB", "AAAAAAAAAAAAAAAA", "BBBBBBBBBBBBBBBB"]
        );
        assert_eq!(report.counts.redirects, 3);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let lines: Vec<String> = (0..50)
            .flat_map(|i| {
                [
                    format!("{:07} executing GET mid: {}", i, mid(i % 7)),
                    format!("{:07} completed GET mid: {}", i + 1, mid(i % 5)),
                ]
            })
            .collect();
        assert_eq!(derive(&lines), derive(&lines));
    }
}
