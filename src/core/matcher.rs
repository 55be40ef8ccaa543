use crate::core::descriptor::Descriptor;
use crate::core::record::{Account, EnrollmentRecord};

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub account: Account,
    pub distance: f32,
}

/// Accounts matched by one capture, deduplicated by username and kept in the
/// order they were first found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSet {
    results: Vec<MatchResult>,
}

impl MatchSet {
    fn insert(&mut self, result: MatchResult) -> bool {
        if self.contains(&result.account.username) {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn contains(&self, username: &str) -> bool {
        self.results.iter().any(|r| r.account.username == username)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn first(&self) -> Option<&MatchResult> {
        self.results.first()
    }

    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }

    pub fn usernames(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.account.username.as_str()).collect()
    }
}

/// Threshold matcher over a full snapshot of enrollment records.
///
/// A record is a candidate for a probe when any of its descriptors lies
/// strictly closer than the threshold. The scan of a record stops at the
/// first qualifying descriptor, so the reported distance is that one and not
/// necessarily the record's closest. All candidate records are reported; there
/// is no ranking between them.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Distance of the first stored descriptor under the threshold.
    pub fn first_qualifying(&self, probe: &Descriptor, record: &EnrollmentRecord) -> Option<f32> {
        for stored in &record.descriptors {
            match probe.distance(stored) {
                Some(distance) => {
                    tracing::debug!("{}: distance {:.4}", record.username(), distance);
                    if distance < self.threshold {
                        return Some(distance);
                    }
                }
                None => tracing::warn!(
                    "Skipping descriptor of {} with length {} (probe has {})",
                    record.username(), stored.len(), probe.len()
                ),
            }
        }
        None
    }

    pub fn match_probe(&self, probe: &Descriptor, records: &[EnrollmentRecord]) -> Vec<MatchResult> {
        records
            .iter()
            .filter_map(|record| {
                self.first_qualifying(probe, record).map(|distance| MatchResult {
                    account: record.account.clone(),
                    distance,
                })
            })
            .collect()
    }

    /// Union of the per-probe matches for every face in a capture.
    pub fn match_capture(&self, probes: &[Descriptor], records: &[EnrollmentRecord]) -> MatchSet {
        let mut set = MatchSet::default();
        for (index, probe) in probes.iter().enumerate() {
            for result in self.match_probe(probe, records) {
                tracing::debug!("Face #{} matched {} at {:.4}",
                    index, result.account.username, result.distance);
                set.insert(result);
            }
        }
        tracing::info!("{} face(s) matched {} account(s) against {} record(s)",
            probes.len(), set.len(), records.len());
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIM: usize = 512;

    fn unit(index: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[index] = 1.0;
        v
    }

    fn offset(mut base: Vec<f32>, index: usize, delta: f32) -> Vec<f32> {
        base[index] += delta;
        base
    }

    fn record(username: &str, descriptors: Vec<Vec<f32>>) -> EnrollmentRecord {
        EnrollmentRecord {
            account: Account::new(username, username.to_uppercase()),
            descriptors: descriptors.into_iter().map(Descriptor::from_vec).collect(),
        }
    }

    #[test]
    fn empty_records_match_nothing() {
        let matcher = Matcher::default();
        let set = matcher.match_capture(&[Descriptor::from_vec(unit(0))], &[]);
        assert!(set.is_empty());
    }

    #[test]
    fn empty_probe_list_matches_nothing() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![unit(0)])];
        assert!(matcher.match_capture(&[], &records).is_empty());
    }

    #[test]
    fn identical_descriptor_always_matches() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![unit(0)])];
        let set = matcher.match_capture(&[Descriptor::from_vec(unit(0))], &records);

        assert_eq!(set.usernames(), vec!["alice"]);
        assert_eq!(set.first().unwrap().distance, 0.0);
    }

    #[test]
    fn distance_above_threshold_is_rejected() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![unit(0)])];
        let probe = Descriptor::from_vec(offset(unit(0), 1, 0.5));

        assert!(matcher.match_capture(&[probe], &records).is_empty());
    }

    #[test]
    fn threshold_is_strict() {
        let matcher = Matcher::new(0.5);
        let records = vec![record("alice", vec![unit(0)])];
        let probe = Descriptor::from_vec(offset(unit(0), 1, 0.5));

        assert!(matcher.match_capture(&[probe], &records).is_empty());
    }

    #[test]
    fn near_identical_accounts_are_both_reported() {
        let matcher = Matcher::default();
        let center = unit(0);
        let records = vec![
            record("alice", vec![offset(center.clone(), 1, 0.05)]),
            record("bob", vec![offset(center.clone(), 1, -0.05)]),
        ];
        let height = (0.3f32 * 0.3 - 0.05 * 0.05).sqrt();
        let probe = Descriptor::from_vec(offset(center, 2, height));

        let set = matcher.match_capture(&[probe], &records);
        assert_eq!(set.usernames(), vec!["alice", "bob"]);
        for result in set.results() {
            assert!((result.distance - 0.3).abs() < 1e-4);
        }
    }

    #[test]
    fn capture_with_stranger_reports_only_known_face() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![unit(0)])];
        let probes = vec![Descriptor::from_vec(unit(0)), Descriptor::from_vec(unit(7))];

        let set = matcher.match_capture(&probes, &records);
        assert_eq!(set.usernames(), vec!["alice"]);
    }

    #[test]
    fn same_account_from_two_faces_is_deduplicated() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![unit(0)])];
        let probes = vec![
            Descriptor::from_vec(offset(unit(0), 1, 0.2)),
            Descriptor::from_vec(unit(0)),
        ];

        let set = matcher.match_capture(&probes, &records);
        assert_eq!(set.len(), 1);
        assert!((set.first().unwrap().distance - 0.2).abs() < 1e-6);
    }

    #[test]
    fn scan_stops_at_first_qualifying_descriptor() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![
            unit(5),
            offset(unit(0), 1, 0.3),
            unit(0),
        ])];
        let probe = Descriptor::from_vec(unit(0));

        let distance = matcher.first_qualifying(&probe, &records[0]).unwrap();
        assert!((distance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_skipped() {
        let matcher = Matcher::default();
        let records = vec![record("alice", vec![vec![1.0, 0.0], unit(0)])];
        let set = matcher.match_capture(&[Descriptor::from_vec(unit(0))], &records);
        assert!(set.contains("alice"));

        let short_only = vec![record("bob", vec![vec![1.0, 0.0]])];
        assert!(matcher.match_capture(&[Descriptor::from_vec(unit(0))], &short_only).is_empty());
    }
}
