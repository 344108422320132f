/// Section aggregator: groups classified chunks by label.
use std::collections::BTreeMap;

use tracing::warn;

use crate::config::UnrecognizedLabelPolicy;
use crate::section::{LabelParse, SectionLabel};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub bucketed: usize,
    /// Unrecognized chunks moved to `Other`.
    pub fallback: usize,
    /// Unrecognized chunks discarded.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct SectionAggregator {
    policy: UnrecognizedLabelPolicy,
    buckets: BTreeMap<SectionLabel, Vec<String>>,
    stats: AggregationStats,
}

impl SectionAggregator {
    #[must_use]
    pub fn new(policy: UnrecognizedLabelPolicy) -> Self {
        Self {
            policy,
            buckets: BTreeMap::new(),
            stats: AggregationStats::default(),
        }
    }

    /// Add one classified chunk. Encounter order is preserved per label.
    pub fn push(&mut self, text: impl Into<String>, label: &LabelParse) {
        let label = match (label, self.policy) {
            (LabelParse::Recognized(l), _) => *l,
            (LabelParse::Unrecognized(raw), UnrecognizedLabelPolicy::Fallback) => {
                warn!("Unrecognized section {raw:?}, filing chunk under Other");
                self.stats.fallback += 1;
                SectionLabel::Other
            }
            (LabelParse::Unrecognized(raw), UnrecognizedLabelPolicy::Drop) => {
                warn!("Unrecognized section {raw:?}, dropping chunk");
                self.stats.dropped += 1;
                return;
            }
        };
        self.stats.bucketed += 1;
        self.buckets.entry(label).or_default().push(text.into());
    }

    #[must_use]
    pub fn stats(&self) -> AggregationStats {
        self.stats
    }

    #[must_use]
    pub fn into_buckets(self) -> BTreeMap<SectionLabel, Vec<String>> {
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognized(label: SectionLabel) -> LabelParse {
        LabelParse::Recognized(label)
    }

    #[test]
    fn test_order_within_bucket() {
        let mut agg = SectionAggregator::new(UnrecognizedLabelPolicy::Fallback);
        agg.push("A", &recognized(SectionLabel::Water));
        agg.push("B", &recognized(SectionLabel::Fire));
        agg.push("C", &recognized(SectionLabel::Water));

        let buckets = agg.into_buckets();
        assert_eq!(buckets[&SectionLabel::Water], vec!["A", "C"]);
        assert_eq!(buckets[&SectionLabel::Fire], vec!["B"]);
        assert!(!buckets.contains_key(&SectionLabel::Other));
    }

    #[test]
    fn test_fallback_policy() {
        let mut agg = SectionAggregator::new(UnrecognizedLabelPolicy::Fallback);
        agg.push("X", &LabelParse::Unrecognized("Roads".into()));
        assert_eq!(
            agg.stats(),
            AggregationStats {
                bucketed: 1,
                fallback: 1,
                dropped: 0
            }
        );
        assert_eq!(agg.into_buckets()[&SectionLabel::Other], vec!["X"]);
    }

    #[test]
    fn test_drop_policy() {
        let mut agg = SectionAggregator::new(UnrecognizedLabelPolicy::Drop);
        agg.push("X", &LabelParse::Unrecognized("Roads".into()));
        agg.push("Y", &recognized(SectionLabel::Other));
        assert_eq!(agg.stats().dropped, 1);
        assert_eq!(agg.into_buckets()[&SectionLabel::Other], vec!["Y"]);
    }
}
