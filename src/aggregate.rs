//! Aggregator (§4.5): mean-position ranking over peer evaluations.

use std::collections::BTreeMap;

use crate::model::{AggregateEntry, Label, ParticipantId, RankingRecord};

/// Aggregate `[RankingRecord]` into one [`AggregateEntry`] per label that
/// appears in at least one parsed order (I4), sorted by mean ascending, then
/// vote count descending, then model ascending (§3, §4.5).
pub fn aggregate(
    records: &[RankingRecord],
    label_to_model: &BTreeMap<Label, ParticipantId>,
) -> Vec<AggregateEntry> {
    let mut positions: BTreeMap<Label, Vec<u32>> = BTreeMap::new();

    for record in records {
        for (idx, label) in record.parsed_order.iter().enumerate() {
            positions.entry(*label).or_default().push(idx as u32 + 1);
        }
    }

    let mut entries: Vec<AggregateEntry> = positions
        .into_iter()
        .filter_map(|(label, votes)| {
            let model = label_to_model.get(&label)?.clone();
            let count = votes.len() as u32;
            let sum: u32 = votes.iter().sum();
            Some(AggregateEntry {
                model,
                mean_position: sum as f64 / count as f64,
                vote_count: count,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        a.mean_position
            .partial_cmp(&b.mean_position)
            .unwrap()
            .then_with(|| b.vote_count.cmp(&a.vote_count))
            .then_with(|| a.model.cmp(&b.model))
    });

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, order: &[Label]) -> RankingRecord {
        RankingRecord {
            model: model.to_string(),
            evaluation_text: String::new(),
            parsed_order: order.to_vec(),
        }
    }

    #[test]
    fn s1_three_participant_scenario() {
        let label_to_model: BTreeMap<Label, ParticipantId> = [
            ('A', "P1".to_string()),
            ('B', "P2".to_string()),
            ('C', "P3".to_string()),
        ]
        .into_iter()
        .collect();

        let records = vec![
            record("P1", &['B', 'A', 'C']),
            record("P2", &['B', 'C', 'A']),
            record("P3", &['A', 'B', 'C']),
        ];

        let result = aggregate(&records, &label_to_model);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].model, "P2");
        assert!((result[0].mean_position - 1.33).abs() < 0.01);
        assert_eq!(result[1].model, "P1");
        assert!((result[1].mean_position - 2.0).abs() < 0.001);
        assert_eq!(result[2].model, "P3");
        assert!((result[2].mean_position - 2.67).abs() < 0.01);
        assert!(result.iter().all(|e| e.vote_count == 3));
    }

    #[test]
    fn p8_sum_of_weighted_means_equals_sum_of_positions() {
        let label_to_model: BTreeMap<Label, ParticipantId> =
            [('A', "P1".to_string()), ('B', "P2".to_string())].into_iter().collect();
        let records = vec![record("P1", &['A', 'B']), record("P2", &['B', 'A'])];

        let result = aggregate(&records, &label_to_model);
        let weighted_sum: f64 = result
            .iter()
            .map(|e| e.mean_position * e.vote_count as f64)
            .sum();

        let total_positions: u32 = records
            .iter()
            .flat_map(|r| (1..=r.parsed_order.len() as u32))
            .sum();
        assert!((weighted_sum - total_positions as f64).abs() < 1e-9);
    }

    #[test]
    fn labels_never_present_are_absent() {
        let label_to_model: BTreeMap<Label, ParticipantId> =
            [('A', "P1".to_string()), ('B', "P2".to_string())].into_iter().collect();
        let records = vec![record("P1", &['A'])];
        let result = aggregate(&records, &label_to_model);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].model, "P1");
    }
}
