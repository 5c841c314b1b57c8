#[cfg(test)]
mod tests {
    use generic_bnc::branching::{PseudocostRecord, PseudocostTable};
    use generic_bnc::{BranchDirection, FatalError};

    const TOLERANCE: f64 = 1e-6;

    #[test]
    fn up_average_is_mean_of_costs() {
        let mut record = PseudocostRecord::new(0.5).unwrap();

        // (objective delta, branched value, expected running mean)
        // costs are 2.0 / 0.5 = 4, 1.5 / 0.75 = 2 and 3.0 / 0.6 = 5
        let observations = [(2.0, 2.5, 4.0), (1.5, 1.25, 3.0), (3.0, 0.4, 11.0 / 3.0)];

        for (n, (delta, value, mean)) in observations.into_iter().enumerate() {
            record.update(BranchDirection::Up, delta, value);
            assert_eq!(record.up_count() as usize, n + 1);
            assert!((record.up_cost() - mean).abs() < TOLERANCE, "mean after {} updates is {}", n + 1, record.up_cost());
        }

        assert_eq!(record.down_count(), 0);
        assert_eq!(record.down_cost(), 0.0);
    }

    #[test]
    fn down_uses_distance_to_floor() {
        let mut record = PseudocostRecord::new(0.5).unwrap();
        record.update(BranchDirection::Down, 1.0, 3.25);
        assert!((record.down_cost() - 4.0).abs() < TOLERANCE);
        assert_eq!(record.down_count(), 1);
        assert_eq!(record.min_count(), 0);
    }

    fn record_with_averages(weight: f64) -> PseudocostRecord {
        let mut record = PseudocostRecord::new(weight).unwrap();
        record.update(BranchDirection::Up, 2.0, 2.5);
        record.update(BranchDirection::Down, 5.0, 2.5);
        record
    }

    #[test]
    fn score_combines_min_and_max() {
        let symmetric = record_with_averages(0.5);
        assert!((symmetric.up_cost() - 4.0).abs() < TOLERANCE);
        assert!((symmetric.down_cost() - 10.0).abs() < TOLERANCE);
        assert!((symmetric.score() - 7.0).abs() < TOLERANCE);

        assert!((record_with_averages(1.0).score() - 4.0).abs() < TOLERANCE);
        assert!((record_with_averages(0.0).score() - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn unobserved_side_counts_as_zero() {
        let mut record = PseudocostRecord::new(1.0).unwrap();
        record.update(BranchDirection::Up, 2.0, 2.5);
        // min(4, 0)
        assert_eq!(record.score(), 0.0);
    }

    #[test]
    fn weight_outside_unit_interval_is_rejected() {
        assert_eq!(PseudocostRecord::new(1.5).unwrap_err(), FatalError::InvalidWeight(1.5));
        assert_eq!(PseudocostRecord::new(-0.1).unwrap_err(), FatalError::InvalidWeight(-0.1));
        assert!(PseudocostTable::new(2.0).is_err());
    }

    #[test]
    fn update_from_parent_takes_objective_difference() {
        let mut record = PseudocostRecord::new(0.5).unwrap();
        record.update_from_parent(BranchDirection::Up, 10.0, 12.0, 0.5);
        assert!((record.up_cost() - 4.0).abs() < TOLERANCE);

        // slightly better than the parent counts as no change
        record.update_from_parent(BranchDirection::Down, 10.0, 9.999, 0.5);
        assert_eq!(record.down_count(), 1);
        assert_eq!(record.down_cost(), 0.0);
    }

    #[test]
    fn table_creates_records_on_demand() {
        let mut table = PseudocostTable::new(0.5).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.score(3), 0.0);
        assert!(table.record(3).is_none());

        table.update(3, BranchDirection::Up, 2.0, 2.5);
        table.update(3, BranchDirection::Down, 5.0, 2.5);
        table.update(7, BranchDirection::Up, 1.0, 0.5);

        assert_eq!(table.len(), 2);
        assert!((table.score(3) - 7.0).abs() < TOLERANCE);
        assert_eq!(table.min_count(3), 1);
        assert_eq!(table.min_count(7), 0);
        assert_eq!(table.record(7).map(PseudocostRecord::up_count), Some(1));
    }
}
