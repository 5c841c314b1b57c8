#[cfg(test)]
mod tests {
    use generic_bnc::model::{LinearConstraint, MilpModel};
    use generic_bnc::oracle::{CutGeneration, CutGenerator, CutStrategy};
    use generic_bnc::tree_node::{ConstraintPool, CutFilter, CutGeneratorSlot, CutRejection};
    use generic_bnc::CutSettings;

    fn model(columns: usize) -> MilpModel {
        let mut model = MilpModel::new();
        for _ in 0..columns {
            model.add_variable(1.0, 0.0, 1.0, true);
        }
        model
    }

    #[test]
    fn rejects_each_kind_of_bad_cut() {
        let model = model(30);
        let filter = CutFilter::new(&model, &CutSettings::default());
        assert_eq!(filter.dense_cutoff(), 10);

        let solution = vec![0.5; 30];
        let violated = LinearConstraint::greater_equal(&[(0, 1.0), (1, 1.0)], 2.0);

        let empty = LinearConstraint::greater_equal(&[], 1.0);
        let dense_terms: Vec<(usize, f64)> = (0..11).map(|i| (i, 1.0)).collect();
        let dense = LinearConstraint::greater_equal(&dense_terms, 11.0);
        let badly_scaled = LinearConstraint::greater_equal(&[(0, 1e-4), (1, 1e4)], 1e5);
        let weak = LinearConstraint::greater_equal(&[(0, 1.0), (1, 1.0)], 1.0);
        let parallel = LinearConstraint::greater_equal(&[(1, 2.0), (0, 2.0)], 3.0);

        assert_eq!(filter.rejection(&empty, &solution, &[], &[]), Some(CutRejection::Empty));
        assert_eq!(filter.rejection(&dense, &solution, &[], &[]), Some(CutRejection::Dense));
        assert_eq!(filter.rejection(&badly_scaled, &solution, &[], &[]), Some(CutRejection::BadlyScaled));
        assert_eq!(filter.rejection(&weak, &solution, &[], &[]), Some(CutRejection::Weak));
        assert_eq!(filter.rejection(&violated, &solution, &[], &[]), None);
        assert_eq!(filter.rejection(&parallel, &solution, &[&violated], &[]), Some(CutRejection::Parallel));
        assert_eq!(filter.rejection(&parallel, &solution, &[], std::slice::from_ref(&violated)), Some(CutRejection::Parallel));
    }

    #[test]
    fn filter_drops_later_parallel_cuts() {
        let model = model(4);
        let filter = CutFilter::new(&model, &CutSettings::default());
        let solution = vec![0.5; 4];

        let cuts = vec![
            LinearConstraint::greater_equal(&[(0, 1.0), (1, 1.0)], 2.0),
            LinearConstraint::greater_equal(&[(0, 3.0), (1, 3.0)], 6.0),
            LinearConstraint::greater_equal(&[(2, 1.0), (3, 1.0)], 2.0),
        ];
        let (accepted, rejected) = filter.filter(cuts, &solution, &[]);
        assert_eq!(rejected, 1);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[1].indices, vec![2, 3]);
    }

    #[test]
    fn pool_deduplicates_reordered_rows() {
        let mut pool = ConstraintPool::new();
        let (first, new) = pool.add_constraint(LinearConstraint::less_equal(&[(0, 1.0), (3, 2.0)], 4.0));
        assert!(new);
        let (same, new) = pool.add_constraint(LinearConstraint::less_equal(&[(3, 2.0), (0, 1.0)], 4.0));
        assert_eq!(same, first);
        assert!(!new);
        let (other, new) = pool.add_constraint(LinearConstraint::less_equal(&[(0, 1.0), (3, 2.0)], 5.0));
        assert!(new);
        assert_ne!(other, first);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn pooled_rows_are_compared_in_full() {
        let row = LinearConstraint::less_equal(&[(0, 1.0), (3, 2.0)], 4.0);
        assert!(row.same_row(&LinearConstraint::less_equal(&[(3, 2.0 + 1e-12), (0, 1.0)], 4.0)));
        assert!(!row.same_row(&LinearConstraint::less_equal(&[(0, 1.0), (3, 2.0)], 5.0)));
        assert!(!row.same_row(&LinearConstraint::greater_equal(&[(0, 1.0), (3, 2.0)], 4.0)));
        assert!(!row.same_row(&LinearConstraint::less_equal(&[(0, 1.0), (2, 2.0)], 4.0)));

        let mut pool = ConstraintPool::new();
        let (first, _) = pool.add_constraint(row.clone());
        let (other, new) = pool.add_constraint(LinearConstraint::less_equal(&[(0, 1.0), (2, 2.0)], 4.0));
        assert!(new);
        assert_ne!(other, first);
        assert_eq!(pool.add_constraint(row), (first, false));
        assert_eq!(pool.get_constraint(other).data.indices, vec![0, 2]);
    }

    struct Silent(CutStrategy);

    impl CutGenerator for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn strategy(&self) -> CutStrategy {
            self.0
        }

        fn generate(&mut self, _model: &MilpModel, _solution: &[f64], _lower: &[f64], _upper: &[f64]) -> CutGeneration {
            CutGeneration::default()
        }
    }

    #[test]
    fn call_strategies() {
        let root_only = CutGeneratorSlot::new(Box::new(Silent(CutStrategy::RootOnly)));
        assert!(root_only.should_call(true, false, 1));
        assert!(!root_only.should_call(false, false, 2));

        let periodic = CutGeneratorSlot::new(Box::new(Silent(CutStrategy::Periodic(3))));
        let called: Vec<usize> = (1..=7).filter(|n| periodic.should_call(false, false, *n)).collect();
        assert_eq!(called, vec![1, 4, 7]);

        let never = CutGeneratorSlot::new(Box::new(Silent(CutStrategy::Never)));
        assert!(!never.should_call(true, false, 1));
    }

    #[test]
    fn auto_generator_switches_off_after_empty_calls() {
        let model = model(2);
        let mut slot = CutGeneratorSlot::new(Box::new(Silent(CutStrategy::Auto)));
        assert!(slot.should_call(false, false, 5));
        assert!(!slot.should_call(false, true, 5));
        assert!(slot.should_call(true, true, 1));

        for _ in 0..3 {
            slot.generate(&model, &[0.5, 0.5], &[0.0, 0.0], &[1.0, 1.0], 2);
        }
        assert_eq!(slot.calls, 3);
        assert_eq!(slot.no_cut_calls, 3);
        assert_eq!(slot.strategy(), CutStrategy::Never);
    }
}
