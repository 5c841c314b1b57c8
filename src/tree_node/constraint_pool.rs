use std::fmt::{Display, Formatter};
use crate::misc::{hash_sparse_row, FullHashMap};
use crate::model::{LinearConstraint, MilpModel};
use crate::oracle::{CutGeneration, CutGenerator, CutStrategy};
use crate::settings::CutSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConstraintId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct PooledConstraint {
    pub id: ConstraintId,
    pub data: LinearConstraint,
}

/// Holds all non-core constraints generated so far.
/// Node descriptions refer to them by id.
#[derive(Clone, Debug, Default)]
pub struct ConstraintPool {
    local_constraint_counter: u32,
    constraints: Vec<PooledConstraint>,
    /// rows sharing a hash, compared in full on lookup
    by_hash: FullHashMap<u64, Vec<ConstraintId>>,
}

impl ConstraintPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of constraints in pool
    pub fn count(&self) -> usize {
        self.constraints.len()
    }

    /// Returns a specific constraint from the pool
    pub fn get_constraint(&self, id: ConstraintId) -> &PooledConstraint {
        let constraint_at_index = &self.constraints[id.0 as usize];

        // ids are handed out in insertion order
        debug_assert_eq!(constraint_at_index.id, id);

        constraint_at_index
    }

    /// Adds a constraint, or finds the identical one already pooled.
    /// Returns the id and whether the constraint is new.
    pub fn add_constraint(&mut self, data: LinearConstraint) -> (ConstraintId, bool) {
        let hash = hash_sparse_row(&data.indices, &data.values, data.lower, data.upper);

        let bucket = self.by_hash.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|id| self.constraints[id.0 as usize].data.same_row(&data)) {
            return (*existing, false);
        }

        let id = ConstraintId(self.local_constraint_counter);
        self.local_constraint_counter += 1;
        bucket.push(id);
        self.constraints.push(PooledConstraint { id, data });

        (id, true)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PooledConstraint> {
        self.constraints.iter()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Why a generated cut was not applied
pub enum CutRejection {
    Empty,
    Dense,
    BadlyScaled,
    Weak,
    Parallel,
}

impl Display for CutRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CutRejection::Empty => "empty",
            CutRejection::Dense => "dense",
            CutRejection::BadlyScaled => "badly scaled",
            CutRejection::Weak => "weak",
            CutRejection::Parallel => "parallel",
        };
        write!(f, "{reason}")
    }
}

/// Screens generated cuts before they reach the oracle
#[derive(Clone, Debug)]
pub struct CutFilter {
    dense_cutoff: usize,
    scale_factor: f64,
    min_violation: f64,
    parallel_threshold: f64,
}

impl CutFilter {
    pub fn new(model: &MilpModel, settings: &CutSettings) -> Self {
        CutFilter {
            dense_cutoff: model.dense_constraint_cutoff(settings.dense_con_factor),
            scale_factor: settings.scale_con_factor,
            min_violation: settings.min_violation,
            parallel_threshold: settings.parallel_threshold,
        }
    }

    pub fn dense_cutoff(&self) -> usize {
        self.dense_cutoff
    }

    /// `None` if `cut` may be applied next to `active` and the already `accepted` cuts
    pub fn rejection(&self, cut: &LinearConstraint, solution: &[f64], active: &[&LinearConstraint], accepted: &[LinearConstraint]) -> Option<CutRejection> {
        if cut.is_empty() {
            return Some(CutRejection::Empty);
        }
        if cut.len() > self.dense_cutoff {
            return Some(CutRejection::Dense);
        }
        if cut.dynamism() > self.scale_factor {
            return Some(CutRejection::BadlyScaled);
        }
        if cut.violation(solution) < self.min_violation {
            return Some(CutRejection::Weak);
        }

        let parallel = active.iter().copied()
            .chain(accepted.iter())
            .any(|other| cut.cosine(other) >= self.parallel_threshold);
        if parallel {
            return Some(CutRejection::Parallel);
        }

        None
    }

    /// Keeps the cuts that pass, in order. Returns the number rejected.
    pub fn filter(&self, cuts: Vec<LinearConstraint>, solution: &[f64], active: &[&LinearConstraint]) -> (Vec<LinearConstraint>, usize) {
        let mut accepted: Vec<LinearConstraint> = Vec::with_capacity(cuts.len());
        let mut rejected = 0;

        for cut in cuts {
            if self.rejection(&cut, solution, active, &accepted).is_some() {
                rejected += 1;
            } else {
                accepted.push(cut);
            }
        }

        (accepted, rejected)
    }
}

/// A cut generator with its call statistics
pub struct CutGeneratorSlot {
    pub generator: Box<dyn CutGenerator>,
    strategy: CutStrategy,
    pub calls: u32,
    pub no_cut_calls: u32,
    pub cuts_found: usize,
}

impl CutGeneratorSlot {
    pub fn new(generator: Box<dyn CutGenerator>) -> Self {
        let strategy = generator.strategy();
        CutGeneratorSlot {
            generator,
            strategy,
            calls: 0,
            no_cut_calls: 0,
            cuts_found: 0,
        }
    }

    /// Current strategy, `Auto` turns into `Never` after too many empty calls
    pub fn strategy(&self) -> CutStrategy {
        self.strategy
    }

    /// `num_processed` counts nodes including the current one
    pub fn should_call(&self, is_root: bool, diving: bool, num_processed: usize) -> bool {
        match self.strategy {
            CutStrategy::Never => false,
            CutStrategy::RootOnly => is_root,
            CutStrategy::Auto => !diving || is_root,
            CutStrategy::Periodic(k) => k > 0 && num_processed.saturating_sub(1) % k as usize == 0,
        }
    }

    pub fn generate(&mut self, model: &MilpModel, solution: &[f64], lower: &[f64], upper: &[f64], auto_disable_after: u32) -> CutGeneration {
        let generation = self.generator.generate(model, solution, lower, upper);

        self.calls += 1;
        self.cuts_found += generation.cuts.len();
        if generation.cuts.is_empty() {
            self.no_cut_calls += 1;
        }

        if self.strategy == CutStrategy::Auto && self.no_cut_calls > auto_disable_after {
            self.strategy = CutStrategy::Never;
        }

        generation
    }
}
