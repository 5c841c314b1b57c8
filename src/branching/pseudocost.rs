use crate::branching::BranchDirection;
use crate::error::FatalError;
use crate::misc::HashMap;

/// Guards the division by the fractional distance
pub const FRACTION_EPSILON: f64 = 1e-9;

/// Objective improvements beyond this are treated as a caller bug
pub const OBJECTIVE_DELTA_TOLERANCE: f64 = 1e-1;

#[derive(Clone, Debug, PartialEq)]
/// Running averages of the objective degradation per unit of change,
/// observed when branching a variable up or down.
///
/// An unobserved side averages to `0.0`. Under `min()` this makes a variable
/// whose untested side reads zero look attractive, a cold-start bias that
/// deliberately pushes the search towards exploring it.
pub struct PseudocostRecord {
    up_count: u32,
    up_cost: f64,
    down_count: u32,
    down_cost: f64,
    score: f64,
    weight: f64,
}

impl PseudocostRecord {
    pub fn new(weight: f64) -> Result<Self, FatalError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(FatalError::InvalidWeight(weight));
        }
        Ok(PseudocostRecord {
            up_count: 0,
            up_cost: 0.0,
            down_count: 0,
            down_cost: 0.0,
            score: 0.0,
            weight,
        })
    }

    /// Folds one observation into the running mean of `direction`.
    ///
    /// `value` is the fractional value the variable was branched at,
    /// `objective_delta` the change of the relaxation objective.
    pub fn update(&mut self, direction: BranchDirection, objective_delta: f64, value: f64) {
        debug_assert!(objective_delta >= -OBJECTIVE_DELTA_TOLERANCE,
                      "objective improved by {objective_delta} after tightening a bound");

        let fraction = match direction {
            BranchDirection::Up => value.ceil() - value,
            BranchDirection::Down => value - value.floor(),
        };
        let cost = objective_delta / (fraction + FRACTION_EPSILON);

        match direction {
            BranchDirection::Up => {
                self.up_cost = (self.up_cost * f64::from(self.up_count) + cost) / f64::from(self.up_count + 1);
                self.up_count += 1;
            }
            BranchDirection::Down => {
                self.down_cost = (self.down_cost * f64::from(self.down_count) + cost) / f64::from(self.down_count + 1);
                self.down_count += 1;
            }
        }

        self.score = self.combine();
    }

    /// Same as `update` with the delta taken from the parent objective.
    /// A child cannot improve on its parent, negative deltas are solver noise.
    pub fn update_from_parent(&mut self, direction: BranchDirection, parent_objective: f64, objective: f64, value: f64) {
        self.update(direction, (objective - parent_objective).max(0.0), value);
    }

    fn combine(&self) -> f64 {
        let min = self.up_cost.min(self.down_cost);
        let max = self.up_cost.max(self.down_cost);
        self.weight * min + (1.0 - self.weight) * max
    }

    /// `weight * min(up, down) + (1 - weight) * max(up, down)`
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn up_count(&self) -> u32 {
        self.up_count
    }

    pub fn down_count(&self) -> u32 {
        self.down_count
    }

    pub fn up_cost(&self) -> f64 {
        self.up_cost
    }

    pub fn down_cost(&self) -> f64 {
        self.down_cost
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Fewest observations of both sides
    pub fn min_count(&self) -> u32 {
        self.up_count.min(self.down_count)
    }
}

/// Pseudocost records of all integer columns, keyed by column index
#[derive(Clone, Debug)]
pub struct PseudocostTable {
    records: HashMap<usize, PseudocostRecord>,
    weight: f64,
}

impl PseudocostTable {
    pub fn new(weight: f64) -> Result<Self, FatalError> {
        // validate once, records are created lazily
        PseudocostRecord::new(weight)?;
        Ok(PseudocostTable { records: HashMap::default(), weight })
    }

    /// Record of `column`, created on first access
    pub fn record_mut(&mut self, column: usize) -> &mut PseudocostRecord {
        let weight = self.weight;
        self.records.entry(column).or_insert_with(|| PseudocostRecord {
            up_count: 0,
            up_cost: 0.0,
            down_count: 0,
            down_cost: 0.0,
            score: 0.0,
            weight,
        })
    }

    pub fn record(&self, column: usize) -> Option<&PseudocostRecord> {
        self.records.get(&column)
    }

    pub fn update(&mut self, column: usize, direction: BranchDirection, objective_delta: f64, value: f64) {
        self.record_mut(column).update(direction, objective_delta, value);
    }

    pub fn score(&self, column: usize) -> f64 {
        self.records.get(&column).map_or(0.0, PseudocostRecord::score)
    }

    pub fn min_count(&self, column: usize) -> u32 {
        self.records.get(&column).map_or(0, PseudocostRecord::min_count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
