use itertools::Itertools;
use crate::branching::{BranchCandidate, BranchDirection};
use crate::misc::{quantize, quantized_entries};

#[derive(Clone, Debug, PartialEq)]
/// One decision column of the model
pub struct Variable {
    pub index: usize,
    pub objective: f64,
    pub hard_lower: f64,
    pub hard_upper: f64,
    pub soft_lower: f64,
    pub soft_upper: f64,
    pub integer: bool,
    pub original_lower: f64,
    pub original_upper: f64,
}

impl Variable {
    pub fn new(index: usize, objective: f64, lower: f64, upper: f64, integer: bool) -> Self {
        Variable {
            index,
            objective,
            hard_lower: lower,
            hard_upper: upper,
            soft_lower: lower,
            soft_upper: upper,
            integer,
            original_lower: lower,
            original_upper: upper,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Sparse ranged row `lower <= a x <= upper`.
/// Used for core constraints and for generated cuts alike.
pub struct LinearConstraint {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
    pub lower: f64,
    pub upper: f64,
}

impl LinearConstraint {
    pub fn new(indices: Vec<usize>, values: Vec<f64>, lower: f64, upper: f64) -> Self {
        debug_assert_eq!(indices.len(), values.len());
        LinearConstraint { indices, values, lower, upper }
    }

    /// `a x <= rhs`
    pub fn less_equal(terms: &[(usize, f64)], rhs: f64) -> Self {
        let (indices, values) = terms.iter().copied().unzip();
        Self::new(indices, values, f64::NEG_INFINITY, rhs)
    }

    /// `a x >= rhs`
    pub fn greater_equal(terms: &[(usize, f64)], rhs: f64) -> Self {
        let (indices, values) = terms.iter().copied().unzip();
        Self::new(indices, values, rhs, f64::INFINITY)
    }

    /// `a x == rhs`
    pub fn equal(terms: &[(usize, f64)], rhs: f64) -> Self {
        let (indices, values) = terms.iter().copied().unzip();
        Self::new(indices, values, rhs, rhs)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn activity(&self, solution: &[f64]) -> f64 {
        self.indices.iter().zip(&self.values).map(|(i, a)| a * solution[*i]).sum()
    }

    /// Amount by which `solution` violates the row, zero if satisfied
    pub fn violation(&self, solution: &[f64]) -> f64 {
        let activity = self.activity(solution);
        (self.lower - activity).max(activity - self.upper).max(0.0)
    }

    /// Ratio of largest and smallest absolute coefficient
    pub fn dynamism(&self) -> f64 {
        let (min, max) = self.values.iter()
            .map(|v| v.abs())
            .filter(|v| *v > 0.0)
            .minmax()
            .into_option()
            .unwrap_or((1.0, 1.0));
        max / min
    }

    /// Same row up to term order and coefficient noise below `1e-9`
    pub fn same_row(&self, other: &LinearConstraint) -> bool {
        quantize(self.lower) == quantize(other.lower)
            && quantize(self.upper) == quantize(other.upper)
            && quantized_entries(&self.indices, &self.values) == quantized_entries(&other.indices, &other.values)
    }

    /// Cosine of the angle between the coefficient vectors of both rows
    pub fn cosine(&self, other: &LinearConstraint) -> f64 {
        let norm = |c: &LinearConstraint| c.values.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm_product = norm(self) * norm(other);
        if norm_product <= 0.0 {
            return 0.0;
        }

        let lhs: Vec<(usize, f64)> = self.indices.iter().copied().zip(self.values.iter().copied())
            .sorted_unstable_by_key(|(i, _)| *i).collect();
        let rhs: Vec<(usize, f64)> = other.indices.iter().copied().zip(other.values.iter().copied())
            .sorted_unstable_by_key(|(i, _)| *i).collect();

        let dot: f64 = lhs.iter()
            .merge_join_by(rhs.iter(), |(a, _), (b, _)| a.cmp(b))
            .filter_map(|pair| pair.both().map(|((_, x), (_, y))| x * y))
            .sum();

        dot.abs() / norm_product
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Integrality requirement of a single column
pub struct IntegerObject {
    pub column: usize,
}

impl IntegerObject {
    /// Degree of violation and preferred branching direction.
    ///
    /// The value is clamped to `[lower, upper]` first. A value within `tolerance`
    /// of its nearest integer is feasible and returns zero.
    pub fn infeasibility(&self, solution: &[f64], lower: &[f64], upper: &[f64], tolerance: f64, break_even: f64) -> (f64, BranchDirection) {
        let value = solution[self.column].max(lower[self.column]).min(upper[self.column]);

        let nearest = (value + (1.0 - break_even)).floor();
        let direction = if nearest > value { BranchDirection::Up } else { BranchDirection::Down };

        let distance = (value - nearest).abs();
        if distance <= tolerance {
            return (0.0, direction);
        }

        let weight = if nearest < value {
            distance * 0.5 / break_even
        } else {
            distance * 0.5 / (1.0 - break_even)
        };

        (weight, direction)
    }

    /// Materialize the floor / ceiling split around the current value
    pub fn create_branch_candidate(&self, object_index: usize, solution: &[f64], lower: &[f64], upper: &[f64], direction: BranchDirection, score: f64) -> BranchCandidate {
        let value = solution[self.column].max(lower[self.column]).min(upper[self.column]);
        BranchCandidate {
            object_index,
            variable_index: self.column,
            value,
            direction,
            down: (lower[self.column], value.floor()),
            up: (value.ceil(), upper[self.column]),
            score,
            up_estimate: 0.0,
            down_estimate: 0.0,
            num_inf_up: 0,
            num_inf_down: 0,
            finished_up: false,
            finished_down: false,
        }
    }
}

/// Minimisation MILP: columns, core rows and integer objects
#[derive(Clone, Debug, Default)]
pub struct MilpModel {
    variables: Vec<Variable>,
    constraints: Vec<LinearConstraint>,
    integer_objects: Vec<IntegerObject>,
}

impl MilpModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, returns its index
    pub fn add_variable(&mut self, objective: f64, lower: f64, upper: f64, integer: bool) -> usize {
        let index = self.variables.len();
        self.variables.push(Variable::new(index, objective, lower, upper, integer));
        if integer {
            self.integer_objects.push(IntegerObject { column: index });
        }
        index
    }

    /// Adds a core row, returns its index
    pub fn add_constraint(&mut self, constraint: LinearConstraint) -> usize {
        self.constraints.push(constraint);
        self.constraints.len() - 1
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn integer_objects(&self) -> &[IntegerObject] {
        &self.integer_objects
    }

    pub fn num_cols(&self) -> usize {
        self.variables.len()
    }

    pub fn num_core_rows(&self) -> usize {
        self.constraints.len()
    }

    pub fn objective_value(&self, solution: &[f64]) -> f64 {
        self.variables.iter().map(|v| v.objective * solution[v.index]).sum()
    }

    pub fn col_lower(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.hard_lower).collect()
    }

    pub fn col_upper(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.hard_upper).collect()
    }

    /// Number of integer objects that `solution` leaves fractional
    pub fn num_integer_infeasible(&self, solution: &[f64], lower: &[f64], upper: &[f64], tolerance: f64, break_even: f64) -> usize {
        self.integer_objects.iter()
            .filter(|o| o.infeasibility(solution, lower, upper, tolerance, break_even).0 > 0.0)
            .count()
    }

    /// Checks bounds, core rows and integrality against the original model
    pub fn is_feasible(&self, solution: &[f64], tolerance: f64) -> bool {
        if solution.len() != self.variables.len() {
            return false;
        }

        let bounds_ok = self.variables.iter().all(|v| {
            let x = solution[v.index];
            x >= v.original_lower - tolerance
                && x <= v.original_upper + tolerance
                && (!v.integer || (x - x.round()).abs() <= tolerance)
        });

        bounds_ok && self.constraints.iter().all(|c| c.violation(solution) <= tolerance)
    }

    /// Length above which a generated row counts as dense
    pub fn dense_constraint_cutoff(&self, dense_con_factor: f64) -> usize {
        let lengths: Vec<f64> = self.constraints.iter().map(|c| c.len() as f64).collect();
        let (average, deviation) = if lengths.is_empty() {
            (0.0, 0.0)
        } else {
            let n = lengths.len() as f64;
            let average = lengths.iter().sum::<f64>() / n;
            let variance = lengths.iter().map(|l| (l - average).powi(2)).sum::<f64>() / n;
            (average, variance.sqrt())
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cutoff = (average + dense_con_factor * deviation) as usize;
        cutoff.min(self.variables.len() / 2).max(10)
    }
}
