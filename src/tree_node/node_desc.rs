use crate::model::MilpModel;
use crate::oracle::WarmStartBasis;
use crate::tree_node::constraint_pool::ConstraintId;

#[derive(Clone, Debug, Default, PartialEq)]
/// Sparse overwrite of a bound vector: `values[k]` is the new bound at `positions[k]`
pub struct BoundPatch {
    pub positions: Vec<usize>,
    pub values: Vec<f64>,
}

impl BoundPatch {
    /// Patch covering every position of `values`
    pub fn full(values: &[f64]) -> Self {
        BoundPatch {
            positions: (0..values.len()).collect(),
            values: values.to_vec(),
        }
    }

    /// Sets `position`, overwriting an earlier entry of this patch
    pub fn set(&mut self, position: usize, value: f64) {
        if let Some(k) = self.positions.iter().position(|p| *p == position) {
            self.values[k] = value;
        } else {
            self.positions.push(position);
            self.values.push(value);
        }
    }

    pub fn get(&self, position: usize) -> Option<f64> {
        self.positions.iter().position(|p| *p == position).map(|k| self.values[k])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.positions.iter().copied().zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Raises `target` to the patched values
    fn fold_max(&self, target: &mut [f64]) {
        for (position, value) in self.iter() {
            target[position] = target[position].max(value);
        }
    }

    /// Lowers `target` to the patched values
    fn fold_min(&self, target: &mut [f64]) {
        for (position, value) in self.iter() {
            target[position] = target[position].min(value);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Hard and soft lower / upper patches of one bound family
pub struct BoundPatches {
    pub lower_hard: BoundPatch,
    pub upper_hard: BoundPatch,
    pub lower_soft: BoundPatch,
    pub upper_soft: BoundPatch,
}

impl BoundPatches {
    pub fn is_empty(&self) -> bool {
        self.lower_hard.is_empty() && self.upper_hard.is_empty() && self.lower_soft.is_empty() && self.upper_soft.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Non-core constraints added or removed at a node
pub struct ConstraintDelta {
    pub added: Vec<ConstraintId>,
    pub removed: Vec<ConstraintId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Subproblem of a node, relative to the nearest explicit ancestor.
///
/// An explicit description holds full bound vectors and the complete list of
/// active non-core constraints.
pub struct NodeDescription {
    pub explicit: bool,
    /// column bounds
    pub vars: BoundPatches,
    /// core row bounds
    pub cons: BoundPatches,
    pub constraints: ConstraintDelta,
    pub basis: Option<WarmStartBasis>,
    /// `-1` down, `+1` up, `0` for the root
    pub branched_direction: i32,
    pub branched_object: usize,
    pub branched_column: usize,
    pub branched_value: f64,
}

impl NodeDescription {
    /// Full description of the root subproblem
    pub fn explicit_root(model: &MilpModel) -> Self {
        let row_lower: Vec<f64> = model.constraints().iter().map(|c| c.lower).collect();
        let row_upper: Vec<f64> = model.constraints().iter().map(|c| c.upper).collect();
        NodeDescription {
            explicit: true,
            vars: BoundPatches {
                lower_hard: BoundPatch::full(&model.col_lower()),
                upper_hard: BoundPatch::full(&model.col_upper()),
                ..BoundPatches::default()
            },
            cons: BoundPatches {
                lower_hard: BoundPatch::full(&row_lower),
                upper_hard: BoundPatch::full(&row_upper),
                ..BoundPatches::default()
            },
            ..NodeDescription::default()
        }
    }

    /// Full copy of `full` folded into a single explicit description
    pub fn explicit_from(full: &SubProblem) -> Self {
        NodeDescription {
            explicit: true,
            vars: BoundPatches {
                lower_hard: BoundPatch::full(&full.col_lower),
                upper_hard: BoundPatch::full(&full.col_upper),
                ..BoundPatches::default()
            },
            cons: BoundPatches {
                lower_hard: BoundPatch::full(&full.row_lower),
                upper_hard: BoundPatch::full(&full.row_upper),
                ..BoundPatches::default()
            },
            constraints: ConstraintDelta { added: full.constraints.clone(), removed: Vec::new() },
            basis: full.basis.clone(),
            ..NodeDescription::default()
        }
    }

    /// Single hard bound change of one column
    pub fn with_bound_change(column: usize, lower: f64, upper: f64) -> Self {
        let mut description = NodeDescription::default();
        description.vars.lower_hard.set(column, lower);
        description.vars.upper_hard.set(column, upper);
        description
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Fully reconstructed subproblem of a node
pub struct SubProblem {
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,
    pub constraints: Vec<ConstraintId>,
    pub basis: Option<WarmStartBasis>,
}

impl SubProblem {
    /// All bounds at their unbounded sentinels
    pub fn unbounded(num_cols: usize, num_rows: usize) -> Self {
        SubProblem {
            col_lower: vec![f64::NEG_INFINITY; num_cols],
            col_upper: vec![f64::INFINITY; num_cols],
            row_lower: vec![f64::NEG_INFINITY; num_rows],
            row_upper: vec![f64::INFINITY; num_rows],
            constraints: Vec::new(),
            basis: None,
        }
    }

    /// Applies one description on top of the current state.
    /// Lower bounds take the running max, upper bounds the running min.
    pub fn apply(&mut self, description: &NodeDescription) {
        if description.explicit {
            self.constraints.clear();
        }

        // hard deltas, then soft deltas
        description.vars.lower_hard.fold_max(&mut self.col_lower);
        description.vars.upper_hard.fold_min(&mut self.col_upper);
        description.cons.lower_hard.fold_max(&mut self.row_lower);
        description.cons.upper_hard.fold_min(&mut self.row_upper);

        description.vars.lower_soft.fold_max(&mut self.col_lower);
        description.vars.upper_soft.fold_min(&mut self.col_upper);
        description.cons.lower_soft.fold_max(&mut self.row_lower);
        description.cons.upper_soft.fold_min(&mut self.row_upper);

        self.constraints.retain(|id| !description.constraints.removed.contains(id));
        for id in &description.constraints.added {
            if !self.constraints.contains(id) {
                self.constraints.push(*id);
            }
        }
    }

    /// Folds `path` in root-to-leaf order, the first entry must be explicit
    pub fn fold<'a>(num_cols: usize, num_rows: usize, path: impl IntoIterator<Item = &'a NodeDescription>) -> Self {
        path.into_iter().fold(SubProblem::unbounded(num_cols, num_rows), |mut sub, description| {
            sub.apply(description);
            sub
        })
    }
}
