use crate::model::MilpModel;
use crate::oracle::Heuristic;

/// Rounds the relaxation solution and keeps the result if it is feasible.
///
/// Two roundings are tried: every integer column to its nearest integer, and
/// every integer column in the direction its objective coefficient favours.
#[derive(Clone, Debug)]
pub struct RoundingHeuristic {
    tolerance: f64,
    calls: usize,
    successes: usize,
}

impl RoundingHeuristic {
    pub fn new(tolerance: f64) -> Self {
        RoundingHeuristic { tolerance, calls: 0, successes: 0 }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    fn round_with(model: &MilpModel, relaxation: &[f64], lower: &[f64], upper: &[f64], round: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        let mut solution = relaxation.to_vec();
        for object in model.integer_objects() {
            let column = object.column;
            let objective = model.variables()[column].objective;
            solution[column] = round(solution[column], objective).max(lower[column].ceil()).min(upper[column].floor());
        }
        solution
    }
}

impl Heuristic for RoundingHeuristic {
    fn name(&self) -> &str {
        "rounding"
    }

    fn search_solution(&mut self, model: &MilpModel, relaxation: &[f64], lower: &[f64], upper: &[f64], cutoff: f64) -> Option<(f64, Vec<f64>)> {
        self.calls += 1;

        let nearest = Self::round_with(model, relaxation, lower, upper, |value, _| value.round());
        // minimisation, a positive cost prefers rounding down
        let favourable = Self::round_with(model, relaxation, lower, upper, |value, objective| {
            if objective > 0.0 { value.floor() } else { value.ceil() }
        });

        let best = [nearest, favourable].into_iter()
            .filter(|solution| model.is_feasible(solution, self.tolerance))
            .map(|solution| (model.objective_value(&solution), solution))
            .filter(|(objective, _)| *objective < cutoff)
            .min_by(|(a, _), (b, _)| a.total_cmp(b));

        if best.is_some() {
            self.successes += 1;
        }
        best
    }
}
