#![warn(warnings)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(non_upper_case_globals)]
#![allow(clippy::needless_return)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions, clippy::cast_precision_loss, clippy::similar_names)]

pub mod misc;
pub mod error;
pub mod settings;
pub mod model;
pub mod oracle;
pub mod branching;
pub mod tree_node;
pub mod heuristics;
pub mod solvers;
mod ui;

use std::time::Instant;

pub use ui::*;
pub use error::FatalError;
pub use settings::*;
pub use model::{IntegerObject, LinearConstraint, MilpModel, Variable};
pub use oracle::{BoundingOracle, CutGenerator, CutStrategy, Heuristic, Incumbent, IncumbentRegistry, LpStatus};
pub use branching::{BranchCandidate, BranchDirection, BranchingStrategy, SelectionStatus};
pub use tree_node::{NodeArena, NodeId, NodeOutcome, NodeStatus, TreeNode};

use crate::branching::PseudocostTable;
use crate::misc::node_queue::{NodeQueue, QueuedNode};
use crate::tree_node::{branch_node, process_node, ConstraintPool, CutFilter, CutGeneratorSlot, NodeContext, NodeDescription};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Why the search stopped
pub enum SearchStatus {
    /// tree exhausted with an incumbent
    Optimal,
    /// tree exhausted without any solution
    Infeasible,
    Unbounded,
    TimeLimit,
    NodeLimit,
    SolutionLimit,
}

#[derive(Clone, Debug)]
/// Result of a search, the incumbent is valid under every status
pub struct SearchResult {
    pub status: SearchStatus,
    /// `f64::INFINITY` without a solution
    pub objective: f64,
    pub solution: Option<Vec<f64>>,
    /// lowest bound over the open nodes and the incumbent
    pub best_bound: f64,
    pub nodes_processed: usize,
    pub statistics: SearchStatistics,
}

/// Sequential branch and cut over a [`MilpModel`].
///
/// Nodes are explored depth first until the first incumbent exists, then by
/// lowest bound.
pub struct BranchAndCut<O: BoundingOracle> {
    model: MilpModel,
    oracle: O,
    settings: BranchAndCutSettings,
    cut_generators: Vec<CutGeneratorSlot>,
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl<O: BoundingOracle> BranchAndCut<O> {
    pub fn new(model: MilpModel, oracle: O, settings: BranchAndCutSettings) -> Self {
        BranchAndCut {
            model,
            oracle,
            settings,
            cut_generators: Vec::new(),
            heuristics: Vec::new(),
        }
    }

    pub fn add_cut_generator(&mut self, generator: Box<dyn CutGenerator>) {
        self.cut_generators.push(CutGeneratorSlot::new(generator));
    }

    pub fn add_heuristic(&mut self, heuristic: Box<dyn Heuristic>) {
        self.heuristics.push(heuristic);
    }

    pub fn model(&self) -> &MilpModel {
        &self.model
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn settings(&self) -> &BranchAndCutSettings {
        &self.settings
    }

    pub fn cut_generators(&self) -> &[CutGeneratorSlot] {
        &self.cut_generators
    }

    /// Limit reached before popping the next node, if any
    fn limit_reached(&self, start: Instant, nodes_processed: usize, incumbent: &Incumbent) -> Option<SearchStatus> {
        let general = &self.settings.general;
        if general.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
            return Some(SearchStatus::TimeLimit);
        }
        if general.node_limit.is_some_and(|limit| nodes_processed >= limit) {
            return Some(SearchStatus::NodeLimit);
        }
        if general.solution_limit.is_some_and(|limit| incumbent.num_solutions() >= limit) {
            return Some(SearchStatus::SolutionLimit);
        }
        None
    }

    /// Runs the search until the tree is exhausted or a limit is hit
    pub fn solve(&mut self, ui: &UI) -> Result<SearchResult, FatalError> {
        let sender = ui.get_sender();
        let start = Instant::now();
        let deadline = self.settings.general.time_limit.map(|limit| start + limit);

        let mut incumbent = Incumbent::new();
        let mut pseudocosts = PseudocostTable::new(self.settings.branching.pseudocost_weight)?;
        let mut strategy = BranchingStrategy::new(self.settings.branching.strategy, &self.model, &self.settings.branching);
        let mut cut_pool = ConstraintPool::new();
        let cut_filter = CutFilter::new(&self.model, &self.settings.cuts);
        let mut statistics = SearchStatistics::default();

        let mut arena = NodeArena::new();
        let mut open_nodes = NodeQueue::new();

        let root = arena.insert_root(NodeDescription::explicit_root(&self.model));
        open_nodes.push(QueuedNode { id: root, depth: 0, quality: f64::NEG_INFINITY, solution_estimate: f64::NEG_INFINITY });

        sender.send(UIUserMessage::StartPhase("Branch and Cut", 0));
        #[cfg(feature = "validity_assertions")]
        sender.send(UIUserMessage::LogS("Validity Assertions Active"));

        let mut stopped_by = None;
        let mut unbounded = false;
        let mut last_processed: Option<NodeId> = None;

        while let Some(queued) = open_nodes.pop() {
            if let Some(limit) = self.limit_reached(start, statistics.nodes_processed, &incumbent) {
                if limit == SearchStatus::TimeLimit {
                    sender.send(UIUserMessage::TimeLimitReached);
                }
                open_nodes.push(queued);
                stopped_by = Some(limit);
                break;
            }

            let id = queued.id;
            let node = arena.get_mut(id)?;
            // child of the node processed just before
            node.diving = node.parent.is_some() && node.parent == last_processed;
            let (parent, depth, before_obj) = (node.parent, node.depth, node.quality);

            statistics.nodes_processed += 1;
            statistics.max_depth = statistics.max_depth.max(depth);

            sender.send(UIUserMessage::NodeStart(NodeUIState {
                node_id: id,
                parent,
                depth,
                open_nodes: open_nodes.len(),
                before_obj,
                after_obj: None,
                best_obj: incumbent.objective,
            }));

            let outcome = {
                let mut ctx = NodeContext {
                    model: &self.model,
                    oracle: &mut self.oracle,
                    strategy: &mut strategy,
                    pseudocosts: &mut pseudocosts,
                    incumbent: &mut incumbent,
                    cut_pool: &mut cut_pool,
                    cut_generators: &mut self.cut_generators,
                    cut_filter: &cut_filter,
                    heuristics: &mut self.heuristics,
                    settings: &self.settings,
                    ui: &sender,
                    deadline,
                    num_processed: statistics.nodes_processed,
                    statistics: &mut statistics,
                };
                process_node(&mut arena, id, &mut ctx)?
            };
            last_processed = Some(id);

            let after_obj = arena.get(id)?.quality;
            sender.send(UIUserMessage::NodeFinish(NodeUIState {
                node_id: id,
                parent,
                depth,
                open_nodes: open_nodes.len(),
                before_obj,
                after_obj: Some(after_obj),
                best_obj: incumbent.objective,
            }));

            match outcome {
                NodeOutcome::Fathomed(reason) => {
                    sender.send(UIUserMessage::NodeFathomed { node_id: id, reason });
                    arena.remove(id)?;
                }
                NodeOutcome::Unbounded => {
                    sender.send(UIUserMessage::LogS("Relaxation unbounded"));
                    unbounded = true;
                    break;
                }
                NodeOutcome::Pregnant => {
                    let ramp_up = statistics.nodes_processed <= self.settings.general.ramp_up_nodes;
                    for child in branch_node(&mut arena, id, ramp_up, &self.model)? {
                        let child_node = arena.get(child)?;
                        open_nodes.push(QueuedNode {
                            id: child,
                            depth: child_node.depth,
                            quality: child_node.quality,
                            solution_estimate: child_node.solution_estimate,
                        });
                    }
                }
            }

            if incumbent.has_solution() {
                open_nodes.now_has_bound();
            }
        }

        let open_bound = open_nodes.lowest_bound();
        for open in open_nodes.flush() {
            arena.get_mut(open.id)?.status = NodeStatus::Discarded;
        }

        #[cfg(feature = "validity_assertions")]
        if let Some(solution) = &incumbent.solution {
            assert!(self.model.is_feasible(solution, self.settings.general.integer_tolerance * 10.0));
        }

        let status = if unbounded {
            SearchStatus::Unbounded
        } else if let Some(limit) = stopped_by {
            limit
        } else if incumbent.has_solution() {
            SearchStatus::Optimal
        } else {
            SearchStatus::Infeasible
        };

        let best_bound = open_bound.map_or(incumbent.objective, |bound| bound.min(incumbent.objective));
        statistics.runtime = start.elapsed().as_secs_f64();
        sender.send(UIUserMessage::ExitUi(statistics.clone()));

        Ok(SearchResult {
            status,
            objective: incumbent.objective,
            nodes_processed: statistics.nodes_processed,
            solution: incumbent.solution,
            best_bound,
            statistics,
        })
    }
}
