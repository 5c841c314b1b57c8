use std::fmt::{Display, Formatter};
use std::io::Write;
use std::time::Instant;

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::ThreadId;
#[cfg(feature = "buffered_out")]
use std::io::BufWriter;

use console::{pad_str, pad_str_with, style, Alignment};
#[cfg(feature = "branch-graphviz")]
use std::fs::OpenOptions;

use crate::branching::SelectionStatus;
use crate::oracle::LpStatus;
use crate::tree_node::{FathomReason, NodeId};

/// Struct to hold the UI
/// Particulary the receiver channel
pub struct UI {
    sender: UISender,
}

#[derive(Clone)]
pub struct UISender {
    sender: Sender<UIMessage>,
}

impl UISender {
    /// Send typed UIMessage to internal channel.
    /// A closed UI never stops the search.
    pub fn send(&self, user_msg: UIUserMessage) {
        #[cfg(not(feature = "disable_ui"))]
        let _ = self.sender.send(UIMessage {
            thread_id: std::thread::current().id(),
            message: user_msg,
        });
        #[cfg(feature = "disable_ui")]
        drop(user_msg);
    }

    /// Sender whose messages are dropped
    pub fn silent() -> Self {
        let (sender, _) = channel();
        UISender { sender }
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

impl UI {
    pub fn get_sender(&self) -> UISender {
        self.sender.clone()
    }

    pub fn new() -> Self {
        let (sender, receiver) = channel();

        #[cfg(not(feature = "disable_ui"))]
        std::thread::spawn(move || {
            // output errors only end the printer
            let _ = print_messages(&receiver);
        });
        #[cfg(feature = "disable_ui")]
        drop(receiver);

        Self {
            sender: UISender { sender },
        }
    }
}

#[cfg_attr(feature = "disable_ui", allow(dead_code))]
#[cfg_attr(not(feature = "branch-graphviz"), allow(unused_variables))]
fn print_messages(receiver: &Receiver<UIMessage>) -> std::io::Result<()> {
    #[cfg(feature = "branch-graphviz")]
    let mut graphviz_branch_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open("/tmp/branching_tree.dot")?;

    #[cfg(feature = "branch-graphviz")]
    graphviz_branch_file.write_all(b"digraph {\n")?;

    #[cfg(not(feature = "locked_out"))]
    let stdout = std::io::stdout();
    #[cfg(feature = "locked_out")]
    let stdout = std::io::stdout().lock();

    #[cfg(not(feature = "buffered_out"))]
    let mut buffered_out = stdout;
    #[cfg(feature = "buffered_out")]
    let mut buffered_out = BufWriter::with_capacity(512, stdout);

    let start_time = Instant::now();

    let mut node_start_order = 0;
    let mut strong_trials = 0;

    while let Ok(UIMessage { thread_id, message }) = receiver.recv() {
        let time = start_time.elapsed().as_secs_f64();

        match message {
            UIUserMessage::TimeLimitReached => writeln!(&mut buffered_out, "{}", style("Time Limit Reached").yellow().bold())?,
            UIUserMessage::Log(msg) => writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {msg}")?,
            UIUserMessage::LogS(msg) => writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {msg}")?,

            UIUserMessage::StartPhase(title, _level) => {
                writeln!(&mut buffered_out, "{}", pad_str_with(&format!("{thread_id:?}"), 30, Alignment::Center, None, '⎯'))?;
                writeln!(&mut buffered_out, "{}", style(pad_str(title, 30, Alignment::Center, None)).green())?;
                writeln!(&mut buffered_out, "{}", "⎯".repeat(30))?;
                buffered_out.flush()?;
            }

            UIUserMessage::NodeStart(node_state) => {
                node_start_order += 1;
                writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2} started   node {node_state}")?;

                #[cfg(feature = "branch-graphviz")]
                {
                    graphviz_branch_file.write_all(format!("{id} [shape=\"plaintext\" label=<<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\"><TR><TD>{id}</TD><TD>s#{node_start_order}</TD><TD>{before_obj:.2} → ?</TD><TD>{best_obj:.2}</TD></TR></TABLE>>];\n",
                                                           id = node_state.node_id,
                                                           before_obj = node_state.before_obj,
                                                           best_obj = node_state.best_obj,
                    ).as_bytes())?;
                    if let Some(parent) = node_state.parent {
                        graphviz_branch_file.write_all(format!("{parent} -> {id};\n", id = node_state.node_id).as_bytes())?;
                    }
                }
            }

            UIUserMessage::NodeFinish(node_state) => {
                writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2} completed node {node_state}")?;
                buffered_out.flush()?;
            }

            UIUserMessage::NodeFathomed { node_id, reason } => {
                writeln!(&mut buffered_out, "{}", style(format!("[{thread_id:?}] {time:>6.2} fathomed  node n{node_id} ({reason})")).dim())?;

                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file.write_all(format!("{node_id} [style=\"filled\" fillcolor=\"lightyellow\"];\n").as_bytes())?;
            }

            UIUserMessage::NewIncumbent { obj, node_id } => {
                writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {} {}", style("Has new best:").black().on_green().bold(), style(obj.to_string()).bold())?;
                buffered_out.flush()?;

                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file.write_all(format!("{node_id} [style=\"filled\" fillcolor=\"lightgreen\"];\n").as_bytes())?;
            }

            UIUserMessage::LpSolveFinish(state) => {
                writeln!(&mut buffered_out, "{}", style(format!("[{thread_id:?}] {time:>6.2} lp pass {state}")).dim())?;
            }

            UIUserMessage::CutRound(state) => {
                writeln!(&mut buffered_out, "{}", style(format!("[{thread_id:?}] {time:>6.2} cuts {state}")).dim())?;
            }

            UIUserMessage::StrongBranching(state) => {
                strong_trials += state.num_trials;
                writeln!(&mut buffered_out, "{}", style(format!("[{thread_id:?}] {time:>6.2} strong branching {state}")).dim())?;
            }

            UIUserMessage::ExitUi(statistics) => {
                writeln!(&mut buffered_out, "{}", pad_str_with("Statistics", 30, Alignment::Center, None, '⎯'))?;
                writeln!(&mut buffered_out, "{statistics}")?;
                writeln!(&mut buffered_out, "strong_trials: {strong_trials} / started_nodes: {node_start_order} / total_time: {time:>8.2}s")?;
                writeln!(&mut buffered_out, "{}", "⎯".repeat(30))?;
                buffered_out.flush()?;

                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file.write_all(b"}\n")?;

                break;
            }
        }
    }

    buffered_out.flush()
}

#[derive(Clone, Debug)]
pub struct NodeUIState {
    pub node_id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub open_nodes: usize,
    pub before_obj: f64,
    pub after_obj: Option<f64>, // not set in node start
    pub best_obj: f64,
}

impl Display for NodeUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{id}  parent=<{parent}> depth=<{depth}> open=<{open}> obj_before=<{before_obj}> obj_now=<{after_obj}> obj*=<{best_obj}>",
               id = self.node_id,
               parent = self.parent.map_or_else(|| "-".to_string(), |p| p.to_string()),
               depth = self.depth,
               open = self.open_nodes,
               before_obj = self.before_obj,
               after_obj = self.after_obj.map_or_else(|| "-".to_string(), |v| v.to_string()),
               best_obj = self.best_obj,
        )
    }
}

#[derive(Clone, Debug)]
pub struct LpSolveUIState {
    pub node_id: NodeId,
    pub pass: usize,
    pub status: LpStatus,
    pub objective: f64,
    pub num_rows: usize,
}

impl Display for LpSolveUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{} #{} status=<{:?}> obj=<{:>10.8}> rows=<{}>", self.node_id, self.pass, self.status, self.objective, self.num_rows)
    }
}

#[derive(Clone, Debug)]
pub struct CutRoundUIState {
    pub node_id: NodeId,
    pub pass: usize,
    pub generator: String,
    pub found: usize,
    pub kept: usize,
}

impl Display for CutRoundUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{} #{} {} found=<{}> kept=<{}>", self.node_id, self.pass, self.generator, self.found, self.kept)
    }
}

#[derive(Clone, Debug)]
pub struct StrongBranchingUIState {
    pub num_trials: usize,
    pub num_candidates: usize,
    pub num_fixes: usize,
    pub outcome: SelectionStatus,
}

impl Display for StrongBranchingUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "trials=<{}> candidates=<{}> fixes=<{}> outcome=<{:?}>", self.num_trials, self.num_candidates, self.num_fixes, self.outcome)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Counters collected over one search
pub struct SearchStatistics {
    pub nodes_processed: usize,
    pub lp_solves: usize,
    pub cuts_added: usize,
    pub solutions_found: usize,
    pub reduced_cost_fixes: usize,
    pub max_depth: u32,
    pub runtime: f64,
}

impl Display for SearchStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "nodes: {} / max_depth: {} / lp_solves: {}", self.nodes_processed, self.max_depth, self.lp_solves)?;
        writeln!(f, "cuts: {} / rc_fixes: {} / solutions: {}", self.cuts_added, self.reduced_cost_fixes, self.solutions_found)?;
        write!(f, "search_time: {:>8.2}s", self.runtime)
    }
}

#[derive(Clone, Debug)]
/// Holds all state updates that can influence the UI
pub enum UIUserMessage {
    LogS(&'static str),
    Log(String),
    TimeLimitReached,
    StartPhase(&'static str, u8),
    ExitUi(SearchStatistics),

    NodeStart(NodeUIState),
    NodeFinish(NodeUIState),
    NodeFathomed { node_id: NodeId, reason: FathomReason },
    NewIncumbent { obj: f64, node_id: NodeId },

    LpSolveFinish(LpSolveUIState),
    CutRound(CutRoundUIState),
    StrongBranching(StrongBranchingUIState),
}

#[derive(Clone, Debug)]
pub struct UIMessage {
    pub thread_id: ThreadId,
    pub message: UIUserMessage,
}
