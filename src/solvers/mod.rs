#[cfg(feature = "microlp")]
pub mod microlp;
#[cfg(feature = "gurobi")]
pub mod gurobi;
