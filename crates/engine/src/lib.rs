pub mod cell;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod grid;
pub mod position;
