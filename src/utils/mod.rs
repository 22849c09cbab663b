pub mod evaluation;
pub mod kdtree;
pub mod stats;
pub mod subspace;
