//! Structure search: beam refinement and the outer learning loop

pub mod beam;
pub mod learner;

pub use beam::{Beam, BeamConfig, BeamRefiner, ScoredClause};
pub use learner::{LearnConfig, Phase, StructureLearner};
