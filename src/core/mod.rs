// Domain-layer modules and shared errors/models
pub mod pipeline {
    pub use crate::pipeline::*;
}

pub mod extractor {
    pub use crate::extractor::*;
}

pub mod miner {
    pub use crate::miner::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod assembler {
    pub use crate::assembler::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
