//! External service integrations.

pub mod fetcher {
    pub use crate::fetcher::*;
}

pub mod openai_client {
    pub use crate::openai_client::*;
}

pub mod store {
    pub use crate::store::*;
}
