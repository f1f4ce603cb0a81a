//! REST API handlers organized by domain.

pub mod analysis;
pub mod health;
pub mod incidents;
pub mod premium;
pub mod verify;

pub use analysis::*;
pub use health::*;
pub use incidents::*;
pub use premium::*;
pub use verify::*;
