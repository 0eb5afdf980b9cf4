pub mod case;
pub mod endpoint;
pub mod run;
pub mod step;
pub mod suite;

pub use case::*;
pub use endpoint::*;
pub use run::*;
pub use step::*;
pub use suite::*;
