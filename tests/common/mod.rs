pub mod app;
pub mod factory;

pub use app::{MockTarget, RefusingTarget, TestApp};
pub use factory::Factory;
