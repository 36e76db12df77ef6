pub mod store;

pub use store::{Param, ParamStore};
