pub mod accessor;
pub mod interpreter;
pub mod merge;
pub mod model;
pub mod resolver;
pub mod store;
