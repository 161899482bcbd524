pub mod dsl;
pub mod model;
pub mod output;
