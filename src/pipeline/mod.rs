pub mod generate;
pub mod project;
