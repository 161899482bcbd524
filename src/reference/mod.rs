pub mod base_data;
pub mod range;
pub mod resolver;
pub mod token;
