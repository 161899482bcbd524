pub mod artifact;
pub mod fetch;
pub mod sandbox;
