pub mod matcher;
pub mod replacer;
