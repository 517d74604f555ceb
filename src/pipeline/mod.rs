pub mod extraction;
pub mod vision;
pub mod processor;
