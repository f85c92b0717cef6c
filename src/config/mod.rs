// src/config/mod.rs
pub mod explainer;

pub use explainer::ExplainerConfig;
