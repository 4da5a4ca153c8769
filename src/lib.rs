pub mod component;
pub mod config;
pub mod eval;
pub mod goal;
pub mod library;
pub mod oracle;
pub mod search;
pub mod synth;
pub mod term;
pub mod types;
pub mod value;
pub mod vector_tree;
