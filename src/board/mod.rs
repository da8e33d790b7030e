#![forbid(unsafe_code)]

pub mod connector;
pub mod drag;
pub mod focus;
pub mod model;
pub mod numbering;
pub mod service;
pub mod tree;
