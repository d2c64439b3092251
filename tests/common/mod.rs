#![allow(dead_code)]

pub mod builders;
pub mod scripted_uploader;
pub mod strategies;

pub use builders::*;
pub use scripted_uploader::*;
