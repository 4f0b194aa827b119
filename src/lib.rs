//! Backend for a children's homework helper.
//!
//! Grades a photographed worksheet with a hosted vision model, routing easy
//! pages to a fast model and harder ones to a stronger model, and runs a
//! Socratic tutoring chat that never hands over the answer.

pub mod ai;
pub mod app;
pub mod config;
pub mod error;
pub mod image;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod tutor;

pub use error::{Error, ErrorKind, Result};
