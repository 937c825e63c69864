//! Command handlers

pub mod config;
pub mod sam;
pub mod status;
