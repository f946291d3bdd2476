// Public API - data types, probing engine, and export functions
pub mod cli;
pub mod config;
pub mod export;
pub mod lookup;
pub mod probe;
pub mod state;
pub mod trace;
