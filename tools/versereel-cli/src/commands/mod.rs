pub mod check;
pub mod config;
pub mod export;
pub mod fetch;
pub mod parse;
pub mod preview;
pub mod readers;
pub mod shared;
pub mod timings;
