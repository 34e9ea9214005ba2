pub mod app;
pub mod blacklist;
pub mod cli;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod fuzzer;
pub mod job_manager;
pub mod matcher;
pub mod model;
pub mod payloader;
pub mod recursion;
pub mod requester;
pub mod runner;
pub mod scanners;
pub mod utils;
pub mod wordlist;

#[cfg(test)]
mod tests;
