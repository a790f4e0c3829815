pub mod args;
pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod ir;
pub mod ledger;
pub mod ofx;
pub mod sync;
