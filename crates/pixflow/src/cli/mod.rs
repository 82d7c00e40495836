pub mod config;
pub mod overrides;
pub mod run;
