pub mod banner;
pub mod cli;
pub mod config;
pub mod console;
pub mod echo;
pub mod log;
pub mod paths;
pub mod pid;
pub mod server;
pub mod supervisor;
pub mod sys;
