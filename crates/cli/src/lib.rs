pub mod cli;
pub mod commands;
pub mod frontend;
pub mod logging;
pub mod output;
