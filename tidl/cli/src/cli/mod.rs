mod args;
mod tidl_cli;
mod utils;

pub use tidl_cli::TidlCli;
