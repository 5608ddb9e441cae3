mod cli;
mod loader;

use crate::cli::TidlCli;
use anyhow::Result;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = std::env::args().collect::<Vec<String>>();
    let args_str: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = TidlCli::new().run(&args_str)?;
    print!("{output}");

    Ok(())
}
