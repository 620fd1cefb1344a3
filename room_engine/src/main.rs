use anyhow::Result;

mod audio;
mod cli;
mod config;
mod controller;
mod decorations;
mod movement;
mod placement;
mod popups;
mod proximity;
mod runtime;
mod scenes;
mod scheduler;
mod walk;

fn main() -> Result<()> {
    env_logger::init();
    let command = cli::parse()?;
    runtime::execute(command)
}
