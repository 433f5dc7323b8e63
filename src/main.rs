mod actions;
mod arbiter;
mod cli;
mod config;
mod controller;
mod fingers;
mod gestures;
mod hand;
mod input;
mod logging;
mod orchestrator;
mod pinch;
mod pipeline;
mod system;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
