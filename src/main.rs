mod calculator;
mod cli;
mod config;
mod dispatch;
mod feedback;
mod fingers;
mod gestures;
mod hand;
mod logging;
mod pipeline;
mod relations;
mod source;
mod stabilizer;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
