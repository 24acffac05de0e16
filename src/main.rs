mod cli;
mod config;
mod data;
mod prepare;

fn main() -> anyhow::Result<()> {
    cli::run()
}
