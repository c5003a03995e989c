//! Parabench binary entry point.

fn main() -> anyhow::Result<()> {
    parabench_cli::run()
}
