fn main() -> anyhow::Result<()> {
    nudge_cli::run()
}
