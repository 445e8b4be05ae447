fn main() -> anyhow::Result<()> {
    signoff_cli::cli::run()
}
