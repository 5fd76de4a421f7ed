fn main() -> anyhow::Result<()> {
    incident_desk::cli::run()
}
