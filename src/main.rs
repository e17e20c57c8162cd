fn main() -> anyhow::Result<()> {
    nodefield::run()
}
