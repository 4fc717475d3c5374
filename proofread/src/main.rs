fn main() -> anyhow::Result<()> {
    proofread_lib::run()
}
