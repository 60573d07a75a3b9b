fn main() -> anyhow::Result<()> {
    gpu_dispatch::run()
}
