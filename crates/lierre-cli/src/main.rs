//! lierre-cli/src/main.rs — binaire `lierre`

fn main() -> anyhow::Result<()> {
    env_logger::init();
    lierre_cli::run()
}
