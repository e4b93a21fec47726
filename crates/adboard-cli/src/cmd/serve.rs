use std::path::PathBuf;

pub fn run(config_path: PathBuf, port: u16) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(adboard_server::serve(config_path, port))
}
