use memoria_config::Config;

/// Strategy for initializing the configuration.
///
/// Creates the default configuration file at `~/.memoria/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let path = Config::create_default()?;
        println!("wrote default config to {}", path.display());
        Ok(())
    }
}
