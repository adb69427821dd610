use anyhow::Context;
use clap::Parser;
use secret_sealer::cli::Cli;
use secret_sealer::config::read_config_file;
use secret_sealer::logging;
use secret_sealer::{ResMap, ResourceCollection, Transformer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = read_config_file(&cli.config)?;
    config.verbose |= cli.verbose;
    logging::init(config.verbose);

    let input = match &cli.input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read resources from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read resources from stdin")?;
            buf
        }
    };

    let mut resources = ResMap::from_yaml(&input).context("Failed to parse input resources")?;
    let before = resources.len();
    Transformer::new(config).transform(&mut resources).await?;
    info!("Transformed {} resource(s) into {}", before, resources.len());

    let output = resources.to_yaml()?;
    match &cli.output {
        Some(path) => tokio::fs::write(path, output)
            .await
            .with_context(|| format!("Failed to write resources to {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(output.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
