use clap::Parser;
use std::path::PathBuf;

/// Exec-plugin entry point: resources arrive on stdin and leave on stdout.
#[derive(Parser)]
#[command(
    name = "secret-sealer",
    version,
    about = "Replace Secrets in a resource stream with SealedSecrets"
)]
pub struct Cli {
    /// Plugin configuration file (YAML or JSON).
    pub config: PathBuf,

    /// Read resources from this file instead of stdin.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write resources to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log each sealed secret.
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_positional() {
        let cli = Cli::parse_from(["secret-sealer", "sealer.yaml", "-o", "out.yaml", "--verbose"]);
        assert_eq!(cli.config, PathBuf::from("sealer.yaml"));
        assert_eq!(cli.input, None);
        assert_eq!(cli.output, Some(PathBuf::from("out.yaml")));
        assert!(cli.verbose);
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["secret-sealer"]).is_err());
    }
}
