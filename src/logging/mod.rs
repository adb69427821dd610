use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Default filter directive; `RUST_LOG` directives are layered on top.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "secret_sealer=info"
    } else {
        "secret_sealer=warn"
    }
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// the resource stream.
pub fn init(verbose: bool) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = default_directive(verbose).parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse() {
        for verbose in [true, false] {
            assert!(default_directive(verbose).parse::<Directive>().is_ok());
        }
    }
}
