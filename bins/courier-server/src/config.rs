use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "courier-server", about = "Multi-topic Kafka consumer with a recent-records dashboard API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume the configured topics and serve the dashboard API
    Serve(ConfigArgs),
    /// Validate the config file and print the planned routes
    CheckConfig(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "courier.toml", env = "COURIER_CONFIG")]
    pub config: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_take_a_config_path() {
        let cli = Cli::try_parse_from(["courier-server", "serve", "--config", "prod.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve(ref a) if a.config == "prod.toml"));

        let cli = Cli::try_parse_from(["courier-server", "check-config", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig(ref a) if a.config == "x.toml"));
    }
}
