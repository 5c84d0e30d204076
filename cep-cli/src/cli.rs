use std::time::Duration;

use anyhow::Context;
use cep_core::{CanonicalAddress, Config, PostalCode, ProviderRegistry, Resolver};
use clap::{Parser, Subcommand};
use inquire::{CustomType, MultiSelect};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cep", version, about = "Resolve a Brazilian CEP using the fastest provider")]
pub struct Cli {
    /// Log lookup progress to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up an address, racing the selected providers.
    Lookup {
        /// Postal code, e.g. "29102-385".
        code: String,

        /// Provider to race; repeat for several. Defaults to the configured list.
        #[arg(short, long = "provider")]
        providers: Vec<String>,

        /// Time budget in milliseconds. Defaults to the configured timeout.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the address as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List known providers.
    Providers,

    /// Choose default providers and timeout interactively.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Lookup { code, providers, timeout_ms, json } => {
                let resolver = Resolver::from_config(&config)?;
                let providers =
                    if providers.is_empty() { config.default_providers.clone() } else { providers };
                let budget = timeout_ms.map(Duration::from_millis).unwrap_or_else(|| config.budget());

                let address = resolver
                    .resolve(&PostalCode::new(code), &providers, budget)
                    .await
                    .context("Lookup failed")?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&address)?);
                } else {
                    print!("{}", render(&address));
                }
            }
            Command::Providers => {
                let registry = ProviderRegistry::from_config(&config);
                for id in registry.ids() {
                    if let Some(adapter) = registry.get(id.as_str()) {
                        let marker = if is_default(&config, id.as_str()) { "*" } else { " " };
                        println!("{marker} {id:<12} {}", adapter.base_url());
                    }
                }
            }
            Command::Configure => {
                let registry = ProviderRegistry::from_config(&config);
                let options: Vec<String> = registry.ids().iter().map(|id| id.to_string()).collect();
                let defaults: Vec<usize> = options
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| is_default(&config, name))
                    .map(|(i, _)| i)
                    .collect();

                let chosen = MultiSelect::new("Providers to race by default:", options)
                    .with_default(&defaults)
                    .prompt()?;

                let timeout_ms = CustomType::<u64>::new("Time budget (ms):")
                    .with_default(config.timeout_ms)
                    .with_error_message("Please enter a whole number of milliseconds")
                    .prompt()?;
                if timeout_ms == 0 {
                    anyhow::bail!("Time budget must be greater than zero");
                }

                config.set_default_providers(&chosen, &registry)?;
                config.timeout_ms = timeout_ms;
                config.save()?;

                println!("Saved configuration to {}", Config::config_file_path()?.display());
            }
        }

        Ok(())
    }
}

fn is_default(config: &Config, name: &str) -> bool {
    config.default_providers.iter().any(|p| p.trim().eq_ignore_ascii_case(name))
}

fn render(address: &CanonicalAddress) -> String {
    let field = |value: &str| if value.is_empty() { "-".to_string() } else { value.to_string() };

    format!(
        "CEP:          {}\n\
         Street:       {}\n\
         Neighborhood: {}\n\
         City:         {}\n\
         State:        {}\n\
         Provider:     {}\n",
        field(&address.cep),
        field(&address.street),
        field(&address.neighborhood),
        field(&address.city),
        field(&address.state),
        address.provider,
    )
}
