use alloy_primitives::Address;
use clap::{Args, Parser, Subcommand};

/// Settlement engine
///
/// Hashes, signs and simulates the settlement of signed swap collections.
#[derive(Parser, PartialEq, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone()
    }
}

#[derive(Subcommand, Clone, PartialEq, Debug)]
pub enum Command {
    /// Prints the hash the trusted signer signs for a collection.
    Hash(HashArgs),
    /// Signs a collection and prints it with the signature filled in.
    Sign(SignArgs),
    /// Settles the collection of a scenario file and prints the outcome.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct CollectionArgs {
    /// Swap collection JSON file
    #[clap(long)]
    pub collection: String,

    /// Address that will submit the collection
    #[clap(long)]
    pub sender: Address,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct HashArgs {
    #[clap(flatten)]
    pub collection_args: CollectionArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SignArgs {
    #[clap(flatten)]
    pub collection_args: CollectionArgs,

    /// Hex encoded private key of the trusted signer
    #[clap(long, env = "SIGNER_KEY", hide_env_values = true)]
    pub signer_key: String,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SimulateArgs {
    /// Scenario configuration file
    #[clap(long, env, default_value = "./scenario.yaml")]
    pub scenario: String,
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_arg_parsing_sign_cmd() {
        let cli = Cli::try_parse_from(vec![
            "settlement-engine",
            "sign",
            "--collection",
            "./collection.json",
            "--sender",
            "0x00000000000000000000000000000000000000aa",
            "--signer-key",
            "0x01",
        ])
        .expect("parse errored");

        assert_eq!(
            cli.command(),
            Command::Sign(SignArgs {
                collection_args: CollectionArgs {
                    collection: "./collection.json".to_string(),
                    sender: Address::with_last_byte(0xaa),
                },
                signer_key: "0x01".to_string(),
            })
        );
    }

    #[test]
    fn test_arg_parsing_simulate_default() {
        let cli =
            Cli::try_parse_from(vec!["settlement-engine", "simulate"]).expect("parse errored");

        assert_eq!(
            cli.command(),
            Command::Simulate(SimulateArgs { scenario: "./scenario.yaml".to_string() })
        );
    }

    #[test]
    fn test_arg_parsing_missing_sender() {
        let args = Cli::try_parse_from(vec![
            "settlement-engine",
            "hash",
            "--collection",
            "./collection.json",
        ]);

        assert!(args.is_err());
    }
}
