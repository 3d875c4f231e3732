use std::{fs::File, io::Read, str::FromStr};

use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, Context};
use clap::Parser;
use settlement_common::models::swap::SwapCollection;
use settlement_engine::{
    cli::{Cli, Command, CollectionArgs, SignArgs, SimulateArgs},
    scenario::Scenario,
    signature::{sign_collection, signing_hash},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), anyhow::Error> {
    create_tracing_subscriber();
    let cli: Cli = Cli::parse();
    match cli.command() {
        Command::Hash(hash_args) => {
            let collection = read_collection(&hash_args.collection_args)?;
            println!("{}", signing_hash(&collection, hash_args.collection_args.sender));
        }
        Command::Sign(sign_args) => run_sign(sign_args)?,
        Command::Simulate(simulate_args) => run_simulate(simulate_args)?,
    };
    Ok(())
}

fn create_tracing_subscriber() {
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn read_collection(args: &CollectionArgs) -> Result<SwapCollection, anyhow::Error> {
    let mut file = File::open(&args.collection)
        .with_context(|| format!("Failed to open collection {}", args.collection))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).context("Failed to parse collection")
}

fn run_sign(args: SignArgs) -> Result<(), anyhow::Error> {
    let signer = PrivateKeySigner::from_str(&args.signer_key).map_err(|e| anyhow!(e))?;
    let collection = read_collection(&args.collection_args)?;
    let signature = sign_collection(&signer, &collection, args.collection_args.sender)?;
    info!(signer = %signer.address(), "Collection signed");
    println!("{}", serde_json::to_string_pretty(&collection.with_signature(signature))?);
    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<(), anyhow::Error> {
    let scenario = Scenario::from_yaml(&args.scenario)
        .with_context(|| format!("Failed to load scenario {}", args.scenario))?;
    let outcome = scenario.run()?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
