//! Airdrop CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use airdrop_cli::{read_entitlements, read_manifest, write_manifest};
use airdrop_core::{verify_entitlement, DistributionTreeBuilder};
use airdrop_ledger::{
    open_db, ClaimLedger, ClaimRecord, FundedExecutor, LedgerConfig, QueuedOnCommit,
    SledClaimRecord, TokenVault, TransferExecutor, TransferOutbox,
};
use airdrop_types::{Address, Amount, Digest, Entitlement, MerkleProof, TransferInstruction};

#[derive(Parser)]
#[command(name = "airdrop")]
#[command(about = "Merkle airdrop commitment and claim tool", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a distribution manifest from a CSV list
    Build {
        /// CSV file with `address,amount` columns
        #[arg(short, long)]
        input: PathBuf,

        /// Manifest output path
        #[arg(short, long, default_value = "manifest.json")]
        output: PathBuf,
    },

    /// Print the proof for a recipient
    Prove {
        #[arg(short, long)]
        manifest: PathBuf,

        #[arg(short, long)]
        address: Address,

        /// Expected amount; must match the committed one
        #[arg(long)]
        amount: Option<Amount>,
    },

    /// Verify a proof offline against a root
    Verify {
        #[arg(short, long)]
        root: Digest,

        #[arg(short, long)]
        address: Address,

        #[arg(long)]
        amount: Amount,

        /// Comma separated sibling digests, leaf level first
        #[arg(short, long, value_delimiter = ',')]
        proof: Vec<Digest>,
    },

    /// Redeem an entitlement against the ledger
    Claim {
        #[arg(short, long)]
        config: PathBuf,

        /// Manifest to take the amount and proof from
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        #[arg(short, long)]
        address: Address,

        #[arg(long, requires = "proof", conflicts_with = "manifest")]
        amount: Option<Amount>,

        #[arg(short, long, value_delimiter = ',', conflicts_with = "manifest")]
        proof: Option<Vec<Digest>>,
    },

    /// Show the claim state of a recipient
    Status {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        address: Address,
    },

    /// Write a default ledger configuration
    InitConfig {
        /// Output path
        path: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(input: &Path, output: &Path) -> Result<()> {
    let entitlements = read_entitlements(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut builder = DistributionTreeBuilder::new();
    builder.extend(entitlements);
    let tree = builder.build()?;
    let manifest = tree.manifest()?;
    write_manifest(output, &manifest)?;

    println!("Distribution built successfully");
    println!("Merkle root:  {}", tree.root());
    println!("Recipients:   {}", tree.leaf_count());
    println!("Total amount: {}", tree.total_amount());
    println!("Tree depth:   {}", tree.merkle_tree().depth());
    println!("Manifest:     {}", output.display());
    Ok(())
}

fn prove(manifest: &Path, address: &Address, amount: Option<Amount>) -> Result<()> {
    let manifest = read_manifest(manifest)?;
    let entry = manifest
        .entry(address)
        .ok_or_else(|| anyhow::anyhow!("No entitlement for {}", address))?;

    if let Some(amount) = amount {
        if amount != entry.amount {
            bail!(
                "Amount {} does not match committed amount {} for {}",
                amount,
                entry.amount,
                address
            );
        }
    }

    println!("Recipient: {}", address);
    println!("Amount:    {}", entry.amount);
    println!("Leaf:      {}", entry.leaf);
    println!("Root:      {}", manifest.merkle_root);
    println!("Proof:     {}", entry.proof.to_hex().join(","));
    Ok(())
}

fn verify(root: &Digest, address: &Address, amount: &Amount, proof: Vec<Digest>) -> Result<()> {
    let entitlement = Entitlement::new(*address, *amount);
    verify_entitlement(&entitlement, &MerkleProof::new(proof), root)?;

    println!("Proof verified successfully");
    println!("Recipient: {}", address);
    println!("Amount:    {}", amount);
    Ok(())
}

fn claim(
    config: &Path,
    manifest: Option<PathBuf>,
    address: &Address,
    amount: Option<Amount>,
    proof: Option<Vec<Digest>>,
) -> Result<()> {
    let config = LedgerConfig::from_file(config)
        .with_context(|| format!("Failed to load config {}", config.display()))?;

    let (amount, proof) = match (manifest, amount, proof) {
        (Some(path), _, _) => {
            let manifest = read_manifest(&path)?;
            if manifest.merkle_root != config.distribution.merkle_root {
                warn!(
                    manifest_root = %manifest.merkle_root,
                    ledger_root = %config.distribution.merkle_root,
                    "manifest root differs from configured root"
                );
            }
            let entry = manifest
                .entry(address)
                .ok_or_else(|| anyhow::anyhow!("No entitlement for {}", address))?;
            (entry.amount, entry.proof.clone())
        }
        (None, Some(amount), Some(proof)) => (amount, MerkleProof::new(proof)),
        _ => bail!("Either --manifest or both --amount and --proof are required"),
    };

    let db = open_db(&config.storage.path)?;
    let records = SledClaimRecord::with_outbox(&db)?;
    let outbox = TransferOutbox::with_db(&db)?;
    let root = config.distribution.merkle_root;

    let instruction = match &config.vault {
        Some(vault) => {
            // Everything already queued has been paid out of the initial balance
            let mut remaining = vault.initial_balance;
            for queued in outbox.list()? {
                remaining = remaining
                    .checked_sub(&queued.amount)
                    .ok_or_else(|| anyhow::anyhow!("Outbox exceeds configured vault balance"))?;
            }
            let executor = FundedExecutor::new(TokenVault::new(remaining), QueuedOnCommit);
            run_claim(ClaimLedger::new(root, records, executor), address, &amount, &proof)?
        }
        None => {
            let ledger = ClaimLedger::new(root, records, QueuedOnCommit);
            run_claim(ledger, address, &amount, &proof)?
        }
    };

    println!("Claim succeeded");
    println!("Recipient: {}", instruction.recipient);
    println!("Amount:    {}", instruction.amount);
    println!("Transfer queued in {}", config.storage.path.display());
    Ok(())
}

fn run_claim<R: ClaimRecord, T: TransferExecutor>(
    ledger: ClaimLedger<R, T>,
    address: &Address,
    amount: &Amount,
    proof: &MerkleProof,
) -> Result<TransferInstruction> {
    Ok(ledger.claim(address, amount, proof)?)
}

fn status(config: &Path, address: &Address) -> Result<()> {
    let config = LedgerConfig::from_file(config)
        .with_context(|| format!("Failed to load config {}", config.display()))?;
    let db = open_db(&config.storage.path)?;
    let records = SledClaimRecord::with_db(&db)?;

    println!("Recipient: {}", address);
    println!("Root:      {}", config.distribution.merkle_root);
    match records.receipt(address)? {
        Some(receipt) => {
            println!("Status:    Claimed");
            println!("Amount:    {}", receipt.amount);
            println!("Claimed:   {}", receipt.claimed_at);
        }
        None if records.is_claimed(address)? => {
            println!("Status:    Pending (in doubt, needs operator review)");
        }
        None => println!("Status:    Unclaimed"),
    }
    println!("Total claims: {}", records.claimed_count()?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build { input, output } => build(&input, &output)?,

        Commands::Prove {
            manifest,
            address,
            amount,
        } => prove(&manifest, &address, amount)?,

        Commands::Verify {
            root,
            address,
            amount,
            proof,
        } => verify(&root, &address, &amount, proof)?,

        Commands::Claim {
            config,
            manifest,
            address,
            amount,
            proof,
        } => claim(&config, manifest, &address, amount, proof)?,

        Commands::Status { config, address } => status(&config, &address)?,

        Commands::InitConfig { path } => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            LedgerConfig::default().to_file(&path)?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}
