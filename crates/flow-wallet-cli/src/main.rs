//! Flow Wallet CLI
//!
//! Operator tool over the wallet core: mnemonics, key derivation, Flow
//! transaction encoding and passkey attestation decoding.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use flow_wallet_core::account::{HttpKeyIndexer, discover_accounts};
use flow_wallet_core::codec::flow::{self as flow_codec, TransactionVoucher};
use flow_wallet_core::crypto::hd::{EVM_DEFAULT_PATH, FLOW_DEFAULT_PATH};
use flow_wallet_core::key::{KeyHandle, KeySlot, mnemonic};
use flow_wallet_core::passkey::authenticator::decode_attestation_object;
use flow_wallet_core::{CryptoContext, Curve, EvmAddress, FlowAddress, Network, WalletConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "flow-wallet")]
#[command(about = "Flow wallet signing core CLI", version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Flow network
    #[arg(short, long, global = true, default_value = "mainnet")]
    network: Network,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// BIP39 mnemonic utilities
    Mnemonic {
        #[command(subcommand)]
        action: MnemonicCommand,
    },

    /// Derive the public key of a mnemonic
    Derive {
        /// Space-separated mnemonic
        #[arg(short, long)]
        mnemonic: String,

        #[arg(long, default_value = "")]
        passphrase: String,

        #[arg(short, long, value_enum, default_value = "p256")]
        curve: CurveArg,

        /// Derivation path (default: the Flow path)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// EVM address of a mnemonic at the EVM path
    EvmAddress {
        #[arg(short, long)]
        mnemonic: String,

        #[arg(long, default_value = "")]
        passphrase: String,

        #[arg(short, long, default_value = EVM_DEFAULT_PATH)]
        path: String,
    },

    /// Bytes a signer must sign for a voucher (JSON file)
    Encode {
        voucher: PathBuf,

        /// Signer address
        #[arg(short, long)]
        signer: FlowAddress,
    },

    /// Whether a signer signs the payload or the envelope
    Role {
        voucher: PathBuf,

        #[arg(short, long)]
        signer: FlowAddress,
    },

    /// Transaction id of a voucher
    TxId { voucher: PathBuf },

    /// Decode a hex CBOR attestation object
    DecodeAttestation { attestation: String },

    /// Look up accounts registered for a mnemonic's keys
    Discover {
        #[arg(short, long)]
        mnemonic: String,

        #[arg(long, default_value = "")]
        passphrase: String,
    },

    /// Show version and network constants
    Info,
}

#[derive(Subcommand)]
enum MnemonicCommand {
    /// Generate a new mnemonic
    Generate {
        /// Entropy bits (128, 160, 192, 224 or 256)
        #[arg(short, long, default_value_t = mnemonic::DEFAULT_STRENGTH)]
        strength: usize,
    },

    /// Check a mnemonic's words and checksum
    Validate { phrase: String },

    /// Wordlist entries starting with a prefix
    Suggest { prefix: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum CurveArg {
    P256,
    Secp256k1,
}

impl From<CurveArg> for Curve {
    fn from(curve: CurveArg) -> Self {
        match curve {
            CurveArg::P256 => Curve::P256,
            CurveArg::Secp256k1 => Curve::Secp256k1,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let config = match cli.network {
        Network::Mainnet => WalletConfig::mainnet(),
        Network::Testnet => WalletConfig::testnet(),
    };
    let ctx = CryptoContext::from_config(&config);

    match cli.command {
        Commands::Mnemonic { action } => run_mnemonic(action)?,
        Commands::Derive {
            mnemonic,
            passphrase,
            curve,
            path,
        } => {
            let path = path.unwrap_or_else(|| FLOW_DEFAULT_PATH.to_string());
            let handle = KeyHandle::from_mnemonic(&mnemonic, &passphrase, Some(&path))?;
            let public_key = handle
                .public_key(&ctx, curve.into(), None)?
                .context("no public key for this curve")?;
            println!("Path:       {}", path);
            println!("Curve:      {}", Curve::from(curve));
            println!("Public key: {}", public_key);
        }
        Commands::EvmAddress {
            mnemonic,
            passphrase,
            path,
        } => {
            let handle = KeyHandle::from_mnemonic(&mnemonic, &passphrase, Some(&path))?;
            let public_key = handle
                .public_key(&ctx, Curve::Secp256k1, None)?
                .context("no secp256k1 public key")?;
            println!("{}", EvmAddress::from_public_key(&public_key).to_checksum());
        }
        Commands::Encode { voucher, signer } => {
            let voucher = read_voucher(&voucher)?;
            let role = flow_codec::role(&voucher, &signer)?;
            let bytes = flow_codec::encode(&voucher, &signer)?;
            info!(?role, len = bytes.len(), "Encoded signable bytes");
            println!("{}", hex::encode(bytes));
        }
        Commands::Role { voucher, signer } => {
            let voucher = read_voucher(&voucher)?;
            println!("{}", serde_json::to_string(&flow_codec::role(&voucher, &signer)?)?);
        }
        Commands::TxId { voucher } => {
            let voucher = read_voucher(&voucher)?;
            println!("{}", hex::encode(flow_codec::transaction_id(&ctx, &voucher)?));
        }
        Commands::DecodeAttestation { attestation } => decode_attestation(&attestation)?,
        Commands::Discover {
            mnemonic,
            passphrase,
        } => {
            let slot = KeySlot::new(KeyHandle::from_mnemonic(&mnemonic, &passphrase, None)?);
            let indexer = HttpKeyIndexer::from_config(&config)?;
            let discovery = discover_accounts(&ctx, &indexer, &slot, cli.network).await?;
            slot.lock();

            let output = serde_json::json!({
                "network": cli.network,
                "partial": discovery.partial,
                "accounts": discovery.accounts,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Info => show_info(&config),
    }

    Ok(())
}

fn run_mnemonic(action: MnemonicCommand) -> Result<()> {
    match action {
        MnemonicCommand::Generate { strength } => {
            let phrase = mnemonic::generate_mnemonic(strength)?;
            println!("{}", phrase.as_str());
        }
        MnemonicCommand::Validate { phrase } => {
            if !mnemonic::validate_mnemonic(&phrase) {
                bail!("invalid mnemonic");
            }
            println!("valid");
        }
        MnemonicCommand::Suggest { prefix } => {
            for word in mnemonic::suggest_words(&prefix) {
                println!("{}", word);
            }
        }
    }
    Ok(())
}

fn read_voucher(path: &Path) -> Result<TransactionVoucher> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading voucher {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing voucher {}", path.display()))
}

fn decode_attestation(input: &str) -> Result<()> {
    let trimmed = input.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .context("attestation must be hex")?;
    let object = decode_attestation_object(&bytes)?;

    let credential = object.auth_data.attested_credential.as_ref();
    let output = serde_json::json!({
        "fmt": object.fmt,
        "rpIdHash": hex::encode(object.auth_data.rp_id_hash),
        "flags": object.auth_data.flags,
        "userPresent": object.auth_data.user_present(),
        "userVerified": object.auth_data.user_verified(),
        "signCount": object.auth_data.sign_count,
        "aaguid": credential.map(|c| hex::encode(c.aaguid)),
        "credentialId": credential.map(|c| hex::encode(&c.credential_id)),
        "publicKey": credential.map(|c| c.public_key.to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn show_info(config: &WalletConfig) {
    println!("Flow Wallet v{}", flow_wallet_core::VERSION);
    println!();
    println!("Network:            {}", config.network);
    println!("Key-indexer:        {}", config.key_indexer_url());
    println!("EVM contract:       {}", config.network.evm_contract_address());
    println!("Flow-EVM chain id:  {}", config.network.evm_chain_id());
    println!();
    println!("Derivation paths:");
    println!("  Flow: {}", config.flow_derivation_path);
    println!("  EVM:  {}", config.evm_derivation_path);
}
