//! xec-cli — Command-line eCash wallet.
//!
//! Wallet management, balances, XEC payments with optional messages, eToken
//! operations and history, over an encrypted wallet file and a REST indexer.

mod view;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use xec_client::{Config, HttpChainClient};
use xec_core::address::Address;
use xec_core::constants::Network;
use xec_core::traits::ChainClient;
use xec_core::types::{TokenId, TokenInfo, TxId};
use xec_wallet::history::{flatten_transactions, parse_tx_data};
use xec_wallet::{
    BroadcastResult, FeeRate, GenesisConfig, MessageDecryptor, NoDecryptor, Recipient,
    SendRequest, Wallet, burn_token, create_token, mint_token, send_token, send_xec,
};

use crate::view::WalletContext;

/// History entries fetched per address page.
const HISTORY_PAGE_SIZE: u32 = 25;

/// eCash command-line wallet.
#[derive(Parser)]
#[command(name = "xec-cli")]
#[command(version, about = "eCash (XEC) wallet with eTokens and encrypted messages.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet management subcommands.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Show the receive address with a QR code.
    Address(AddressArgs),
    /// Show XEC balance and eToken holdings.
    Balance(WalletArgs),
    /// Send XEC to one address.
    Send(SendArgs),
    /// Send XEC to several addresses in one transaction.
    SendMany(SendManyArgs),
    /// eToken subcommands.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Show recent transactions.
    History(HistoryArgs),
}

#[derive(Subcommand)]
enum WalletAction {
    /// Create a new wallet.
    Create(WalletCreateArgs),
    /// Restore a wallet from its 24-word backup phrase.
    Restore(WalletRestoreArgs),
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a new eToken.
    Create(TokenCreateArgs),
    /// Send eTokens.
    Send(TokenSendArgs),
    /// Mint more of a token whose baton this wallet holds.
    Mint(TokenAmountArgs),
    /// Burn eTokens.
    Burn(TokenAmountArgs),
}

#[derive(Args)]
struct WalletArgs {
    /// Path to wallet file (default: ~/.xec/wallet.dat).
    #[arg(short, long)]
    wallet: Option<PathBuf>,
}

#[derive(Args)]
struct WalletCreateArgs {
    /// Path to wallet file (default: ~/.xec/wallet.dat).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Network (mainnet or testnet). Defaults to XEC_NETWORK.
    #[arg(short, long)]
    network: Option<String>,
}

#[derive(Args)]
struct WalletRestoreArgs {
    /// Path to wallet file (default: ~/.xec/wallet.dat).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// 24-word backup phrase. If not provided, will prompt securely.
    #[arg(short, long)]
    mnemonic: Option<String>,

    /// Network (mainnet or testnet). Defaults to XEC_NETWORK.
    #[arg(short, long)]
    network: Option<String>,
}

#[derive(Args)]
struct AddressArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Show the etoken: form of the address.
    #[arg(short, long)]
    token: bool,
}

#[derive(Args)]
struct FeeArgs {
    /// Fee rate in sat/byte.
    #[arg(long, default_value = "1.01")]
    fee_rate: FeeRate,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount in XEC (e.g. 12.34).
    #[arg(short, long)]
    amount: String,

    /// Message attached in an OP_RETURN output.
    #[arg(short, long)]
    message: Option<String>,

    /// Encrypt the message to the recipient's public key.
    #[arg(short, long, requires = "message")]
    encrypt: bool,

    /// Tag the payment as an airdrop to holders of this token id.
    #[arg(long)]
    airdrop: Option<String>,

    #[command(flatten)]
    fee: FeeArgs,
}

#[derive(Args)]
struct SendManyArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// File with one `address,amount` line per recipient (amounts in XEC).
    #[arg(short, long)]
    recipients: PathBuf,

    /// Message attached in an OP_RETURN output.
    #[arg(short, long)]
    message: Option<String>,

    /// Tag the payment as an airdrop to holders of this token id.
    #[arg(long)]
    airdrop: Option<String>,

    #[command(flatten)]
    fee: FeeArgs,
}

#[derive(Args)]
struct TokenCreateArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    #[arg(long)]
    name: String,

    #[arg(long)]
    ticker: String,

    /// Number of decimal places (0-9).
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=9))]
    decimals: u8,

    /// Initial supply, in whole tokens (decimals allowed).
    #[arg(long)]
    quantity: String,

    #[arg(long, default_value = "")]
    document_url: String,

    /// Hex-encoded 32-byte document hash.
    #[arg(long)]
    document_hash: Option<String>,

    /// Keep a mint baton for future issuance.
    #[arg(long)]
    mint_baton: bool,

    #[command(flatten)]
    fee: FeeArgs,
}

#[derive(Args)]
struct TokenSendArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Token id (hex).
    #[arg(long)]
    token_id: String,

    /// Recipient address (ecash: or etoken:).
    #[arg(short, long)]
    to: String,

    /// Amount in whole tokens (decimals allowed).
    #[arg(short, long)]
    amount: String,

    #[command(flatten)]
    fee: FeeArgs,
}

#[derive(Args)]
struct TokenAmountArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Token id (hex).
    #[arg(long)]
    token_id: String,

    /// Amount in whole tokens (decimals allowed).
    #[arg(short, long)]
    amount: String,

    #[command(flatten)]
    fee: FeeArgs,
}

#[derive(Args)]
struct HistoryArgs {
    #[command(flatten)]
    wallet: WalletArgs,

    /// Maximum number of transactions to show.
    #[arg(short, long, default_value = "20")]
    count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid environment configuration")?;

    match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Create(args) => wallet_create(&config, args),
            WalletAction::Restore(args) => wallet_restore(&config, args),
        },
        Commands::Address(args) => wallet_address(args),
        Commands::Balance(args) => wallet_balance(&config, args).await,
        Commands::Send(args) => wallet_send(&config, args).await,
        Commands::SendMany(args) => wallet_send_many(&config, args).await,
        Commands::Token { action } => match action {
            TokenAction::Create(args) => token_create(&config, args).await,
            TokenAction::Send(args) => token_send(&config, args).await,
            TokenAction::Mint(args) => token_mint(&config, args).await,
            TokenAction::Burn(args) => token_burn(&config, args).await,
        },
        Commands::History(args) => wallet_history(&config, args).await,
    }
}

/// Create a new wallet with a random seed.
fn wallet_create(config: &Config, args: WalletCreateArgs) -> Result<()> {
    let wallet_path = resolve_wallet_path(args.file)?;
    let network = resolve_network(config, args.network.as_deref())?;

    if wallet_path.exists() {
        bail!("Wallet file already exists: {}", wallet_path.display());
    }

    let password = prompt_new_password()?;
    let wallet = Wallet::create(network);
    let mnemonic = wallet.mnemonic().context("Failed to encode backup phrase")?;

    println!("\n=== WALLET CREATED ===");
    println!("Network: {}", network.name());
    println!("\nBACKUP PHRASE (24 WORDS):");
    println!("  {mnemonic}");
    println!("\nWARNING: This phrase will NOT be shown again.");
    println!("Anyone with this phrase can spend your funds.");

    save_wallet(&wallet, &wallet_path, &password)?;
    println!("\nWallet saved to: {}", wallet_path.display());
    Ok(())
}

/// Restore a wallet from its backup phrase.
fn wallet_restore(config: &Config, args: WalletRestoreArgs) -> Result<()> {
    let wallet_path = resolve_wallet_path(args.file)?;
    let network = resolve_network(config, args.network.as_deref())?;

    if wallet_path.exists() {
        bail!("Wallet file already exists: {}", wallet_path.display());
    }

    let phrase = match args.mnemonic {
        Some(m) => m,
        None => prompt_password("Enter 24-word backup phrase")?,
    };
    let wallet = Wallet::from_mnemonic(phrase.trim(), network).context("Invalid backup phrase")?;

    let password = prompt_new_password()?;
    save_wallet(&wallet, &wallet_path, &password)?;

    println!("\n=== WALLET RESTORED ===");
    println!("Network: {}", network.name());
    println!("Wallet saved to: {}", wallet_path.display());
    Ok(())
}

/// Display the receive address and its QR code.
fn wallet_address(args: AddressArgs) -> Result<()> {
    let wallet = open_wallet(args.wallet.wallet)?;
    println!(
        "{}",
        view::render_receive(&WalletContext::from_wallet(&wallet), args.token)
    );
    Ok(())
}

/// Refresh and display XEC balance and token holdings.
async fn wallet_balance(config: &Config, args: WalletArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet)?;
    let client = connect(config, wallet.network())?;

    println!("{}", view::render_balance(&WalletContext { loading: true, ..Default::default() }));
    wallet
        .refresh(&client)
        .await
        .context("Failed to fetch wallet UTXOs")?;

    let infos = token_infos(&client, wallet.tokens().iter().map(|t| t.token_id)).await?;

    println!("\n=== WALLET BALANCE ===");
    println!("Network: {}", wallet.network().name());
    println!("UTXOs: {}", wallet.utxos().len());
    println!();
    println!("{}", view::render_balance(&WalletContext::from_wallet(&wallet)));
    println!("\n=== ETOKENS ===");
    println!("{}", view::render_tokens(wallet.tokens(), &infos));
    Ok(())
}

/// Send XEC to a single recipient.
async fn wallet_send(config: &Config, args: SendArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let recipient = parse_address(&args.to, wallet.network())?;
    let client = connect(config, wallet.network())?;
    wallet.refresh(&client).await.context("Failed to fetch wallet UTXOs")?;

    let mut request = SendRequest::single(recipient.clone(), &args.amount);
    request.message = args.message;
    request.encrypt = args.encrypt;
    request.airdrop_token_id = parse_token_id(args.airdrop.as_deref())?;

    let result = send_xec(&client, &wallet, wallet.utxos(), args.fee.fee_rate, &request)
        .await
        .context("Send failed")?;

    println!("\n=== TRANSACTION SENT ===");
    println!("To: {}", recipient.encode());
    println!("Amount: {} XEC", args.amount);
    print_broadcast(&result);
    Ok(())
}

/// Send XEC to every recipient listed in a file.
async fn wallet_send_many(config: &Config, args: SendManyArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let text = std::fs::read_to_string(&args.recipients)
        .with_context(|| format!("Failed to read {}", args.recipients.display()))?;
    let recipients =
        Recipient::parse_lines(&text, wallet.network()).context("Invalid recipient list")?;
    let total: u64 = recipients.iter().map(|r| r.amount).sum();
    let count = recipients.len();

    let client = connect(config, wallet.network())?;
    wallet.refresh(&client).await.context("Failed to fetch wallet UTXOs")?;

    let mut request = SendRequest::one_to_many(recipients);
    request.message = args.message;
    request.airdrop_token_id = parse_token_id(args.airdrop.as_deref())?;

    let result = send_xec(&client, &wallet, wallet.utxos(), args.fee.fee_rate, &request)
        .await
        .context("Send failed")?;

    println!("\n=== TRANSACTION SENT ===");
    println!("Recipients: {count}");
    println!("Total: {}", view::format_xec(total));
    print_broadcast(&result);
    Ok(())
}

/// Issue a new token.
async fn token_create(config: &Config, args: TokenCreateArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let document_hash = args
        .document_hash
        .as_deref()
        .map(|h| -> Result<[u8; 32]> {
            let bytes = hex::decode(h).context("Invalid document hash hex")?;
            bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("Document hash must be exactly 32 bytes"))
        })
        .transpose()?;

    let genesis = GenesisConfig {
        name: args.name,
        ticker: args.ticker,
        document_url: args.document_url,
        document_hash,
        decimals: args.decimals,
        initial_quantity: args.quantity,
        mint_baton: args.mint_baton,
    };

    let client = connect(config, wallet.network())?;
    wallet.refresh(&client).await.context("Failed to fetch wallet UTXOs")?;

    let result = create_token(&client, &wallet, wallet.utxos(), args.fee.fee_rate, &genesis)
        .await
        .context("Token creation failed")?;

    println!("\n=== TOKEN CREATED ===");
    println!("Ticker: {}", genesis.ticker);
    println!("Supply: {}", genesis.initial_quantity);
    print_broadcast(&result);
    Ok(())
}

/// Send tokens to an address.
async fn token_send(config: &Config, args: TokenSendArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let token_id = token_id_arg(&args.token_id)?;
    let destination = parse_address(&args.to, wallet.network())?;

    let client = connect(config, wallet.network())?;
    wallet.refresh(&client).await.context("Failed to fetch wallet UTXOs")?;

    let result = send_token(
        &client,
        &wallet,
        wallet.utxos(),
        args.fee.fee_rate,
        &token_id,
        &destination,
        &args.amount,
    )
    .await
    .context("Token send failed")?;

    println!("\n=== TOKENS SENT ===");
    println!("To: {}", destination.encode_token());
    println!("Amount: {}", args.amount);
    print_broadcast(&result);
    Ok(())
}

/// Mint more of a token.
async fn token_mint(config: &Config, args: TokenAmountArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let token_id = token_id_arg(&args.token_id)?;

    let client = connect(config, wallet.network())?;
    wallet.refresh(&client).await.context("Failed to fetch wallet UTXOs")?;

    let result = mint_token(
        &client,
        &wallet,
        wallet.utxos(),
        args.fee.fee_rate,
        &token_id,
        &args.amount,
    )
    .await
    .context("Mint failed")?;

    println!("\n=== TOKENS MINTED ===");
    println!("Amount: {}", args.amount);
    print_broadcast(&result);
    Ok(())
}

/// Burn tokens.
async fn token_burn(config: &Config, args: TokenAmountArgs) -> Result<()> {
    let mut wallet = open_wallet(args.wallet.wallet)?;
    let token_id = token_id_arg(&args.token_id)?;

    let client = connect(config, wallet.network())?;
    wallet.refresh(&client).await.context("Failed to fetch wallet UTXOs")?;

    let result = burn_token(
        &client,
        &wallet,
        wallet.utxos(),
        args.fee.fee_rate,
        &token_id,
        &args.amount,
    )
    .await
    .context("Burn failed")?;

    println!("\n=== TOKENS BURNED ===");
    println!("Amount: {}", args.amount);
    print_broadcast(&result);
    Ok(())
}

/// Show the most recent transactions across all wallet addresses.
async fn wallet_history(config: &Config, args: HistoryArgs) -> Result<()> {
    let wallet = open_wallet(args.wallet.wallet)?;
    let client = connect(config, wallet.network())?;

    let mut histories = Vec::with_capacity(wallet.addresses().len());
    for address in wallet.addresses() {
        let page = client
            .history(address, 0, HISTORY_PAGE_SIZE)
            .await
            .with_context(|| format!("Failed to fetch history for {address}"))?;
        histories.push((address.clone(), vec![page]));
    }

    let entries = flatten_transactions(&histories, args.count);
    let txids: Vec<TxId> = entries.iter().map(|e| e.tx.txid).collect();
    debug!(count = txids.len(), "parsing history");

    let decryptor: &dyn MessageDecryptor = match wallet.keychain() {
        Some(keychain) => keychain,
        None => &NoDecryptor,
    };
    let records = parse_tx_data(
        &client,
        &txids,
        &wallet.wallet_hashes(),
        wallet.network(),
        decryptor,
    )
    .await
    .context("Failed to parse history")?;

    println!("{}", view::render_history(&records));
    Ok(())
}

async fn token_infos(
    client: &dyn ChainClient,
    token_ids: impl Iterator<Item = TokenId>,
) -> Result<HashMap<TokenId, TokenInfo>> {
    let mut infos = HashMap::new();
    for token_id in token_ids {
        let info = client
            .token(&token_id)
            .await
            .with_context(|| format!("Failed to fetch token {token_id}"))?;
        infos.insert(token_id, info);
    }
    Ok(infos)
}

fn print_broadcast(result: &BroadcastResult) {
    println!("TxID: {}", result.txid);
    println!("Explorer: {}", result.explorer_url);
}

/// Load the wallet file, prompting for its password.
fn open_wallet(path: Option<PathBuf>) -> Result<Wallet> {
    let wallet_path = resolve_wallet_path(path)?;
    let password = prompt_password("Wallet password")?;
    Wallet::load_from_file(&wallet_path, password.as_bytes())
        .context("Failed to load wallet (check password)")
}

fn save_wallet(wallet: &Wallet, path: &Path, password: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    wallet
        .save_to_file(path, password.as_bytes())
        .context("Failed to save wallet")
}

/// Indexer client for `network`, whatever network the environment selects.
fn connect(config: &Config, network: Network) -> Result<HttpChainClient> {
    let config = Config {
        network,
        ..config.clone()
    };
    let url = config.primary_url()?;
    debug!(url, "using indexer");
    HttpChainClient::new(url).context("Failed to create HTTP client")
}

fn parse_address(s: &str, network: Network) -> Result<Address> {
    Address::decode_for_network(s.trim(), network)
        .with_context(|| format!("Invalid address for {}: {s}", network.name()))
}

fn token_id_arg(s: &str) -> Result<TokenId> {
    s.trim()
        .parse::<TokenId>()
        .with_context(|| format!("Invalid token id: {s}"))
}

fn parse_token_id(s: Option<&str>) -> Result<Option<TokenId>> {
    s.map(token_id_arg).transpose()
}

fn prompt_new_password() -> Result<String> {
    let password = prompt_password("Enter wallet password")?;
    let password_confirm = prompt_password("Confirm password")?;
    if password != password_confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

/// Prompt for a password securely (no echo).
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read password")
}

/// Resolve wallet file path, using default if not provided.
fn resolve_wallet_path(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = path {
        return Ok(p);
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".xec").join("wallet.dat"))
}

/// Network from the command line, falling back to the environment.
fn resolve_network(config: &Config, arg: Option<&str>) -> Result<Network> {
    match arg {
        Some(s) => {
            Network::parse(s).context("Invalid network (must be 'mainnet' or 'testnet')")
        }
        None => Ok(config.network),
    }
}
