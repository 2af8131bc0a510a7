//! `cresca` command-line wallet.
//!
//! # Architecture Overview
//!
//! ```text
//!     cresca <command>
//!         │
//!         ▼
//!     ┌────────┐   ┌──────────────────────────────────────────────┐
//!     │ config │──▶│ WalletService                                │
//!     └────────┘   │   storage (encrypted key, local state)       │
//!                  │   blockchain (RpcClient failover, TxBuilder) │
//!                  │   contracts (payments, schedules, buckets)   │
//!                  └──────────────────────────────────────────────┘
//!                  ┌──────────────┐   ┌──────────────────────────┐
//!                  │ prices, pyth │   │ movement (Move network)  │
//!                  └──────────────┘   └──────────────────────────┘
//! ```
//!
//! Command output is JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use cresca_wallet::blockchain::{
    format_ether, parse_address, parse_ether_amount, ConfirmationStatus, NetworkKind,
};
use cresca_wallet::config::{load_or_default, WalletConfig};
use cresca_wallet::contracts::scheduled::NewSchedule;
use cresca_wallet::contracts::ScheduleKeeper;
use cresca_wallet::lifecycle::{shutdown_on_signal, Shutdown};
use cresca_wallet::movement::{format_octas, MovementClient, MovementService};
use cresca_wallet::observability::{logging, metrics};
use cresca_wallet::prices::{calculate_position_pnl, PriceService, PythOracle, DEFAULT_MIN_CONFIDENCE};
use cresca_wallet::storage::{movement_key, TransactionHistory, KEY_TRANSACTION_HISTORY};
use cresca_wallet::WalletService;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "cresca")]
#[command(about = "Cresca wallet: payments, schedules, buckets and prices", long_about = None)]
struct Cli {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "cresca.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the wallet key
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// Send native tokens
    Send { to: String, amount: String },
    /// Show the local transaction history
    History,
    /// Receipt state of a transaction
    Tx { hash: String },
    /// Show or switch the active network
    #[command(subcommand)]
    Network(NetworkCommand),
    /// Instant payments contract
    #[command(subcommand)]
    Pay(PayCommand),
    /// Scheduled payments contract
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// Leveraged bucket protocol
    #[command(subcommand)]
    Bucket(BucketCommand),
    /// CoinGecko / Binance prices
    #[command(subcommand)]
    Price(PriceCommand),
    /// Pyth oracle prices
    #[command(subcommand)]
    Pyth(PythCommand),
    /// Execute due scheduled payments until interrupted
    Keeper,
    /// Move network backend
    #[command(subcommand)]
    Move(MoveCommand),
}

#[derive(Args)]
struct KeyEnv {
    /// Environment variable holding the private key
    #[arg(long, default_value = "CRESCA_PRIVATE_KEY")]
    key_env: String,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Load the stored key or create one
    Init,
    /// Replace the stored key with a new random one
    Create,
    /// Import a key from an environment variable
    Import(KeyEnv),
    /// Delete the key, address and history
    Reset,
    /// Address and balance
    Info,
}

#[derive(Subcommand)]
enum NetworkCommand {
    Show,
    Switch { network: NetworkKind },
}

#[derive(Subcommand)]
enum PayCommand {
    /// Payment with a memo
    Send {
        to: String,
        amount: String,
        #[arg(long, default_value = "")]
        memo: String,
    },
    /// Memo-less payment
    Tap { to: String, amount: String },
    /// One transaction, several recipients
    Batch {
        #[arg(long, value_delimiter = ',', required = true)]
        to: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        amounts: Vec<String>,
    },
    /// Sent and received payments, newest first
    List { address: Option<String> },
    /// Payment counts and volumes
    Stats { address: Option<String> },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    Create {
        recipient: String,
        /// Amount per occurrence
        amount: String,
        /// Unix time of the first execution
        #[arg(long)]
        at: u64,
        #[arg(long, default_value_t = 0)]
        interval: u64,
        #[arg(long, default_value_t = 1)]
        occurrences: u64,
    },
    List {
        address: Option<String>,
        #[arg(long)]
        active: bool,
    },
    Execute { payer: String, id: u64 },
    Cancel { id: u64 },
    /// Next execution time and whether a schedule is due
    Status { payer: String, id: u64 },
    /// Total escrow held for an address
    Escrow { address: Option<String> },
}

#[derive(Subcommand)]
enum BucketCommand {
    Create {
        #[arg(long, value_delimiter = ',', required = true)]
        assets: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        weights: Vec<u64>,
        #[arg(long)]
        leverage: u8,
    },
    Rebalance {
        id: u64,
        #[arg(long, value_delimiter = ',', required = true)]
        weights: Vec<u64>,
    },
    Deposit { amount: String },
    Withdraw { amount: String },
    Collateral { address: Option<String> },
    Open {
        bucket_id: u64,
        margin: String,
        #[arg(long)]
        short: bool,
    },
    Close { position_id: u64 },
    List { address: Option<String> },
    Positions { address: Option<String> },
    Pnl { position_id: u64 },
}

#[derive(Subcommand)]
enum PriceCommand {
    Get { symbol: String },
    Bundle,
    /// Leveraged PnL between two prices
    Pnl {
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        current: f64,
        #[arg(long)]
        margin: f64,
        #[arg(long, default_value_t = 1.0)]
        leverage: f64,
        #[arg(long)]
        short: bool,
    },
}

#[derive(Subcommand)]
enum PythCommand {
    Get { symbol: String },
    Many {
        #[arg(value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
    Bundle,
}

#[derive(Subcommand)]
enum MoveCommand {
    Init,
    Import(MoveKeyEnv),
    Balance { address: Option<String> },
    Fund { address: Option<String> },
    Pay {
        to: String,
        amount: String,
        #[arg(long, default_value = "")]
        memo: String,
    },
    Tap { to: String, amount: String },
    Batch {
        #[arg(long, value_delimiter = ',', required = true)]
        to: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        amounts: Vec<String>,
    },
    Stats { address: Option<String> },
    Status { address: Option<String> },
    InitWallet,
    Schedule {
        to: String,
        amount: String,
        #[arg(long)]
        at: u64,
        #[arg(long, default_value_t = 0)]
        interval: u64,
    },
    InitBuckets,
    CreateBucket {
        #[arg(long, value_delimiter = ',', required = true)]
        assets: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        weights: Vec<u64>,
        #[arg(long)]
        leverage: u8,
    },
    Open {
        bucket_id: u64,
        margin: String,
        #[arg(long)]
        short: bool,
    },
    Close { position_id: u64 },
    History,
}

#[derive(Args)]
struct MoveKeyEnv {
    /// Environment variable holding the private key
    #[arg(long, default_value = "CRESCA_MOVE_PRIVATE_KEY")]
    key_env: String,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let mut config = load_or_default(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    logging::init(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);

    match cli.command {
        Commands::Price(cmd) => run_price(&config, cmd).await,
        Commands::Pyth(cmd) => run_pyth(&config, cmd).await,
        Commands::Move(cmd) => run_move(open_service(&config)?, cmd).await,
        Commands::Keeper => run_keeper(open_service(&config)?).await,
        Commands::Wallet(cmd) => run_wallet(open_service(&config)?, cmd).await,
        Commands::Network(cmd) => run_network(open_service(&config)?, cmd).await,
        Commands::Pay(cmd) => run_pay(open_service(&config)?, cmd).await,
        Commands::Schedule(cmd) => run_schedule(open_service(&config)?, cmd).await,
        Commands::Bucket(cmd) => run_bucket(open_service(&config)?, cmd).await,
        Commands::History => print_json(&open_service(&config)?.transaction_history()?),
        Commands::Tx { hash } => run_tx_status(open_service(&config)?, &hash).await,
        Commands::Send { to, amount } => {
            let service = open_service(&config)?;
            ready(&service).await?;
            print_json(&service.send_native(&to, &amount).await?)
        }
    }
}

fn open_service(config: &Arc<WalletConfig>) -> CliResult<WalletService> {
    Ok(WalletService::open(config.clone())?)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_key(var: &str) -> CliResult<String> {
    std::env::var(var).map_err(|_| format!("environment variable {} is not set", var).into())
}

fn address_or_self(
    service: &WalletService,
    address: Option<String>,
) -> CliResult<alloy::primitives::Address> {
    match address {
        Some(a) => Ok(parse_address(&a)?),
        None => service
            .wallet_address()
            .ok_or_else(|| "wallet not initialized".into()),
    }
}

/// Load or create the wallet before a command that signs or reads as it.
async fn ready(service: &WalletService) -> CliResult<alloy::primitives::Address> {
    Ok(service.initialize_wallet().await?.address)
}

async fn run_wallet(service: WalletService, command: WalletCommand) -> CliResult<()> {
    match command {
        WalletCommand::Init => print_json(&service.initialize_wallet().await?),
        WalletCommand::Create => print_json(&service.create_new_wallet().await?),
        WalletCommand::Import(env) => {
            let address = service.import_wallet(&read_key(&env.key_env)?).await?;
            print_json(&serde_json::json!({ "address": address }))
        }
        WalletCommand::Reset => {
            service.reset_wallet().await?;
            print_json(&serde_json::json!({ "reset": true }))
        }
        WalletCommand::Info => {
            let me = ready(&service).await?;
            let balance = service.refresh_balance().await?;
            print_json(&serde_json::json!({
                "address": me,
                "balance": balance,
                "network": service.network_info(),
            }))
        }
    }
}

async fn run_network(service: WalletService, command: NetworkCommand) -> CliResult<()> {
    match command {
        NetworkCommand::Show => print_json(&service.network_info()),
        NetworkCommand::Switch { network } => {
            service.switch_network(network).await?;
            print_json(&service.network_info())
        }
    }
}

async fn run_tx_status(service: WalletService, hash: &str) -> CliResult<()> {
    ready(&service).await?;
    let hash: alloy::primitives::TxHash = hash.trim().parse()?;
    let status = service.tx_builder()?.confirmation_status(hash).await?;

    let report = match status {
        ConfirmationStatus::Pending => serde_json::json!({ "status": "pending" }),
        ConfirmationStatus::Confirming { current, required } => serde_json::json!({
            "status": "confirming",
            "confirmations": current,
            "required": required,
        }),
        ConfirmationStatus::Confirmed {
            block_number,
            gas_used,
        } => serde_json::json!({
            "status": "confirmed",
            "block_number": block_number,
            "gas_used": gas_used,
        }),
        ConfirmationStatus::Failed(reason) => {
            serde_json::json!({ "status": "failed", "reason": reason })
        }
    };
    print_json(&report)
}

async fn run_pay(service: WalletService, cmd: PayCommand) -> CliResult<()> {
    ready(&service).await?;
    let payments = service.payments()?;
    match cmd {
        PayCommand::Send { to, amount, memo } => print_json(
            &payments
                .send_payment(parse_address(&to)?, parse_ether_amount(&amount)?, &memo)
                .await?,
        ),
        PayCommand::Tap { to, amount } => print_json(
            &payments
                .tap_to_pay(parse_address(&to)?, parse_ether_amount(&amount)?)
                .await?,
        ),
        PayCommand::Batch { to, amounts } => {
            let recipients = to
                .iter()
                .map(|a| parse_address(a))
                .collect::<Result<Vec<_>, _>>()?;
            let amounts = amounts
                .iter()
                .map(|a| parse_ether_amount(a))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&payments.batch_send(&recipients, &amounts).await?)
        }
        PayCommand::List { address } => {
            let user = address_or_self(&service, address)?;
            print_json(&payments.user_transactions(user).await?)
        }
        PayCommand::Stats { address } => {
            let user = address_or_self(&service, address)?;
            let (count, volume) =
                tokio::try_join!(payments.payment_count(user), payments.user_volume(user))?;
            print_json(&serde_json::json!({ "count": count, "volume": volume }))
        }
    }
}

async fn run_schedule(service: WalletService, cmd: ScheduleCommand) -> CliResult<()> {
    ready(&service).await?;
    let schedules = service.scheduled_payments()?;
    match cmd {
        ScheduleCommand::Create {
            recipient,
            amount,
            at,
            interval,
            occurrences,
        } => {
            let schedule = NewSchedule {
                recipient: parse_address(&recipient)?,
                amount: parse_ether_amount(&amount)?,
                execute_at: at,
                interval_secs: interval,
                occurrences,
            };
            print_json(&schedules.create_schedule(schedule).await?)
        }
        ScheduleCommand::List { address, active } => {
            let user = address_or_self(&service, address)?;
            if active {
                print_json(&schedules.active_schedules(user).await?)
            } else {
                print_json(&schedules.user_schedules(user).await?)
            }
        }
        ScheduleCommand::Execute { payer, id } => {
            print_json(&schedules.execute(parse_address(&payer)?, id).await?)
        }
        ScheduleCommand::Cancel { id } => print_json(&schedules.cancel(id).await?),
        ScheduleCommand::Status { payer, id } => {
            let payer = parse_address(&payer)?;
            let (executable, next) = tokio::try_join!(
                schedules.is_executable(payer, id),
                schedules.next_execution_time(payer, id)
            )?;
            print_json(&serde_json::json!({
                "executable": executable,
                "next_execution_time": next,
            }))
        }
        ScheduleCommand::Escrow { address } => {
            let user = address_or_self(&service, address)?;
            let total = schedules.total_escrowed(user).await?;
            print_json(&serde_json::json!({ "escrowed": format_ether(total) }))
        }
    }
}

async fn run_bucket(service: WalletService, cmd: BucketCommand) -> CliResult<()> {
    let me = ready(&service).await?;
    let buckets = service.buckets()?;
    match cmd {
        BucketCommand::Create {
            assets,
            weights,
            leverage,
        } => {
            let assets = assets
                .iter()
                .map(|a| parse_address(a))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&buckets.create_bucket(&assets, &weights, leverage).await?)
        }
        BucketCommand::Rebalance { id, weights } => {
            print_json(&buckets.rebalance(id, &weights).await?)
        }
        BucketCommand::Deposit { amount } => {
            print_json(&buckets.deposit_collateral(parse_ether_amount(&amount)?).await?)
        }
        BucketCommand::Withdraw { amount } => {
            print_json(&buckets.withdraw_collateral(parse_ether_amount(&amount)?).await?)
        }
        BucketCommand::Collateral { address } => {
            let user = address_or_self(&service, address)?;
            let balance = buckets.collateral_balance(user).await?;
            print_json(&serde_json::json!({ "collateral": format_ether(balance) }))
        }
        BucketCommand::Open {
            bucket_id,
            margin,
            short,
        } => print_json(
            &buckets
                .open_position(bucket_id, !short, parse_ether_amount(&margin)?)
                .await?,
        ),
        BucketCommand::Close { position_id } => {
            print_json(&buckets.close_position(position_id).await?)
        }
        BucketCommand::List { address } => {
            let user = address_or_self(&service, address)?;
            print_json(&buckets.user_buckets(user).await?)
        }
        BucketCommand::Positions { address } => {
            let user = address_or_self(&service, address)?;
            print_json(&buckets.user_positions(user).await?)
        }
        BucketCommand::Pnl { position_id } => {
            let pnl = buckets.unrealized_pnl(me, position_id).await?;
            print_json(&serde_json::json!({ "unrealized_pnl_wei": pnl.to_string() }))
        }
    }
}

async fn run_keeper(service: WalletService) -> CliResult<()> {
    service.initialize_wallet().await?;

    let payers = service
        .config()
        .keeper
        .payers
        .iter()
        .map(|p| parse_address(p))
        .collect::<Result<Vec<_>, _>>()?;
    let interval = Duration::from_secs(service.config().keeper.interval_secs);
    let keeper = ScheduleKeeper::new(service.scheduled_payments()?, payers, interval);

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    keeper.run(&shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_price(config: &WalletConfig, command: PriceCommand) -> CliResult<()> {
    let prices = PriceService::new(&config.prices)?;
    match command {
        PriceCommand::Get { symbol } => {
            let price = prices.get_price(&symbol).await?;
            print_json(&serde_json::json!({ "symbol": symbol.to_uppercase(), "usd": price }))
        }
        PriceCommand::Bundle => print_json(&prices.get_bundle_prices().await),
        PriceCommand::Pnl {
            entry,
            current,
            margin,
            leverage,
            short,
        } => print_json(&calculate_position_pnl(entry, current, margin, leverage, !short)),
    }
}

async fn run_pyth(config: &WalletConfig, command: PythCommand) -> CliResult<()> {
    let oracle = PythOracle::new(&config.prices)?;
    match command {
        PythCommand::Get { symbol } => {
            let price = oracle.get_price(&symbol).await?;
            print_json(&serde_json::json!({
                "price": price,
                "bounds": PythOracle::confidence_bounds(&price),
                "confidence_percent": PythOracle::confidence_percentage(&price),
                "safe_for_trading": PythOracle::is_safe_for_trading(&price, DEFAULT_MIN_CONFIDENCE),
                "age": PythOracle::format_age(&price),
            }))
        }
        PythCommand::Many { symbols } => {
            let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
            print_json(&oracle.get_prices(&symbols).await?)
        }
        PythCommand::Bundle => print_json(&oracle.get_bundle_prices().await?),
    }
}

async fn run_move(service: WalletService, command: MoveCommand) -> CliResult<()> {
    let config = service.config();
    let client = Arc::new(MovementClient::new(
        config.movement.clone(),
        service.secret_store(),
        service.local_store(),
    )?);
    let history = TransactionHistory::new(
        service.local_store(),
        movement_key(KEY_TRANSACTION_HISTORY),
        config.transactions.history_limit,
    );
    let movement = MovementService::new(client.clone(), history)?;

    if let MoveCommand::Import(env) = &command {
        let address = client.import_wallet(&read_key(&env.key_env)?).await?;
        return print_json(&serde_json::json!({ "address": address }));
    }

    let outcome = client.initialize_wallet().await?;

    let hash = match command {
        MoveCommand::Init => return print_json(&outcome),
        MoveCommand::Balance { address } => {
            let octas = client.get_balance(address.as_deref()).await?;
            return print_json(&serde_json::json!({ "balance": format_octas(octas) }));
        }
        MoveCommand::Stats { address } => {
            return print_json(&movement.payment_stats(address.as_deref()).await?)
        }
        MoveCommand::Status { address } => {
            let initialized = movement.is_payments_initialized(address.as_deref()).await?;
            return print_json(&serde_json::json!({ "payments_initialized": initialized }));
        }
        MoveCommand::History => return print_json(&movement.transaction_history()?),
        MoveCommand::Fund { address } => {
            client.fund_from_faucet(address.as_deref()).await?;
            return print_json(&serde_json::json!({ "funded": true }));
        }
        MoveCommand::Import(_) => return Ok(()),

        MoveCommand::Pay { to, amount, memo } => movement.send_payment(&to, &amount, &memo).await?,
        MoveCommand::Tap { to, amount } => movement.tap_to_pay(&to, &amount).await?,
        MoveCommand::Batch { to, amounts } => {
            let to: Vec<&str> = to.iter().map(String::as_str).collect();
            let amounts: Vec<&str> = amounts.iter().map(String::as_str).collect();
            movement.batch_send(&to, &amounts).await?
        }
        MoveCommand::InitWallet => movement.initialize_wallet_module().await?,
        MoveCommand::Schedule {
            to,
            amount,
            at,
            interval,
        } => movement.schedule_payment(&to, &amount, at, interval).await?,
        MoveCommand::InitBuckets => movement.initialize_bucket_protocol().await?,
        MoveCommand::CreateBucket {
            assets,
            weights,
            leverage,
        } => {
            let assets: Vec<&str> = assets.iter().map(String::as_str).collect();
            movement.create_bucket(&assets, &weights, leverage).await?
        }
        MoveCommand::Open {
            bucket_id,
            margin,
            short,
        } => movement.open_position(bucket_id, !short, &margin).await?,
        MoveCommand::Close { position_id } => movement.close_position(position_id).await?,
    };

    print_json(&serde_json::json!({ "hash": hash }))
}
