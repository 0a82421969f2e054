//! CLOAK CLI
//!
//! Command-line interface for stealth payments and private limit orders.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cloak_core::traits::{AnnouncementChannel, ExecutionFeed, KeyProvider, ProgressCallback};
use cloak_core::types::{
    Announcement, BlockBound, Bytes32, CreateLimitOrderParams, EthAddress, OrderSlot, PoolKey,
    PublicKey, StealthMetaAddress, ViewingKey,
};
use cloak_crypto::generate_stealth_keys;
use cloak_orders::{pool_id, LimitOrderRegistry, RpcExecutionFeed, RpcOrderSink};
use cloak_registry::{LedgerConfig, MemoryChannel, RpcAnnouncementChannel};
use cloak_scanner::{AnnouncementScanner, ScanSummary, ScannerConfig};
use cloak_stealth::{
    EnvKeyProvider, StealthAddressDeriver, StealthPaymentBuilder, StealthWallet, ViewingKeyExport,
};

/// CLOAK - Stealth payments and private limit orders
#[derive(Parser)]
#[command(name = "cloak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Ethereum RPC URL
    #[arg(long, env = "CLOAK_RPC_URL", global = true)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new stealth key set
    Keygen {
        /// Output file for keys (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Derive keys deterministically from this seed phrase
        #[arg(long)]
        seed: Option<String>,
    },

    /// Derive a one-time stealth address for a recipient
    Generate {
        /// Recipient meta-address (st:eth:0x...) or a single public key (hex)
        recipient: String,
        /// Amount note (kept off-chain)
        #[arg(long)]
        amount: Option<String>,
        /// Token note (kept off-chain)
        #[arg(long)]
        token: Option<String>,
    },

    /// Derive a stealth address and publish its announcement
    Announce {
        /// Recipient meta-address (st:eth:0x...) or a single public key (hex)
        recipient: String,
    },

    /// Scan announcements for payments
    Scan {
        /// Keys file written by `keygen` (defaults to CLOAK_* variables)
        #[arg(short, long)]
        keys: Option<PathBuf>,
        /// First block to scan
        #[arg(long, default_value = "0")]
        from_block: u64,
        /// Last block to scan (defaults to the head block)
        #[arg(long)]
        to_block: Option<u64>,
        /// Print the one-time spending key for each payment (needs spending key)
        #[arg(long)]
        reveal_keys: bool,
    },

    /// Create a limit order paying out to a fresh stealth address
    CreateOrder {
        /// Recipient of the proceeds (meta-address or public key)
        recipient: String,
        /// Pool currency0
        #[arg(long)]
        currency0: String,
        /// Pool currency1
        #[arg(long)]
        currency1: String,
        /// Pool fee in hundredths of a bip
        #[arg(long, default_value = "3000")]
        fee: u32,
        /// Pool tick spacing
        #[arg(long, default_value = "60")]
        tick_spacing: i32,
        /// Pool hooks contract (defaults to CLOAK_ORDER_HOOK)
        #[arg(long)]
        hooks: Option<String>,
        /// Sell currency1 for currency0 instead of the reverse
        #[arg(long)]
        one_for_zero: bool,
        /// Amount to sell (decimal or 0x-hex)
        #[arg(long, value_parser = parse_amount)]
        amount_in: U256,
        /// Minimum amount to receive (decimal or 0x-hex)
        #[arg(long, default_value = "0", value_parser = parse_amount)]
        min_amount_out: U256,
        /// Target tick
        #[arg(long, allow_negative_numbers = true)]
        tick: i32,
        /// Seconds until the order expires
        #[arg(long, default_value = "3600")]
        ttl: u64,
        /// Explicit slot index (next free index when omitted)
        #[arg(long)]
        index: Option<u64>,
    },

    /// Read an order slot from the hook
    GetOrder {
        /// Pool id (hex)
        pool_id: String,
        /// Tick of the slot
        #[arg(long, allow_negative_numbers = true)]
        tick: i32,
        /// Index within the tick
        #[arg(long, default_value = "0")]
        index: u64,
    },

    /// Print order executions
    WatchExecutions {
        /// First block to read
        #[arg(long, default_value = "0")]
        from_block: u64,
        /// Keep polling for new executions
        #[arg(short, long)]
        follow: bool,
        /// Poll interval in seconds
        #[arg(long, default_value = "12")]
        interval: u64,
    },

    /// Run a local scanning benchmark
    Bench {
        /// Number of announcements to generate
        #[arg(short, long, default_value = "10000")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "cloak=debug,info"
    } else {
        "cloak=info,warn"
    };
    let (plain, json) = if cli.json_logs {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(plain)
        .with(json)
        .init();

    let rpc_url = cli.rpc_url;
    match cli.command {
        Commands::Keygen { output, seed } => cmd_keygen(output, seed),
        Commands::Generate {
            recipient,
            amount,
            token,
        } => cmd_generate(&recipient, amount, token),
        Commands::Announce { recipient } => cmd_announce(&recipient, rpc_url).await,
        Commands::Scan {
            keys,
            from_block,
            to_block,
            reveal_keys,
        } => cmd_scan(keys.as_deref(), from_block, to_block, reveal_keys, rpc_url).await,
        Commands::CreateOrder {
            recipient,
            currency0,
            currency1,
            fee,
            tick_spacing,
            hooks,
            one_for_zero,
            amount_in,
            min_amount_out,
            tick,
            ttl,
            index,
        } => {
            let order = OrderArgs {
                currency0,
                currency1,
                fee,
                tick_spacing,
                hooks,
                zero_for_one: !one_for_zero,
                amount_in,
                min_amount_out,
                tick,
                ttl,
                index,
            };
            cmd_create_order(&recipient, order, rpc_url).await
        }
        Commands::GetOrder {
            pool_id,
            tick,
            index,
        } => cmd_get_order(&pool_id, tick, index, rpc_url).await,
        Commands::WatchExecutions {
            from_block,
            follow,
            interval,
        } => cmd_watch_executions(from_block, follow, interval, rpc_url).await,
        Commands::Bench { count } => cmd_bench(count).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Key file written by `keygen`.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    meta_address: String,
    spending_public_key: PublicKey,
    viewing_public_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spending_secret_key: Option<String>,
    viewing_secret_key: String,
}

fn ledger_config(rpc_url: Option<String>) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::from_env().context("Invalid ledger configuration")?;
    if let Some(url) = rpc_url {
        config.rpc_url = url;
        config.validate()?;
    }
    tracing::debug!(rpc_url = %config.rpc_url, chain_id = config.chain_id, "Ledger configured");
    Ok(config)
}

/// Accepts a meta-address or a bare public key.
fn parse_recipient(recipient: &str) -> Result<StealthMetaAddress> {
    if let Ok(meta) = StealthMetaAddress::from_str(recipient) {
        return Ok(meta);
    }
    let pk = PublicKey::from_hex(recipient)
        .context("Recipient is neither a meta-address nor a public key")?;
    Ok(StealthMetaAddress::single_key(pk))
}

fn parse_address(label: &str, value: &str) -> Result<EthAddress> {
    EthAddress::from_str(value).with_context(|| format!("Invalid {} address", label))
}

/// Parses a `uint256` amount.
fn parse_amount(value: &str) -> std::result::Result<U256, String> {
    U256::from_str(value).map_err(|e| format!("invalid amount {:?}: {}", value, e))
}

/// Loads a viewing key and, when the file holds one, the full wallet.
async fn load_keys(path: Option<&Path>) -> Result<(ViewingKey, Option<StealthWallet>)> {
    let Some(path) = path else {
        let provider = EnvKeyProvider::from_env();
        let viewing_key = provider
            .viewing_key()
            .await
            .context("Failed to load keys from environment")?;
        let wallet = StealthWallet::from_provider(&provider).await.ok();
        return Ok((viewing_key, wallet));
    };

    let file: KeyFile = serde_json::from_reader(
        std::fs::File::open(path).context("Failed to open keys file")?,
    )
    .context("Malformed keys file")?;

    let wallet = match &file.spending_secret_key {
        Some(spending) => Some(StealthWallet::from_secret_hex(spending, &file.viewing_secret_key)?),
        None => None,
    };
    let viewing_key = ViewingKeyExport {
        viewing_secret_key: file.viewing_secret_key,
        spending_public_key: file.spending_public_key,
    }
    .into_viewing_key()?;

    Ok((viewing_key, wallet))
}

struct OrderArgs {
    currency0: String,
    currency1: String,
    fee: u32,
    tick_spacing: i32,
    hooks: Option<String>,
    zero_for_one: bool,
    amount_in: U256,
    min_amount_out: U256,
    tick: i32,
    ttl: u64,
    index: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Generate new keys
fn cmd_keygen(output: Option<PathBuf>, seed: Option<String>) -> Result<()> {
    println!("{}", "🔑 Generating CLOAK keys...".cyan().bold());

    let wallet = match seed {
        Some(seed) => StealthWallet::from_seed(seed.as_bytes())?,
        None => StealthWallet::generate(),
    };
    let keys = wallet.keys();

    let file = KeyFile {
        meta_address: wallet.meta_address().to_string(),
        spending_public_key: keys.spending.public,
        viewing_public_key: keys.viewing.public,
        spending_secret_key: Some(keys.spending.secret.to_hex()),
        viewing_secret_key: keys.viewing.secret.to_hex(),
    };
    let json = serde_json::to_string_pretty(&file)?;

    if let Some(path) = output {
        std::fs::write(&path, json)?;
        println!("{} {}", "✅ Keys saved to:".green(), path.display());
    } else {
        println!("\n{}", "Keys (JSON):".yellow().bold());
        println!("{}", json);
    }

    println!("\n{} {}", "Meta-address:".yellow(), file.meta_address);
    println!("\n{}", "⚠️  IMPORTANT: Keep your secret keys safe!".red().bold());
    println!("   The spending secret controls every payment you receive.");

    Ok(())
}

/// Derive a stealth address
fn cmd_generate(recipient: &str, amount: Option<String>, token: Option<String>) -> Result<()> {
    let meta = parse_recipient(recipient)?;
    println!("{} {}", "💸 Creating stealth payment to:".cyan().bold(), meta);

    let mut builder = StealthPaymentBuilder::new().recipient(meta);
    if let Some(amount) = amount {
        builder = builder.amount(amount);
    }
    if let Some(token) = token {
        builder = builder.token(token);
    }
    let payment = builder.build().context("Failed to create stealth payment")?;

    println!("\n{}", "✅ Stealth address derived:".green().bold());
    println!("   {} {}", "Address:".yellow(), payment.stealth.address);
    println!("   {} {}", "View tag:".dimmed(), payment.stealth.view_tag);
    println!("   {} {}", "Ephemeral key:".dimmed(), payment.stealth.ephemeral_pub_key);
    println!("   {} 0x{}", "Commitment:".dimmed(), hex::encode(payment.stealth.commitment));

    println!("\n{}", "📋 Payment (JSON):".yellow().bold());
    println!("{}", serde_json::to_string_pretty(&payment)?);

    println!("\n{}", "ℹ️  Next steps:".cyan());
    println!("   1. Send funds to the stealth address above");
    println!("   2. Publish the announcement (cloak announce)");

    Ok(())
}

/// Derive and publish
async fn cmd_announce(recipient: &str, rpc_url: Option<String>) -> Result<()> {
    let meta = parse_recipient(recipient)?;
    let config = ledger_config(rpc_url)?;
    let caller = config.require_sender()?;
    let channel = RpcAnnouncementChannel::from_config(config)?;

    let stealth = StealthAddressDeriver::new().generate(&meta)?;
    let ann = Announcement::for_stealth_address(&stealth, caller);

    println!("{} {}", "📣 Announcing payment to:".cyan().bold(), stealth.address);
    let handle = channel
        .publish(ann.scheme_id, ann.stealth_address, &ann.ephemeral_pub_key, &ann.metadata)
        .await
        .context("Failed to publish announcement")?;

    println!("   {} {}", "Transaction:".green(), handle);
    println!("   {} {}", "View tag:".dimmed(), stealth.view_tag);
    Ok(())
}

/// Scan for payments
async fn cmd_scan(
    keys: Option<&Path>,
    from_block: u64,
    to_block: Option<u64>,
    reveal_keys: bool,
    rpc_url: Option<String>,
) -> Result<()> {
    println!("{}", "🔎 Scanning for payments...".cyan().bold());

    let (viewing_key, wallet) = load_keys(keys).await?;
    if reveal_keys && wallet.is_none() {
        bail!("--reveal-keys needs the spending secret key");
    }

    let channel = Arc::new(RpcAnnouncementChannel::from_config(ledger_config(rpc_url)?)?);
    let scanner = AnnouncementScanner::new(channel);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
            .progress_chars("#>-"),
    );
    let bar = pb.clone();
    let callback: ProgressCallback = Box::new(move |p| {
        bar.set_length(p.total);
        bar.set_position(p.scanned);
        bar.set_message(format!("{} found", p.discoveries));
    });

    let to = to_block.map_or(BlockBound::Latest, BlockBound::Number);
    let found = scanner
        .scan_with_progress(&viewing_key, from_block, to, callback)
        .await
        .context("Scan failed")?;
    pb.finish_and_clear();

    let summary = ScanSummary::from(scanner.stats());
    println!(
        "   Scanned {} announcements ({:.1}% filtered by view tag)",
        summary.total_scanned, summary.filter_efficiency
    );

    if found.is_empty() {
        println!("\n{}", "No payments found.".yellow());
        return Ok(());
    }

    println!("\n{} {} payment(s) found:", "✅".green(), found.len());
    for recovered in &found {
        let ann = &recovered.announcement;
        println!("   {} {}", "Address:".green(), recovered.stealth.address);
        println!(
            "      block {} log {} {}",
            ann.block_number,
            ann.log_index,
            ann.tx_hash.as_deref().unwrap_or("")
        );
        if reveal_keys {
            if let Some(wallet) = &wallet {
                let sk = wallet.stealth_secret_key(&ann.ephemeral_pub_key)?;
                println!("      {} {}", "Spending key:".red(), sk.to_hex());
            }
        }
    }

    Ok(())
}

/// Create a limit order
async fn cmd_create_order(recipient: &str, args: OrderArgs, rpc_url: Option<String>) -> Result<()> {
    let meta = parse_recipient(recipient)?;
    let config = ledger_config(rpc_url)?;
    let hook = config.require_order_hook()?;

    let pool_key = PoolKey {
        currency0: parse_address("currency0", &args.currency0)?,
        currency1: parse_address("currency1", &args.currency1)?,
        fee: args.fee,
        tick_spacing: args.tick_spacing,
        hooks: match &args.hooks {
            Some(h) => parse_address("hooks", h)?,
            None => hook,
        },
    };

    let sink = Arc::new(RpcOrderSink::from_config(config.clone())?);
    let feed = Arc::new(RpcExecutionFeed::from_config(config)?);
    let registry = LimitOrderRegistry::new(sink, feed);

    let stealth = StealthAddressDeriver::new().generate(&meta)?;
    let mut params = CreateLimitOrderParams::for_stealth(
        pool_key,
        &stealth,
        args.zero_for_one,
        args.amount_in,
        args.min_amount_out,
        registry.now() + args.ttl,
        args.tick,
    );
    if let Some(index) = args.index {
        params = params.with_index(index);
    }

    println!("{}", "📝 Creating limit order...".cyan().bold());
    let created = registry.create(params).await.context("Failed to create order")?;

    println!("\n{}", "✅ Order submitted:".green().bold());
    println!("   {} {}", "Order id:".yellow(), created.order_id);
    println!("   {} {}", "Pool id:".dimmed(), pool_id(&pool_key)?);
    println!("   {} {} / {}", "Slot:".dimmed(), created.slot.tick, created.slot.index);
    println!("   {} {}", "Proceeds to:".dimmed(), stealth.address);
    println!("   {} {}", "Transaction:".dimmed(), created.transaction);
    Ok(())
}

/// Read an order slot
async fn cmd_get_order(pool: &str, tick: i32, index: u64, rpc_url: Option<String>) -> Result<()> {
    let pool = Bytes32::from_hex(pool).context("Invalid pool id")?;
    let feed = RpcExecutionFeed::from_config(ledger_config(rpc_url)?)?;
    let slot = OrderSlot::new(pool, tick, index);

    let Some(order) = feed.fetch_order(&slot).await? else {
        println!("{} {}", "No order at".yellow(), slot);
        return Ok(());
    };

    let now = cloak_orders::system_clock()();
    println!("{} {}", "📄 Order".cyan().bold(), slot);
    println!("   {} {:?}", "Status:".yellow(), order.status(now));
    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}

/// Print executions, optionally following the head
async fn cmd_watch_executions(
    from_block: u64,
    follow: bool,
    interval: u64,
    rpc_url: Option<String>,
) -> Result<()> {
    let feed = RpcExecutionFeed::from_config(ledger_config(rpc_url)?)?;
    let mut from = from_block;

    loop {
        let events = feed.executions(from).await?;
        for event in &events {
            println!(
                "{} {} {} in={} out={} by {}",
                "⚡".yellow(),
                format!("#{}:{}", event.block_number, event.log_index).dimmed(),
                event.order_id,
                event.amount_in,
                event.amount_out,
                event.executor
            );
        }
        if let Some(last) = events.last() {
            from = last.block_number + 1;
        }

        if !follow {
            if events.is_empty() {
                println!("{}", "No executions.".yellow());
            }
            return Ok(());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
        }
    }
}

/// Run benchmarks
async fn cmd_bench(count: usize) -> Result<()> {
    println!("{} {} announcements", "📊 Benchmarking with".cyan().bold(), count);

    println!("\n{}", "1. Generating keys...".dimmed());
    let start = std::time::Instant::now();
    let keys = generate_stealth_keys();
    let other = generate_stealth_keys();
    println!("   ✓ Key generation: {:?}", start.elapsed());

    println!("\n{}", "2. Creating announcements...".dimmed());
    let channel = Arc::new(MemoryChannel::new());
    let deriver = StealthAddressDeriver::new();

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let start = std::time::Instant::now();
    for i in 0..count {
        // One in a hundred is ours
        let meta = if i % 100 == 0 {
            keys.meta_address()
        } else {
            other.meta_address()
        };
        let stealth = deriver.generate(&meta)?;
        let ann = Announcement::for_stealth_address(&stealth, EthAddress::zero());
        channel
            .publish(ann.scheme_id, ann.stealth_address, &ann.ephemeral_pub_key, &ann.metadata)
            .await?;
        pb.inc(1);
    }
    pb.finish();
    println!("   ✓ Created {} announcements: {:?}", count, start.elapsed());

    println!("\n{}", "3. Scanning...".dimmed());
    let scanner = AnnouncementScanner::with_config(channel, ScannerConfig::new().concurrency(8));
    let start = std::time::Instant::now();
    let found = scanner
        .scan_paged(&keys.viewing_key(), 0, BlockBound::Latest)
        .await?;
    let scan_time = start.elapsed();
    let summary = ScanSummary::from(scanner.stats());

    println!("   ✓ Scanned {} announcements: {:?}", summary.total_scanned, scan_time);
    println!("   ✓ Found {} payments", found.len());
    println!("\n{}", "📈 Results:".green().bold());
    println!(
        "   Scan rate: {:.0} announcements/sec",
        count as f64 / scan_time.as_secs_f64()
    );
    println!(
        "   Time per announcement: {:.2}µs",
        scan_time.as_micros() as f64 / count.max(1) as f64
    );
    println!("   View tag matches: {}", summary.view_tag_matches);
    println!("   False positives: {}", summary.false_positives);

    let expected = count.div_ceil(100);
    if found.len() == expected {
        println!("   {} All expected payments found!", "✅".green());
    } else {
        println!("   {} Expected {}, found {}", "❌".red(), expected, found.len());
    }

    Ok(())
}
