//! Command Line Interface for the EasyDeFi liquidity platform.
//!
//! Every command runs against a simulated chain kept in a JSON state file.
//! Run `easydefi init` first.

mod config;
mod output;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand};
use dotenv::dotenv;
use easydefi_domain::enums::{EventFilter, TokenSide};
use easydefi_domain::token::{DEFAULT_DECIMALS, TokenAmount};
use easydefi_domain::value_objects::parse_units;
use easydefi_execution::approval::Resolution;
use easydefi_execution::session::Session;
use easydefi_protocols::SimulatedChain;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, ConnectionArgs};

#[derive(Parser)]
#[command(name = "easydefi")]
#[command(about = "Swap, provide liquidity and track positions on the EasyDeFi pool contract", long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh simulated chain with a funded account and one pool
    Init {
        /// Whole tokens minted to the account, per token
        #[arg(long, default_value_t = 1000)]
        mint: u64,

        /// Initial reserve of the first token
        #[arg(long, default_value_t = 1000)]
        reserve_a: u64,

        /// Initial reserve of the second token
        #[arg(long, default_value_t = 2000)]
        reserve_b: u64,

        /// Pool fee in basis points
        #[arg(long, default_value_t = 30)]
        fee: u32,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Quote a swap without sending anything
    Quote {
        /// Token to sell (symbol or address)
        #[arg(long, default_value = "ALY")]
        from: String,

        /// Token to buy (symbol or address)
        #[arg(long, default_value = "sALY")]
        to: String,

        /// Amount to sell
        #[arg(short, long)]
        amount: String,
    },
    /// Swap tokens through the matching pool
    Swap {
        /// Token to sell (symbol or address)
        #[arg(long, default_value = "ALY")]
        from: String,

        /// Token to buy (symbol or address)
        #[arg(long, default_value = "sALY")]
        to: String,

        /// Amount to sell
        #[arg(short, long)]
        amount: String,

        /// Send the approval first when the allowance is too low
        #[arg(long)]
        approve: bool,
    },
    /// List pools with reserves and fees
    Pools,
    /// Add liquidity; the other amount follows the pool ratio
    #[command(group(ArgGroup::new("input").required(true).args(["amount_a", "amount_b"])))]
    Deposit {
        /// Pool id
        #[arg(long, default_value_t = 1)]
        pool: u64,

        /// Amount of the pool's first token
        #[arg(long)]
        amount_a: Option<String>,

        /// Amount of the pool's second token
        #[arg(long)]
        amount_b: Option<String>,

        /// Send the approvals first when allowances are too low
        #[arg(long)]
        approve: bool,
    },
    /// Remove liquidity
    #[command(group(ArgGroup::new("input").required(true).args(["shares", "max"])))]
    Withdraw {
        /// Pool id
        #[arg(long, default_value_t = 1)]
        pool: u64,

        /// Shares to burn
        #[arg(long)]
        shares: Option<String>,

        /// Burn every share held
        #[arg(long)]
        max: bool,
    },
    /// Create a pool for a token pair
    CreatePool {
        /// First token (symbol or address)
        #[arg(long)]
        token_a: String,

        /// Second token (symbol or address)
        #[arg(long)]
        token_b: String,

        /// Fee in basis points, 1 to 9999
        #[arg(long, default_value = "30")]
        fee: String,

        /// Approve both tokens for the configured amount first
        #[arg(long)]
        approve: bool,
    },
    /// Recent deposits and withdrawals
    Events {
        /// all, deposits or withdrawals
        #[arg(long, default_value = "all")]
        filter: EventFilter,

        /// Number of events shown
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Balances, positions and total pool shares
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = cli.connection.resolve();

    match cli.command {
        Commands::Init {
            mint,
            reserve_a,
            reserve_b,
            fee,
            force,
        } => init(&config, mint, reserve_a, reserve_b, fee, force).await,
        command => run(&config, command).await,
    }
}

async fn init(
    config: &CliConfig,
    mint: u64,
    reserve_a: u64,
    reserve_b: u64,
    fee: u32,
    force: bool,
) -> Result<()> {
    if config.state_path.exists() && !force {
        bail!(
            "{} already exists, pass --force to replace it",
            config.state_path.display()
        );
    }
    let (Some(token_a), Some(token_b)) = (
        config.session.primary_token(),
        config.session.secondary_token(),
    ) else {
        bail!("at least two tokens must be configured");
    };

    let chain = SimulatedChain::new(&config.session.contract, &config.session.account);
    for token in &config.session.tokens {
        chain
            .mint(&token.address, &config.session.account, whole(mint))
            .await;
    }
    let pool_id = chain
        .seed_pool(
            &token_a.address,
            &token_b.address,
            fee,
            whole(reserve_a),
            whole(reserve_b),
        )
        .await
        .context("could not seed the initial pool")?;
    chain.save(&config.state_path).await?;

    info!(path = %config.state_path.display(), pool_id, "Initialized simulated chain");
    println!(
        "Simulated chain written to {} (pool {pool_id}: {}/{}).",
        config.state_path.display(),
        token_a.symbol,
        token_b.symbol
    );
    Ok(())
}

async fn run(config: &CliConfig, command: Commands) -> Result<()> {
    let chain = SimulatedChain::load(&config.state_path, &config.session.account)
        .await
        .with_context(|| {
            format!(
                "cannot read {}, run `easydefi init` first",
                config.state_path.display()
            )
        })?;
    let mut session_config = config.session.clone();
    session_config.contract = chain.snapshot().await.contract;
    let mut session = Session::new(Arc::new(chain.clone()), session_config);
    session.load().await;

    let result = execute(config, &mut session, command).await;

    print_notifications(&session).await;
    chain.save(&config.state_path).await?;
    result
}

async fn execute(config: &CliConfig, session: &mut Session, command: Commands) -> Result<()> {
    match command {
        Commands::Init { .. } => bail!("init replaces the chain, run it on its own"),
        Commands::Quote { from, to, amount } => {
            select_pair(config, session, &from, &to, &amount);
            check_quote_inputs(&amount, session.swap.pool().is_some(), &from, &to)?;
            let Some(quote) = session.swap.quote_display() else {
                bail!("no quote for {amount} {from}");
            };
            println!("{amount} {from} -> {quote} {to}");
            if let Some(rate) = session.swap.exchange_rate() {
                println!("Rate: 1 {from} = {rate} {to}");
            }
            if let Some(fee) = session.swap.fee() {
                println!("Fee: {fee}");
            }
        }
        Commands::Swap {
            from,
            to,
            amount,
            approve,
        } => {
            select_pair(config, session, &from, &to, &amount);
            session.swap.refresh_allowances().await;
            if session.swap.state().needs_approval().is_some() {
                ensure_approval_allowed(approve, session.swap.state().to_string())?;
                session.approve_swap().await?;
            }
            let quote = session.swap.quote_display();
            report(session.swap().await?);
            if let Some(quote) = quote {
                println!("Swapped {amount} {from} for about {quote} {to}.");
            }
        }
        Commands::Pools => output::print_pools(config, session.pools()),
        Commands::Deposit {
            pool,
            amount_a,
            amount_b,
            approve,
        } => {
            session.select_pool(pool).await?;
            match (amount_a, amount_b) {
                (Some(amount), _) => session.deposit.set_amount(TokenSide::A, &amount),
                (None, Some(amount)) => session.deposit.set_amount(TokenSide::B, &amount),
                (None, None) => bail!("pass --amount-a or --amount-b"),
            }
            println!(
                "Depositing {} A + {} B into pool {pool}.",
                session.deposit.amount(TokenSide::A),
                session.deposit.amount(TokenSide::B)
            );
            session.deposit.refresh_allowances().await;
            while session.deposit.state().needs_approval().is_some() {
                ensure_approval_allowed(approve, session.deposit.state().to_string())?;
                session.approve_deposit().await?;
            }
            report(session.deposit().await?);
        }
        Commands::Withdraw { pool, shares, max } => {
            session.select_pool(pool).await?;
            if max {
                session.withdraw.max();
            } else if let Some(shares) = shares {
                session.withdraw.set_shares(&shares);
            }
            if session.withdraw.shares().is_empty() {
                bail!("no shares held in pool {pool}");
            }
            report(session.withdraw().await?);
        }
        Commands::CreatePool {
            token_a,
            token_b,
            fee,
            approve,
        } => {
            session
                .create_pool
                .set_token(TokenSide::A, &config.token_address(&token_a));
            session
                .create_pool
                .set_token(TokenSide::B, &config.token_address(&token_b));
            session.create_pool.set_fee(&fee)?;
            if approve {
                session.approve_for_pool(TokenSide::A).await?;
                session.approve_for_pool(TokenSide::B).await?;
            }
            report(session.create_pool().await?);
        }
        Commands::Events { filter, limit } => {
            session.activity.set_filter(filter);
            session.activity.set_limit(limit);
            session.activity.refresh().await?;
            output::print_activity(&session.activity);
        }
        Commands::Dashboard => output::print_dashboard(config, session.dashboard.snapshot()),
    }
    Ok(())
}

fn select_pair(config: &CliConfig, session: &mut Session, from: &str, to: &str, amount: &str) {
    session.swap.select_token_in(&config.token_address(from));
    session.swap.select_token_out(&config.token_address(to));
    session.swap.set_amount_in(amount);
}

/// Separates a bad amount from a missing pool, both of which leave no quote.
fn check_quote_inputs(amount: &str, has_pool: bool, from: &str, to: &str) -> Result<()> {
    parse_units(amount).with_context(|| format!("invalid amount {amount:?}"))?;
    if !has_pool {
        bail!("no pool for {from}/{to}");
    }
    Ok(())
}

fn ensure_approval_allowed(approve: bool, state: String) -> Result<()> {
    if !approve {
        bail!("allowance too low ({state}), rerun with --approve");
    }
    Ok(())
}

fn report(resolution: Resolution) {
    if resolution.is_stale() {
        println!("Transaction confirmed after the inputs changed; data was refreshed.");
    }
}

async fn print_notifications(session: &Session) {
    output::print_notifications(&session.notifications().drain().await);
}

fn whole(amount: u64) -> TokenAmount {
    TokenAmount::from_whole(amount, DEFAULT_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_errors_name_the_cause() {
        let bad_amount = check_quote_inputs("1.2.3", true, "ALY", "sALY").unwrap_err();
        assert_eq!(bad_amount.to_string(), "invalid amount \"1.2.3\"");

        let no_pool = check_quote_inputs("5", false, "ALY", "WETH").unwrap_err();
        assert_eq!(no_pool.to_string(), "no pool for ALY/WETH");

        // A bad amount is reported first, even without a pool.
        let both = check_quote_inputs("", false, "ALY", "WETH").unwrap_err();
        assert!(both.to_string().starts_with("invalid amount"));

        assert!(check_quote_inputs("5", true, "ALY", "sALY").is_ok());
    }
}
