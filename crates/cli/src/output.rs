//! Terminal rendering.

use chrono::Utc;
use easydefi_domain::entities::PoolSnapshot;
use easydefi_domain::token::DEFAULT_DECIMALS;
use easydefi_domain::value_objects::Amount;
use easydefi_execution::activity::ActivityFeed;
use easydefi_execution::dashboard::DashboardSnapshot;
use easydefi_execution::lifecycle::TxNotification;
use prettytable::{Table, row};

use crate::config::CliConfig;

pub fn print_pools(config: &CliConfig, pools: &[PoolSnapshot]) {
    if pools.is_empty() {
        println!("No pools yet.");
        return;
    }
    let mut table = Table::new();
    table.set_titles(row!["Id", "Pair", "Reserve A", "Reserve B", "Fee", "Yearly", "TVL"]);
    for pool in pools {
        let tvl = pool.tvl().map_or_else(|| "-".to_string(), |tvl| tvl.round_dp(2).to_string());
        table.add_row(row![
            pool.id,
            format!("{}/{}", config.symbol(&pool.token_a), config.symbol(&pool.token_b)),
            fixed(pool.reserve_a),
            fixed(pool.reserve_b),
            pool.fee_percentage(),
            pool.fee_percentage().annualized(),
            tvl
        ]);
    }
    table.printstd();
}

pub fn print_activity(feed: &ActivityFeed) {
    let entries = feed.render(Utc::now());
    if entries.is_empty() {
        println!("No activity for filter '{:?}'.", feed.filter());
        return;
    }
    let mut table = Table::new();
    table.set_titles(row!["Action", "User", "Amount A", "Amount B", "When", "Tx"]);
    for entry in entries {
        table.add_row(row![
            entry.label,
            entry.user,
            format!("{}{}", entry.sign, entry.amount_a),
            format!("{}{}", entry.sign, entry.amount_b),
            entry.age,
            entry.tx_hash
        ]);
    }
    table.printstd();
}

pub fn print_dashboard(config: &CliConfig, snapshot: &DashboardSnapshot) {
    let mut balances = Table::new();
    balances.set_titles(row!["Token", "Balance"]);
    for balance in &snapshot.balances {
        balances.add_row(row![balance.token.symbol, balance.display()]);
    }
    balances.printstd();

    if let Some(hint) = &snapshot.idle_hint {
        println!("{} ({} {} available)", hint.title(), hint.amount, hint.symbol);
    }

    if snapshot.has_position() {
        let mut positions = Table::new();
        positions.set_titles(row!["Pool", "Shares"]);
        for position in &snapshot.positions {
            positions.add_row(row![
                position.pool_id,
                DashboardSnapshot::shares_display(position)
            ]);
        }
        positions.printstd();
    } else {
        println!("No liquidity positions for {}.", config.session.account);
    }

    let total = snapshot
        .total_pool_shares
        .map_or_else(|| "unavailable".to_string(), fixed);
    println!("Total pool shares: {total}");
}

pub fn print_notifications(notifications: &[TxNotification]) {
    for notification in notifications {
        println!("[{:?}] {}: {}", notification.variant(), notification.title, notification.description);
        if let Some(link) = &notification.explorer_link {
            println!("    {link}");
        }
    }
}

fn fixed(amount: easydefi_domain::TokenAmount) -> String {
    Amount::from_token_amount(amount, DEFAULT_DECIMALS).to_fixed(4)
}
