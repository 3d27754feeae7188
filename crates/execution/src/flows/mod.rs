//! User-facing action flows.
//!
//! Each flow owns its typed inputs and an [`ActionMachine`]. Submissions are
//! split in two steps matching the wallet's suspension points: `start_*`
//! returns once a hash is known, [`InFlightTx`] is later passed to `finish`
//! which awaits the receipt. Inputs may change in between.

mod create_pool;
mod deposit;
mod swap;
mod withdraw;

pub use create_pool::*;
pub use deposit::*;
pub use swap::*;
pub use withdraw::*;

use easydefi_protocols::{PlatformClient, TxHash, WriteCall};
use tracing::debug;

use crate::approval::{ActionMachine, Resolution, SubmissionTicket, TxOutcome};
use crate::error::ExecutionError;
use crate::lifecycle::NotificationLog;

/// A broadcast transaction awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightTx {
    pub ticket: SubmissionTicket,
    pub hash: TxHash,
}

/// Sends `call` under `ticket`. A rejection resolves the ticket as failed.
pub(crate) async fn submit(
    machine: &mut ActionMachine,
    client: &PlatformClient,
    notifications: &NotificationLog,
    ticket: SubmissionTicket,
    call: WriteCall,
) -> Result<InFlightTx, ExecutionError> {
    match client.send(call).await {
        Ok(hash) => {
            machine.broadcast(&ticket, hash.clone());
            notifications.submitted(ticket.kind, &hash).await;
            Ok(InFlightTx { ticket, hash })
        }
        Err(err) => {
            notifications.failed(ticket.kind, None, &err).await;
            machine.complete(&ticket, TxOutcome::Failed);
            Err(err.into())
        }
    }
}

/// Awaits the receipt of `tx` and resolves its ticket.
pub(crate) async fn settle(
    machine: &mut ActionMachine,
    client: &PlatformClient,
    notifications: &NotificationLog,
    tx: InFlightTx,
) -> Result<Resolution, ExecutionError> {
    match client.wait_for_receipt(&tx.hash).await {
        Ok(receipt) => {
            notifications.confirmed(tx.ticket.kind, &receipt.hash).await;
            Ok(machine.complete(&tx.ticket, TxOutcome::Confirmed))
        }
        Err(err) => {
            notifications.failed(tx.ticket.kind, Some(&tx.hash), &err).await;
            machine.complete(&tx.ticket, TxOutcome::Failed);
            Err(err.into())
        }
    }
}

/// Reads every allowance the machine is missing.
pub(crate) async fn refresh_allowances(machine: &mut ActionMachine, client: &PlatformClient) {
    for token in machine.stale_allowances() {
        let read = client
            .allowance(&token, client.account())
            .await
            .map_err(|err| err.to_string());
        debug!(token = %token, ok = read.is_ok(), "Allowance refreshed");
        machine.record_allowance(&token, read);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use easydefi_domain::token::TokenAmount;
    use easydefi_protocols::{PlatformClient, SimulatedChain};
    use std::sync::Arc;

    use crate::lifecycle::NotificationLog;

    pub const CONTRACT: &str = "0xplatform";
    pub const ALY: &str = "0xaly";
    pub const SALY: &str = "0xsaly";
    pub const USER: &str = "0xuser";
    pub const EXPLORER: &str = "https://sepolia.basescan.org";

    pub fn ether(whole: u64) -> TokenAmount {
        TokenAmount::from_whole(whole, 18)
    }

    /// A user holding 100 of each token next to a seeded ALY/sALY pool.
    pub async fn setup() -> (SimulatedChain, PlatformClient, NotificationLog) {
        let chain = SimulatedChain::new(CONTRACT, USER);
        chain.mint(ALY, USER, ether(100)).await;
        chain.mint(SALY, USER, ether(100)).await;
        chain
            .seed_pool(ALY, SALY, 30, ether(1000), ether(2000))
            .await;
        let client = PlatformClient::new(Arc::new(chain.clone()), CONTRACT);
        (chain, client, NotificationLog::new(EXPLORER))
    }
}
