//! Two-ledger flows run end to end by a single node.

use crate::tms::Tms;
use chrono::{DateTime, Utc};
use interop_core::driver::PledgeInfo;
use interop_core::error::{InteropError, Result};
use interop_core::id::{Identity, PledgeId, TokenId, TxId};
use log::info;

/// Outcome of a flow that moved value between two ledgers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReceipt {
    pub pledge_id: PledgeId,
    /// The pledge transaction on the origin ledger
    pub pledge_tx: TxId,
    /// The claim or reclaim transaction that completed the flow
    pub completion_tx: TxId,
}

impl FlowReceipt {
    /// The pledged token on the origin ledger
    pub fn pledged_token(&self) -> TokenId {
        TokenId::new(self.pledge_tx.clone(), 0)
    }
}

fn pledged_info(origin: &Tms, pledge_id: &PledgeId) -> Result<PledgeInfo> {
    origin
        .pledge_by_id(pledge_id)?
        .ok_or_else(|| InteropError::NotFound(format!("pledge {} was not recorded", pledge_id)))
}

/// Pledge on `origin` and immediately claim on `destination`
///
/// # Parameters
/// * `origin` - Ledger holding the sender's tokens
/// * `destination` - Ledger where `recipient` receives the tokens
/// * `sender` - Owner of the pledged tokens
/// * `recipient` - Receives the claimed tokens
/// * `origin_issuer` - Redeems the pledge on the origin ledger
/// * `destination_issuer` - Mints the claimed tokens
/// * `token_type` - Type of the moved tokens
/// * `amount` - Moved value
/// * `deadline` - Claims are accepted until then
#[allow(clippy::too_many_arguments)]
pub fn fast_pledge_claim(
    origin: &Tms,
    destination: &Tms,
    sender: &Identity,
    recipient: &Identity,
    origin_issuer: &Identity,
    destination_issuer: &Identity,
    token_type: &str,
    amount: u64,
    deadline: DateTime<Utc>,
) -> Result<FlowReceipt> {
    let (pledge_tx, pledge_id) = origin.pledge(
        sender,
        token_type,
        amount,
        recipient,
        origin_issuer,
        destination.url(),
        deadline,
    )?;
    destination.accept_pledge(&pledged_info(origin, &pledge_id)?)?;
    let completion_tx = destination.claim(recipient, destination_issuer, &TokenId::new(pledge_tx.clone(), 0))?;
    info!("moved {} [{}] from [{}] to [{}]", amount, token_type, origin.url(), destination.url());
    Ok(FlowReceipt {
        pledge_id,
        pledge_tx,
        completion_tx,
    })
}

/// Pledge on `origin`, wait out the deadline, then reclaim
#[allow(clippy::too_many_arguments)]
pub fn fast_pledge_reclaim(
    origin: &Tms,
    destination_url: &str,
    sender: &Identity,
    recipient: &Identity,
    origin_issuer: &Identity,
    token_type: &str,
    amount: u64,
    deadline: DateTime<Utc>,
) -> Result<FlowReceipt> {
    let (pledge_tx, pledge_id) = origin.pledge(
        sender,
        token_type,
        amount,
        recipient,
        origin_issuer,
        destination_url,
        deadline,
    )?;
    origin.clock().sleep_until(deadline);
    let completion_tx = origin.reclaim(sender, &TokenId::new(pledge_tx.clone(), 0))?;
    Ok(FlowReceipt {
        pledge_id,
        pledge_tx,
        completion_tx,
    })
}
