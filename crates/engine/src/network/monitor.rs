use hoist_core::TxHash;
use hoist_journal::{OnchainInteraction, TransactionReceipt};
use tracing::debug;

use super::rpc::{BlockTag, JsonRpcClient, RpcError};
use crate::config::EngineConfig;

/// What one poll of a pending onchain interaction found.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    /// An attempt is mined with enough confirmations.
    Confirmed {
        hash: TxHash,
        receipt: TransactionReceipt,
    },
    /// An attempt is mined but still needs more blocks on top.
    WaitingConfirmations { hash: TxHash, confirmations: u64 },
    /// Still in the mempool and not yet due for a bump.
    Pending,
    /// Pending long enough to resubmit with higher fees.
    BumpFees,
    /// Pending long enough, but every allowed bump has been spent.
    TimedOut,
    /// The node knows none of the attempts and the nonce is still free.
    Dropped,
    /// The nonce was mined by a transaction that is not one of ours.
    ReplacedExternally { nonce: u64 },
}

/// Poll the node once for an onchain interaction that has at least one
/// attempt. `now` is Unix milliseconds.
pub async fn check_onchain(
    client: &dyn JsonRpcClient,
    interaction: &OnchainInteraction,
    config: &EngineConfig,
    now: u64,
) -> Result<MonitorOutcome, RpcError> {
    if let Some(outcome) = find_receipt(client, interaction, config).await? {
        return Ok(outcome);
    }

    if let Some(nonce) = interaction.nonce {
        let mined = client
            .get_transaction_count(&interaction.from, BlockTag::Latest)
            .await?;
        if mined > nonce {
            // An attempt may have been mined between the two queries.
            if let Some(outcome) = find_receipt(client, interaction, config).await? {
                return Ok(outcome);
            }
            return Ok(MonitorOutcome::ReplacedExternally { nonce });
        }
    }

    let mut known = false;
    for tx in &interaction.transactions {
        if client.get_transaction(&tx.hash).await?.is_some() {
            known = true;
            break;
        }
    }
    if !known {
        return Ok(MonitorOutcome::Dropped);
    }

    let Some(last) = interaction.last_transaction() else {
        return Ok(MonitorOutcome::Dropped);
    };
    let waited = now.saturating_sub(last.sent_at);
    if waited >= config.time_before_bumping_fees {
        let bumps = interaction.transactions.len().saturating_sub(1) as u32;
        if bumps < config.max_fee_bumps {
            return Ok(MonitorOutcome::BumpFees);
        }
        return Ok(MonitorOutcome::TimedOut);
    }
    Ok(MonitorOutcome::Pending)
}

async fn find_receipt(
    client: &dyn JsonRpcClient,
    interaction: &OnchainInteraction,
    config: &EngineConfig,
) -> Result<Option<MonitorOutcome>, RpcError> {
    for tx in interaction.transactions.iter().rev() {
        let Some(receipt) = client.get_transaction_receipt(&tx.hash).await? else {
            continue;
        };
        let head = client.block_number().await?;
        let confirmations = head.saturating_sub(receipt.block_number) + 1;
        debug!(hash = %tx.hash, confirmations, "receipt found");
        if confirmations >= config.required_confirmations {
            return Ok(Some(MonitorOutcome::Confirmed {
                hash: tx.hash,
                receipt,
            }));
        }
        return Ok(Some(MonitorOutcome::WaitingConfirmations {
            hash: tx.hash,
            confirmations,
        }));
    }
    Ok(None)
}
