//! Read-only queries over the engine's state.
//!
//! Answers come from connected peers first and fall back to the store, so
//! peers that are not connected still show up.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vertex_storage::StateStoreExt;
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_bandwidth_primitives::{Int256, PeerId, Uint256};

use crate::SwapError;
use crate::constants::*;
use crate::engine::Swap;
use crate::peer::{
    balance_key, load_all, pending_cheque_key, received_cheque_key, sent_cheque_key,
};

/// Cheques exchanged with one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCheques {
    pub pending: Option<Cheque>,
    pub last_sent: Option<Cheque>,
    pub last_received: Option<Cheque>,
}

impl PeerCheques {
    fn is_empty(&self) -> bool {
        self.pending.is_none() && self.last_sent.is_none() && self.last_received.is_none()
    }
}

/// Queries answered by the SWAP engine.
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// What the own chequebook can still pay: its liquid balance plus what
    /// peers have cashed of our cheques, minus what we promised them.
    async fn available_balance(&self) -> Result<Uint256, SwapError>;

    /// Balance with `peer` in honey. Positive when the peer owes us.
    fn peer_balance(&self, peer: &PeerId) -> Result<i64, SwapError>;

    fn balances(&self) -> Result<BTreeMap<PeerId, i64>, SwapError>;

    fn peer_cheques(&self, peer: &PeerId) -> Result<PeerCheques, SwapError>;

    fn cheques(&self) -> Result<BTreeMap<PeerId, PeerCheques>, SwapError>;
}

#[async_trait]
impl SwapApi for Swap {
    async fn available_balance(&self) -> Result<Uint256, SwapError> {
        let chequebook = self.chequebook().ok_or(SwapError::NoChequebook)?;
        let mut available = Int256::try_from(chequebook.liquid_balance().await?)?;

        for (_, cheques) in self.cheques()? {
            // a pending cheque may be cashed before it is confirmed
            let Some(sent) = cheques.pending.or(cheques.last_sent) else {
                continue;
            };
            let paid_out = Int256::try_from(chequebook.paid_out(sent.beneficiary()).await?)?;
            let promised = Int256::try_from(sent.cumulative_payout())?;
            available = available.checked_add(paid_out.checked_sub(promised)?)?;
        }

        Ok(Uint256::try_from(available)?)
    }

    fn peer_balance(&self, peer: &PeerId) -> Result<i64, SwapError> {
        if let Ok(swap_peer) = self.peer(peer) {
            return Ok(swap_peer.balance());
        }
        self.store()
            .get_opt(&balance_key(peer))?
            .ok_or(SwapError::UnknownPeer(*peer))
    }

    fn balances(&self) -> Result<BTreeMap<PeerId, i64>, SwapError> {
        let mut balances: BTreeMap<PeerId, i64> =
            load_all(self.store(), BALANCE_PREFIX)?.into_iter().collect();
        for peer in self.connected_peers() {
            balances.insert(peer.id(), peer.balance());
        }
        Ok(balances)
    }

    fn peer_cheques(&self, peer: &PeerId) -> Result<PeerCheques, SwapError> {
        if let Ok(swap_peer) = self.peer(peer) {
            return Ok(PeerCheques {
                pending: swap_peer.pending_cheque(),
                last_sent: swap_peer.last_sent_cheque(),
                last_received: swap_peer.last_received_cheque(),
            });
        }

        let store = self.store();
        let cheques = PeerCheques {
            pending: store.get_opt(&pending_cheque_key(peer))?,
            last_sent: store.get_opt(&sent_cheque_key(peer))?,
            last_received: store.get_opt(&received_cheque_key(peer))?,
        };
        if cheques.is_empty() {
            return Err(SwapError::UnknownPeer(*peer));
        }
        Ok(cheques)
    }

    fn cheques(&self) -> Result<BTreeMap<PeerId, PeerCheques>, SwapError> {
        let store = self.store();
        let mut cheques: BTreeMap<PeerId, PeerCheques> = BTreeMap::new();

        for (peer, cheque) in load_all::<Cheque>(store, PENDING_CHEQUE_PREFIX)? {
            cheques.entry(peer).or_default().pending = Some(cheque);
        }
        for (peer, cheque) in load_all::<Cheque>(store, SENT_CHEQUE_PREFIX)? {
            cheques.entry(peer).or_default().last_sent = Some(cheque);
        }
        for (peer, cheque) in load_all::<Cheque>(store, RECEIVED_CHEQUE_PREFIX)? {
            cheques.entry(peer).or_default().last_received = Some(cheque);
        }

        for peer in self.connected_peers() {
            let entry = PeerCheques {
                pending: peer.pending_cheque(),
                last_sent: peer.last_sent_cheque(),
                last_received: peer.last_received_cheque(),
            };
            if entry.is_empty() {
                cheques.remove(&peer.id());
            } else {
                cheques.insert(peer.id(), entry);
            }
        }
        Ok(cheques)
    }
}
