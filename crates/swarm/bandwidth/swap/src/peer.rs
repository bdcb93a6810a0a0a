//! Per-peer accounting state.

use alloy_primitives::Address;
use parking_lot::Mutex;
use vertex_observability::SwapLogger;
use vertex_storage::{StateStore, StateStoreExt, StoreError, StoreValue};
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_bandwidth_primitives::PeerId;

use crate::constants::*;
use crate::protocol::ProtocolState;

pub(crate) fn balance_key(peer: &PeerId) -> String {
    format!("{BALANCE_PREFIX}{}", hex::encode(peer))
}

pub(crate) fn sent_cheque_key(peer: &PeerId) -> String {
    format!("{SENT_CHEQUE_PREFIX}{}", hex::encode(peer))
}

pub(crate) fn received_cheque_key(peer: &PeerId) -> String {
    format!("{RECEIVED_CHEQUE_PREFIX}{}", hex::encode(peer))
}

pub(crate) fn pending_cheque_key(peer: &PeerId) -> String {
    format!("{PENDING_CHEQUE_PREFIX}{}", hex::encode(peer))
}

/// Every `(peer, value)` stored under `prefix`.
pub(crate) fn load_all<T: StoreValue>(
    store: &dyn StateStore,
    prefix: &str,
) -> Result<Vec<(PeerId, T)>, StoreError> {
    let mut entries = Vec::new();
    store.iterate(prefix, &mut |key, value| {
        let suffix = key.get(prefix.len()..).unwrap_or_default();
        let peer = suffix
            .parse::<PeerId>()
            .map_err(|e| StoreError::Decode(format!("bad peer id in key {key}: {e}")))?;
        entries.push((peer, T::decode_value(value)?));
        Ok(false)
    })?;
    Ok(entries)
}

/// Mutable state of one peer, guarded by the peer's lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PeerState {
    /// Positive when the peer owes us, in honey.
    pub(crate) balance: i64,
    pub(crate) last_sent: Option<Cheque>,
    /// Issued, not yet confirmed.
    pub(crate) pending: Option<Cheque>,
    pub(crate) last_received: Option<Cheque>,
    pub(crate) protocol: ProtocolState,
}

impl PeerState {
    pub(crate) fn load(store: &dyn StateStore, peer: &PeerId) -> Result<Self, StoreError> {
        let pending: Option<Cheque> = store.get_opt(&pending_cheque_key(peer))?;
        Ok(Self {
            balance: store.get_opt(&balance_key(peer))?.unwrap_or_default(),
            last_sent: store.get_opt(&sent_cheque_key(peer))?,
            last_received: store.get_opt(&received_cheque_key(peer))?,
            protocol: if pending.is_some() {
                ProtocolState::ChequeEmitted
            } else {
                ProtocolState::Idle
            },
            pending,
        })
    }
}

/// A connected SWAP counterparty.
#[derive(Debug)]
pub struct SwapPeer {
    id: PeerId,
    beneficiary: Address,
    contract: Address,
    pub(crate) logger: SwapLogger,
    pub(crate) state: Mutex<PeerState>,
}

impl SwapPeer {
    pub(crate) fn new(
        id: PeerId,
        beneficiary: Address,
        contract: Address,
        logger: SwapLogger,
        state: PeerState,
    ) -> Self {
        Self {
            id,
            beneficiary,
            contract,
            logger,
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// The peer's account: it signs the peer's cheques and receives ours.
    pub fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    /// The peer's chequebook.
    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn balance(&self) -> i64 {
        self.state.lock().balance
    }

    pub fn protocol_state(&self) -> ProtocolState {
        self.state.lock().protocol
    }

    pub fn pending_cheque(&self) -> Option<Cheque> {
        self.state.lock().pending.clone()
    }

    pub fn last_sent_cheque(&self) -> Option<Cheque> {
        self.state.lock().last_sent.clone()
    }

    pub fn last_received_cheque(&self) -> Option<Cheque> {
        self.state.lock().last_received.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, Bytes};
    use vertex_storage::MemoryStateStore;
    use vertex_swarm_bandwidth_chequebook::ChequeParams;
    use vertex_swarm_bandwidth_primitives::Uint256;

    fn cheque(payout: u64) -> Cheque {
        Cheque {
            params: ChequeParams::new(
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                Uint256::from_u64(payout),
            ),
            honey: payout,
            signature: Bytes::from(vec![0u8; 65]),
        }
    }

    #[test]
    fn test_keys_use_hex_peer_id() {
        let peer = B256::repeat_byte(0xab);
        assert_eq!(balance_key(&peer), format!("balance_{}", "ab".repeat(32)));
        assert!(pending_cheque_key(&peer).starts_with("pending_cheque_abab"));
    }

    #[test]
    fn test_load_missing_peer_is_empty() {
        let store = MemoryStateStore::new();
        let state = PeerState::load(&store, &B256::repeat_byte(1)).unwrap();
        assert_eq!(state, PeerState::default());
    }

    #[test]
    fn test_load_restores_pending_state() {
        let store = MemoryStateStore::new();
        let peer = B256::repeat_byte(1);
        store.put(&balance_key(&peer), &-700i64).unwrap();
        store.put(&pending_cheque_key(&peer), &cheque(700)).unwrap();

        let state = PeerState::load(&store, &peer).unwrap();
        assert_eq!(state.balance, -700);
        assert_eq!(state.pending, Some(cheque(700)));
        assert_eq!(state.protocol, ProtocolState::ChequeEmitted);
    }

    #[test]
    fn test_load_all_parses_peers() {
        let store = MemoryStateStore::new();
        let first = B256::repeat_byte(1);
        let second = B256::repeat_byte(2);
        store.put(&balance_key(&first), &10i64).unwrap();
        store.put(&balance_key(&second), &-20i64).unwrap();
        store.put(&sent_cheque_key(&first), &cheque(5)).unwrap();

        let balances: Vec<(PeerId, i64)> = load_all(&store, BALANCE_PREFIX).unwrap();
        assert_eq!(balances, vec![(first, 10), (second, -20)]);

        store.put_raw("balance_zz", b"1".to_vec()).unwrap();
        assert!(load_all::<i64>(&store, BALANCE_PREFIX).is_err());
    }
}
