//! Messages exchanged with a peer.

use serde::{Deserialize, Serialize};
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_bandwidth_primitives::PeerId;

/// A SWAP protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SwapMessage {
    /// Ask the peer to send its pending cheque.
    ChequeRequest,
    /// A cheque issued by the sender.
    EmitCheque { cheque: Cheque },
    /// The sender refused the last message.
    Error { reason: String },
    /// Acknowledges an accepted cheque.
    ConfirmCheque { cheque: Cheque },
}

impl SwapMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChequeRequest => "ChequeRequest",
            Self::EmitCheque { .. } => "EmitCheque",
            Self::Error { .. } => "Error",
            Self::ConfirmCheque { .. } => "ConfirmCheque",
        }
    }
}

/// A message addressed to a peer, picked up by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub peer: PeerId,
    pub message: SwapMessage,
}

/// Cheque exchange state with one peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum ProtocolState {
    #[default]
    Idle,
    /// We sent a cheque and wait for its confirmation.
    ChequeEmitted,
    /// We accepted a cheque from the peer.
    ChequeReceived,
}
