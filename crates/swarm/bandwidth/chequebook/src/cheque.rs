//! Cheque types and their verification.

use alloy_primitives::{Address, B256, Bytes, Signature, U256, eip191_hash_message, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use vertex_storage::JsonValue;
use vertex_swarm_bandwidth_primitives::Uint256;

use crate::ChequeError;

/// Length of the signed message.
pub const SIGNED_MESSAGE_LEN: usize = 72;

/// Length of a signature: `r || s || v`.
pub const SIGNATURE_LEN: usize = 65;

// the chequebook's signature library rejects recovery ids 0 and 1
const V_OFFSET: u8 = 27;

/// The signed part of a cheque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChequeParams {
    /// The issuer's chequebook.
    pub contract: Address,
    pub beneficiary: Address,
    pub cumulative_payout: Uint256,
}

impl ChequeParams {
    pub fn new(contract: Address, beneficiary: Address, cumulative_payout: Uint256) -> Self {
        Self {
            contract,
            beneficiary,
            cumulative_payout,
        }
    }

    pub fn encode_for_signature(&self) -> [u8; SIGNED_MESSAGE_LEN] {
        let mut out = [0u8; SIGNED_MESSAGE_LEN];
        let (contract, rest) = out.split_at_mut(20);
        let (beneficiary, payout) = rest.split_at_mut(20);
        contract.copy_from_slice(self.contract.as_slice());
        beneficiary.copy_from_slice(self.beneficiary.as_slice());
        payout.copy_from_slice(&self.cumulative_payout.to_be_bytes());
        out
    }

    /// The hash that is signed.
    pub fn sig_hash(&self) -> B256 {
        eip191_hash_message(keccak256(self.encode_for_signature()))
    }

    /// Sign with `signer`, returning a signature whose last byte is 27 or 28.
    pub fn sign(&self, signer: &PrivateKeySigner) -> Result<Bytes, ChequeError> {
        let signature = signer
            .sign_hash_sync(&self.sig_hash())
            .map_err(|e| ChequeError::Signing(e.to_string()))?;

        let mut out = Vec::with_capacity(SIGNATURE_LEN);
        out.extend_from_slice(&signature.r().to_be_bytes::<32>());
        out.extend_from_slice(&signature.s().to_be_bytes::<32>());
        out.push(u8::from(signature.v()) + V_OFFSET);
        Ok(out.into())
    }
}

/// A signed cheque as exchanged between peers.
///
/// JSON form: `{"Contract", "Beneficiary", "CumulativePayout", "Honey",
/// "Signature"}` with the payout as a decimal string and the signature as
/// `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cheque {
    #[serde(flatten)]
    pub params: ChequeParams,
    /// Honey the cheque settles. Informational.
    pub honey: u64,
    pub signature: Bytes,
}

impl JsonValue for Cheque {}

impl Cheque {
    /// Build and sign a cheque.
    pub fn issue(
        params: ChequeParams,
        honey: u64,
        signer: &PrivateKeySigner,
    ) -> Result<Self, ChequeError> {
        let signature = params.sign(signer)?;
        Ok(Self {
            params,
            honey,
            signature,
        })
    }

    pub fn contract(&self) -> Address {
        self.params.contract
    }

    pub fn beneficiary(&self) -> Address {
        self.params.beneficiary
    }

    pub fn cumulative_payout(&self) -> Uint256 {
        self.params.cumulative_payout
    }

    /// Address that produced the signature.
    pub fn recover_signer(&self) -> Result<Address, ChequeError> {
        let raw: &[u8; SIGNATURE_LEN] = self.signature.as_ref().try_into().map_err(|_| {
            ChequeError::InvalidChequeSignature(format!(
                "expected {SIGNATURE_LEN} bytes, got {}",
                self.signature.len()
            ))
        })?;

        let (r, rest) = raw.split_at(32);
        let (s, v) = rest.split_at(32);
        let parity = match v {
            [27] => false,
            [28] => true,
            _ => {
                return Err(ChequeError::InvalidChequeSignature(format!(
                    "invalid recovery byte {v:?}"
                )));
            }
        };

        Signature::new(U256::from_be_slice(r), U256::from_be_slice(s), parity)
            .recover_address_from_prehash(&self.params.sig_hash())
            .map_err(|e| ChequeError::InvalidChequeSignature(e.to_string()))
    }

    /// Fail unless the cheque was signed by `expected`.
    pub fn verify_sig(&self, expected: Address) -> Result<(), ChequeError> {
        let signer = self.recover_signer()?;
        if signer != expected {
            return Err(ChequeError::InvalidChequeSignature(format!(
                "signed by {signer}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Check a cheque from a peer whose chequebook is `contract` and whose
    /// cheques are signed by `issuer`, addressed to `expected_beneficiary`.
    pub fn verify_properties(
        &self,
        contract: Address,
        issuer: Address,
        expected_beneficiary: Address,
    ) -> Result<(), ChequeError> {
        if self.contract() != contract {
            return Err(ChequeError::ChequeWrongContract {
                expected: contract,
                actual: self.contract(),
            });
        }
        self.verify_sig(issuer)?;
        if self.beneficiary() != expected_beneficiary {
            return Err(ChequeError::ChequeWrongBeneficiary {
                expected: expected_beneficiary,
                actual: self.beneficiary(),
            });
        }
        Ok(())
    }

    /// Check the increment over `last` against `expected_amount` and return it.
    pub fn verify_against_last(
        &self,
        last: Option<&Cheque>,
        expected_amount: Uint256,
    ) -> Result<Uint256, ChequeError> {
        let actual = match last {
            Some(last) => {
                if self.cumulative_payout() <= last.cumulative_payout() {
                    return Err(ChequeError::ChequeNotMonotone {
                        last: last.cumulative_payout(),
                        actual: self.cumulative_payout(),
                    });
                }
                self.cumulative_payout()
                    .checked_sub(last.cumulative_payout())?
            }
            None => self.cumulative_payout(),
        };

        if actual != expected_amount {
            return Err(ChequeError::UnexpectedAmount {
                expected: expected_amount,
                actual,
            });
        }
        Ok(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, hex};
    use assert_matches::assert_matches;

    const OWNER_KEY: &str = "634fb5a872396d9693e5c9f9d7233cfa93f395c093371017ff44aa9ae6564cdd";
    const CONTRACT: Address = address!("0x4405415b2B8c9F9aA83E151637B8378dD3bcfEDD");
    const BENEFICIARY: Address = address!("0xb8d424e9662fe0837fb1d728f1ac97cebb1085fe");

    fn owner() -> PrivateKeySigner {
        OWNER_KEY.parse().unwrap()
    }

    fn params(payout: u64) -> ChequeParams {
        ChequeParams::new(CONTRACT, BENEFICIARY, Uint256::from_u64(payout))
    }

    fn cheque(payout: u64) -> Cheque {
        Cheque::issue(params(payout), payout, &owner()).unwrap()
    }

    #[test]
    fn test_encode_for_signature() {
        let expected = hex!(
            "4405415b2b8c9f9aa83e151637b8378dd3bcfedd"
            "b8d424e9662fe0837fb1d728f1ac97cebb1085fe"
            "000000000000000000000000000000000000000000000000000000000000002a"
        );
        assert_eq!(params(42).encode_for_signature(), expected);
    }

    #[test]
    fn test_sig_hash() {
        assert_eq!(
            params(42).sig_hash(),
            b256!("0x354a78a181b24d0beb1606cd9f525e6068e8e5dd96747468c21f2ecc89cb0bad")
        );
    }

    #[test]
    fn test_sign_is_deterministic_and_offsets_v() {
        let signature = params(42).sign(&owner()).unwrap();
        assert_eq!(
            signature.as_ref(),
            hex!(
                "a53e7308bb5590b45cabf44538508ccf1760b53eea721dd50bfdd044547e38b4"
                "12142da9f3c690a940d6ee390d3f365a38df02b2688cea17f303f6de01268c2e"
                "1c"
            )
        );
        assert!(signature[64] >= 27);
    }

    #[test]
    fn test_recover_signer() {
        let cheque = cheque(42);
        assert_eq!(cheque.recover_signer().unwrap(), owner().address());
        cheque.verify_sig(owner().address()).unwrap();
        assert_matches!(
            cheque.verify_sig(BENEFICIARY),
            Err(ChequeError::InvalidChequeSignature(_))
        );
    }

    #[test]
    fn test_verify_sig_rejects_malformed_signatures() {
        let mut cheque = cheque(42);

        let mut raw = cheque.signature.to_vec();
        raw[64] -= 27;
        cheque.signature = raw.clone().into();
        assert_matches!(
            cheque.recover_signer(),
            Err(ChequeError::InvalidChequeSignature(_))
        );

        raw.truncate(64);
        cheque.signature = raw.into();
        assert_matches!(
            cheque.recover_signer(),
            Err(ChequeError::InvalidChequeSignature(_))
        );

        cheque.signature = Bytes::new();
        assert_matches!(
            cheque.recover_signer(),
            Err(ChequeError::InvalidChequeSignature(_))
        );
    }

    #[test]
    fn test_tampered_payout_fails_verification() {
        let mut cheque = cheque(42);
        cheque.params.cumulative_payout = Uint256::from_u64(43);
        assert_matches!(
            cheque.verify_sig(owner().address()),
            Err(ChequeError::InvalidChequeSignature(_))
        );
    }

    #[test]
    fn test_verify_properties() {
        let cheque = cheque(42);
        let issuer = owner().address();
        cheque.verify_properties(CONTRACT, issuer, BENEFICIARY).unwrap();

        assert_matches!(
            cheque.verify_properties(Address::ZERO, issuer, BENEFICIARY),
            Err(ChequeError::ChequeWrongContract { .. })
        );
        assert_matches!(
            cheque.verify_properties(CONTRACT, BENEFICIARY, BENEFICIARY),
            Err(ChequeError::InvalidChequeSignature(_))
        );
        assert_matches!(
            cheque.verify_properties(CONTRACT, issuer, Address::ZERO),
            Err(ChequeError::ChequeWrongBeneficiary { .. })
        );
    }

    #[test]
    fn test_verify_against_last() {
        let last = cheque(1000);

        assert_matches!(
            cheque(1000).verify_against_last(Some(&last), Uint256::ZERO),
            Err(ChequeError::ChequeNotMonotone { .. })
        );
        assert_eq!(
            cheque(1001)
                .verify_against_last(Some(&last), Uint256::from_u64(1))
                .unwrap(),
            Uint256::from_u64(1)
        );
        assert_matches!(
            cheque(1001).verify_against_last(Some(&last), Uint256::from_u64(2)),
            Err(ChequeError::UnexpectedAmount { .. })
        );
        assert_eq!(
            cheque(5).verify_against_last(None, Uint256::from_u64(5)).unwrap(),
            Uint256::from_u64(5)
        );
    }

    #[test]
    fn test_json_wire_form() {
        let cheque = cheque(42);
        let json: serde_json::Value = serde_json::to_value(&cheque).unwrap();

        assert_eq!(json["CumulativePayout"], "42");
        assert_eq!(json["Honey"], 42);
        let signature = json["Signature"].as_str().unwrap();
        assert!(signature.starts_with("0x"));
        assert_eq!(signature.len(), 132);
        assert_eq!(
            json["Contract"].as_str().unwrap().to_lowercase(),
            "0x4405415b2b8c9f9aa83e151637b8378dd3bcfedd"
        );

        let decoded: Cheque = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, cheque);
    }
}
