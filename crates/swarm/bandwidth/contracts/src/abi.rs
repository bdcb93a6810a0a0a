use alloy_sol_types::sol;

sol! {
    /// Chequebook holding the issuer's deposit.
    #[derive(Debug, PartialEq, Eq)]
    interface ISimpleSwap {
        event ChequeCashed(
            address indexed beneficiary,
            address indexed recipient,
            address indexed caller,
            uint256 totalPayout,
            uint256 cumulativePayout,
            uint256 callerPayout
        );
        event ChequeBounced();
        event Withdraw(uint256 amount);

        function issuer() external view returns (address);
        function paidOut(address beneficiary) external view returns (uint256);
        function totalPaidOut() external view returns (uint256);
        function liquidBalance() external view returns (uint256);
        function totalHardDeposit() external view returns (uint256);
        function cashChequeBeneficiary(address recipient, uint256 cumulativePayout, bytes calldata issuerSig) external;
        function withdraw(uint256 amount) external;
    }

    /// Deploys chequebooks and remembers which ones it deployed.
    #[derive(Debug, PartialEq, Eq)]
    interface ISimpleSwapFactory {
        event SimpleSwapDeployed(address contractAddress);

        function deployedContracts(address) external view returns (bool);
        function deploySimpleSwap(address issuer, uint256 defaultHardDepositTimeoutDuration) external payable returns (address);
    }
}

/// Human-readable ABI of the chequebook functions this crate uses.
pub const SIMPLE_SWAP_ABI: &[&str] = &[
    "event ChequeCashed(address indexed beneficiary, address indexed recipient, address indexed caller, uint256 totalPayout, uint256 cumulativePayout, uint256 callerPayout)",
    "event ChequeBounced()",
    "event Withdraw(uint256 amount)",
    "function issuer() view returns (address)",
    "function paidOut(address beneficiary) view returns (uint256)",
    "function totalPaidOut() view returns (uint256)",
    "function liquidBalance() view returns (uint256)",
    "function totalHardDeposit() view returns (uint256)",
    "function cashChequeBeneficiary(address recipient, uint256 cumulativePayout, bytes issuerSig)",
    "function withdraw(uint256 amount)",
];

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use alloy_sol_types::{SolCall, SolEvent};

    #[test]
    fn test_selectors() {
        assert_eq!(ISimpleSwap::issuerCall::SIGNATURE, "issuer()");
        assert_eq!(
            ISimpleSwap::cashChequeBeneficiaryCall::SIGNATURE,
            "cashChequeBeneficiary(address,uint256,bytes)"
        );
        assert_eq!(
            ISimpleSwapFactory::deploySimpleSwapCall::SIGNATURE,
            "deploySimpleSwap(address,uint256)"
        );
        assert_eq!(
            ISimpleSwapFactory::SimpleSwapDeployed::SIGNATURE,
            "SimpleSwapDeployed(address)"
        );
    }

    #[test]
    fn test_paid_out_calldata() {
        let call = ISimpleSwap::paidOutCall {
            beneficiary: Address::repeat_byte(0x11),
        };
        let data = call.abi_encode();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], ISimpleSwap::paidOutCall::SELECTOR.as_slice());

        let ret = U256::from(7).to_be_bytes::<32>();
        let decoded = ISimpleSwap::paidOutCall::abi_decode_returns(&ret).unwrap();
        assert_eq!(decoded, U256::from(7));
    }

    #[test]
    fn test_abi_lists_every_function_used() {
        for name in [
            "issuer",
            "paidOut",
            "liquidBalance",
            "totalHardDeposit",
            "cashChequeBeneficiary",
            "withdraw",
        ] {
            assert!(
                SIMPLE_SWAP_ABI
                    .iter()
                    .any(|item| item.starts_with(&format!("function {name}("))),
                "{name} missing"
            );
        }
    }
}
