use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256, address};
use alloy_sol_types::{SolCall, SolEvent};
use tracing::{debug, info};
use vertex_swarm_bandwidth_chain::{
    ChainBackend, Receipt, ShutdownSignal, TransactOpts, TxRequest, wait_mined,
};

use crate::abi::ISimpleSwapFactory;
use crate::{ContractError, DEPLOY_GAS_LIMIT, SimpleSwap};

const SIMPLE_SWAP_FACTORY_RUNTIME_HEX: &str = include_str!("../res/simple_swap_factory_runtime.hex");

/// Runtime bytecode of the SimpleSwap factory.
pub fn simple_swap_factory_runtime_code() -> Result<Bytes, ContractError> {
    hex::decode(SIMPLE_SWAP_FACTORY_RUNTIME_HEX.trim())
        .map(Bytes::from)
        .map_err(|e| ContractError::Decode(e.to_string()))
}

/// Factory deployments by network id.
const DEPLOYMENTS: &[(u64, Address)] = &[
    // ropsten
    (3, address!("0x878Ccb2e3c2973767e431bAec86D1EFd809480d5")),
    // goerli
    (5, address!("0x73c412512E1cA0be3b89b77aB3466dA6A1B9d273")),
];

/// Address of the factory deployed on `network_id`.
pub fn factory_address_for_network(network_id: u64) -> Result<Address, ContractError> {
    DEPLOYMENTS
        .iter()
        .find(|(id, _)| *id == network_id)
        .map(|(_, address)| *address)
        .ok_or(ContractError::UnknownNetwork(network_id))
}

/// The SimpleSwap factory contract.
#[derive(Clone)]
pub struct SimpleSwapFactory {
    address: Address,
    backend: Arc<dyn ChainBackend>,
    reference_code: Option<Bytes>,
}

impl std::fmt::Debug for SimpleSwapFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleSwapFactory")
            .field("address", &self.address)
            .field("reference_code", &self.reference_code.as_ref().map(|c| c.len()))
            .finish_non_exhaustive()
    }
}

impl SimpleSwapFactory {
    pub fn at(address: Address, backend: Arc<dyn ChainBackend>) -> Self {
        Self {
            address,
            backend,
            reference_code: None,
        }
    }

    /// Compare against `code` instead of the embedded factory runtime code
    /// in [`verify_self`](Self::verify_self).
    pub fn with_reference_code(mut self, code: impl Into<Bytes>) -> Self {
        self.reference_code = Some(code.into());
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn backend(&self) -> &Arc<dyn ChainBackend> {
        &self.backend
    }

    /// Check that the code at the address is the factory runtime code, byte
    /// for byte.
    pub async fn verify_self(&self) -> Result<(), ContractError> {
        let code = self.backend.code_at(self.address).await?;
        let reference = match &self.reference_code {
            Some(reference) => reference.clone(),
            None => simple_swap_factory_runtime_code()?,
        };
        if code != reference {
            return Err(ContractError::FactoryCodeMismatch(self.address));
        }
        Ok(())
    }

    async fn is_deployed(&self, contract: Address) -> Result<bool, ContractError> {
        let call = ISimpleSwapFactory::deployedContractsCall(contract);
        let output = self
            .backend
            .call(&TxRequest::new(self.address, call.abi_encode()))
            .await?;
        ISimpleSwapFactory::deployedContractsCall::abi_decode_returns(&output)
            .map_err(|e| ContractError::Decode(e.to_string()))
    }

    /// Fail unless `contract` was deployed by this factory.
    pub async fn verify_contract(&self, contract: Address) -> Result<(), ContractError> {
        if !self.is_deployed(contract).await? {
            return Err(ContractError::NotDeployedByFactory(contract));
        }
        Ok(())
    }

    /// Transaction deploying a chequebook owned by `issuer`. The value sent
    /// with it becomes the deposit.
    pub fn deploy_simple_swap_request(
        &self,
        issuer: Address,
        default_hard_deposit_timeout: Duration,
    ) -> TxRequest {
        let call = ISimpleSwapFactory::deploySimpleSwapCall {
            issuer,
            defaultHardDepositTimeoutDuration: U256::from(default_hard_deposit_timeout.as_secs()),
        };
        TxRequest::new(self.address, call.abi_encode())
    }

    /// Send a deployment without waiting for it.
    pub async fn deploy_simple_swap_start(
        &self,
        opts: &TransactOpts,
        issuer: Address,
        default_hard_deposit_timeout: Duration,
    ) -> Result<B256, ContractError> {
        let request = self.deploy_simple_swap_request(issuer, default_hard_deposit_timeout);
        let opts = opts.clone().with_gas_limit(DEPLOY_GAS_LIMIT);
        let hash = self.backend.send_transaction(request, &opts).await?;
        debug!(factory = %self.address, %issuer, %hash, "Chequebook deployment sent");
        Ok(hash)
    }

    /// Deploy a chequebook and wait until it is mined.
    pub async fn deploy_simple_swap(
        &self,
        opts: &TransactOpts,
        issuer: Address,
        default_hard_deposit_timeout: Duration,
        poll_interval: Duration,
        shutdown: &ShutdownSignal,
    ) -> Result<SimpleSwap, ContractError> {
        let hash = self
            .deploy_simple_swap_start(opts, issuer, default_hard_deposit_timeout)
            .await?;
        let receipt = wait_mined(self.backend.as_ref(), hash, poll_interval, shutdown).await?;
        self.deployed_from_receipt(&receipt)
    }

    /// The chequebook announced by a mined deployment.
    pub fn deployed_from_receipt(&self, receipt: &Receipt) -> Result<SimpleSwap, ContractError> {
        if !receipt.status {
            return Err(ContractError::TransactionReverted(receipt.transaction_hash));
        }

        let event = receipt
            .logs
            .iter()
            .filter(|log| log.address == self.address)
            .filter(|log| {
                log.topics.first() == Some(&ISimpleSwapFactory::SimpleSwapDeployed::SIGNATURE_HASH)
            })
            .find_map(|log| ISimpleSwapFactory::SimpleSwapDeployed::decode_log_data(&log.log_data()).ok())
            .ok_or(ContractError::MissingEvent {
                tx: receipt.transaction_hash,
                event: "SimpleSwapDeployed",
            })?;

        info!(factory = %self.address, contract = %event.contractAddress, "Chequebook deployed");
        Ok(SimpleSwap::at(event.contractAddress, self.backend.clone()))
    }
}
