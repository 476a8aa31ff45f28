//! Voting contract bindings, proposal management and batch voting

use std::time::Duration;

use alloy::primitives::{Address, LogData, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use rand::Rng;

use crate::chain::{ChainConnection, ChainProvider, TxSender, await_confirmation};
use crate::errors::{ProvisionError, ProvisionResult};
use crate::provisioning::accounts::AccountBatch;
use crate::provisioning::shared::{BatchItem, BatchReport, RetryPolicy, TxConfirmation, run_sequential};

sol! {
    #[sol(rpc)]
    interface Voting {
        #[derive(Debug, PartialEq, Eq)]
        struct Proposal {
            string name;
            uint256 voteCount;
        }

        function addProposal(string newName) external;
        function delProposal(uint256 proposal) external;
        function getProposals() external view returns (Proposal[] memory proposal);
        function vote(uint256 proposal) external;
        function winningProposal() external view returns (uint256 winningProposal);

        #[derive(Debug, PartialEq, Eq)]
        event ProposalCreated(string name);
        #[derive(Debug, PartialEq, Eq)]
        event ProposalDeleted(uint256 proposal);
        #[derive(Debug, PartialEq, Eq)]
        event Voted(address indexed voter, uint256 proposal);
    }
}

pub use Voting::Proposal;

/// A Voting instance with the crate's provider
pub type VotingContract = Voting::VotingInstance<ChainProvider>;

pub fn voting(address: Address, provider: ChainProvider) -> VotingContract {
    Voting::new(address, provider)
}

/// Voting events the listener reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotingEvent {
    ProposalCreated { name: String },
    ProposalDeleted { proposal: U256 },
    Voted { voter: Address, proposal: U256 },
}

impl std::fmt::Display for VotingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotingEvent::ProposalCreated { name } => write!(f, "proposal created: {}", name),
            VotingEvent::ProposalDeleted { proposal } => write!(f, "proposal deleted: {}", proposal),
            VotingEvent::Voted { voter, proposal } => write!(f, "{} voted for proposal {}", voter, proposal),
        }
    }
}

/// Decode a raw log emitted by the voting contract; foreign topics yield `None`
pub fn decode_voting_event(data: &LogData) -> Option<VotingEvent> {
    let topic0 = *data.topics().first()?;

    if topic0 == Voting::ProposalCreated::SIGNATURE_HASH {
        let event = Voting::ProposalCreated::decode_log_data(data).ok()?;
        Some(VotingEvent::ProposalCreated { name: event.name })
    } else if topic0 == Voting::ProposalDeleted::SIGNATURE_HASH {
        let event = Voting::ProposalDeleted::decode_log_data(data).ok()?;
        Some(VotingEvent::ProposalDeleted {
            proposal: event.proposal,
        })
    } else if topic0 == Voting::Voted::SIGNATURE_HASH {
        let event = Voting::Voted::decode_log_data(data).ok()?;
        Some(VotingEvent::Voted {
            voter: event.voter,
            proposal: event.proposal,
        })
    } else {
        None
    }
}

fn call_error(method: &str, err: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::contract(format!("Voting.{} failed: {}", method, err))
}

pub async fn proposals(contract: &VotingContract) -> ProvisionResult<Vec<Proposal>> {
    contract
        .getProposals()
        .call()
        .await
        .map_err(|e| call_error("getProposals", e))
}

pub async fn winning_proposal(contract: &VotingContract) -> ProvisionResult<U256> {
    contract
        .winningProposal()
        .call()
        .await
        .map_err(|e| call_error("winningProposal", e))
}

pub async fn add_proposal(contract: &VotingContract, name: &str, timeout: Duration) -> ProvisionResult<TxConfirmation> {
    let pending = contract
        .addProposal(name.to_string())
        .send()
        .await
        .map_err(|e| call_error("addProposal", e))?;

    await_confirmation(pending, timeout)
        .await
        .map_err(|e| call_error("addProposal", e))
}

pub async fn delete_proposal(contract: &VotingContract, index: U256, timeout: Duration) -> ProvisionResult<TxConfirmation> {
    let pending = contract
        .delProposal(index)
        .send()
        .await
        .map_err(|e| call_error("delProposal", e))?;

    await_confirmation(pending, timeout)
        .await
        .map_err(|e| call_error("delProposal", e))
}

/// Pick a uniformly random proposal index for each voter
pub fn random_choices<R: Rng>(rng: &mut R, voters: usize, proposal_count: usize) -> ProvisionResult<Vec<usize>> {
    if proposal_count == 0 {
        return Err(ProvisionError::config("the voting contract has no proposals"));
    }
    Ok((0..voters).map(|_| rng.gen_range(0..proposal_count)).collect())
}

/// Every batch account votes once for a random proposal
pub async fn vote_with_batch(
    connection: &ChainConnection,
    address: Address,
    batch: &AccountBatch,
    retry: RetryPolicy,
) -> ProvisionResult<BatchReport> {
    let reader = voting(address, connection.provider());
    let proposal_count = proposals(&reader).await?.len();

    let signers = batch
        .iter()
        .map(|account| {
            account.verify()?;
            account.signer()
        })
        .collect::<ProvisionResult<Vec<_>>>()?;
    let choices = random_choices(&mut rand::thread_rng(), signers.len(), proposal_count)?;

    let items = signers
        .iter()
        .zip(&choices)
        .map(|(signer, choice)| BatchItem::new(signer.address()).with_detail(format!("proposal {}", choice)))
        .collect();

    let report = run_sequential(BatchReport::new("vote"), items, retry, |index, _| {
        let sender = TxSender::new(connection, signers[index].clone());
        let tx = reader.vote(U256::from(choices[index])).into_transaction_request();
        async move { sender.submit(tx).await }
    })
    .await;

    Ok(report)
}
