//! Typed bindings for the deployed test contracts

pub mod crowdfunding;
pub mod kui_token;
pub mod voting;

pub use crowdfunding::{CrowdfundingContract, crowdfunding};
pub use kui_token::{KuiTokenContract, TokenSummary, kui_token};
pub use voting::{Proposal, VotingContract, VotingEvent, decode_voting_event, voting};
