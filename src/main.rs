use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::utils::{format_ether, format_units};
use alloy::primitives::{Address, U256};
use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use reqwest::Url;

use kui_testnet::chain::ChainConnection;
use kui_testnet::cli_helper::{ensure_source_key, init_tracing, initialize_app_config, save_report};
use kui_testnet::cli_utils::{
    confirm, format_record, format_table, print_batch_summary, print_header, print_info, print_success, print_warning,
};
use kui_testnet::contracts::{crowdfunding, kui_token, voting};
use kui_testnet::listener::{DEFAULT_POLL_INTERVAL, VoteListener};
use kui_testnet::provisioning::accounts::load_batch_from_json;
use kui_testnet::provisioning::funding::{parse_amount, parse_amount_units};
use kui_testnet::provisioning::shared::{BatchReport, RetryPolicy};
use kui_testnet::utils::app_config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "kui-testnet")]
#[command(about = "Drive the Kui test contracts on the BSC testnet", long_about = None)]
struct Cli {
    /// Batch file produced by account-generator
    #[arg(long, short = 'a', global = true)]
    accounts: Option<PathBuf>,

    /// JSON-RPC endpoint, overrides RPC_URL
    #[arg(long, global = true)]
    rpc_url: Option<Url>,

    /// HTTP proxy for RPC traffic, overrides PROXY_URL
    #[arg(long, global = true)]
    proxy_url: Option<Url>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Native balances of the source account and every batch account
    Balances,
    /// KuiToken operations
    #[command(subcommand)]
    Token(TokenCommand),
    /// Voting contract operations
    #[command(subcommand)]
    Voting(VotingCommand),
    /// Crowdfunding contract operations
    #[command(subcommand)]
    Crowdfunding(CrowdfundingCommand),
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Name, symbol, supply and balances of the token
    Info,
    /// Mint tokens, to the owner unless --to is given
    Mint {
        /// Amount in whole tokens
        #[arg(long)]
        amount: String,

        #[arg(long)]
        to: Option<Address>,
    },
    /// Check that the source account owns the token
    OwnerCheck,
}

#[derive(Subcommand, Debug)]
enum VotingCommand {
    AddProposal {
        name: String,
    },
    DeleteProposal {
        index: u64,
    },
    /// List proposals with their vote counts
    Proposals,
    /// Show the proposal currently in the lead
    Winning,
    /// Every batch account votes for a random proposal
    VoteAll(BatchArgs),
    /// Print proposal events as they are emitted, until Ctrl-C
    Listen {
        /// Block to start from, defaults to the chain head
        #[arg(long)]
        from_block: Option<u64>,

        /// Poll interval in seconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
        interval: u64,
    },
}

#[derive(Subcommand, Debug)]
enum CrowdfundingCommand {
    /// Total contributed so far
    Total,
    /// Every batch account contributes a fixed amount
    ContributeAll {
        /// Contribution per account, in ether units
        #[arg(long, default_value = crowdfunding::DEFAULT_CONTRIBUTION)]
        amount: String,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Withdraw the raised funds to the owner
    Withdraw,
    /// Push the deadline back
    ExtendDeadline {
        /// Additional minutes
        minutes: u64,
    },
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Extra attempts for submissions that never reached the node
    #[arg(long, default_value_t = 0)]
    retry_limit: u32,

    /// Base delay for exponential backoff in milliseconds
    #[arg(long, default_value_t = 500)]
    retry_delay: u64,

    /// Write the batch report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Exit with an error if any item failed
    #[arg(long)]
    strict: bool,
}

impl BatchArgs {
    fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_limit, self.retry_delay)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut app_config = initialize_app_config()?;
    if let Some(path) = cli.accounts {
        app_config = app_config.with_accounts_file(path);
    }
    if let Some(rpc_url) = cli.rpc_url {
        app_config.rpc_url = rpc_url;
    }
    if cli.proxy_url.is_some() {
        app_config = app_config.with_proxy_url(cli.proxy_url);
    }

    tracing::debug!(?app_config, "configuration loaded");

    match cli.command {
        Command::Balances => show_balances(&app_config).await,
        Command::Token(command) => run_token(app_config, command).await,
        Command::Voting(command) => run_voting(app_config, command).await,
        Command::Crowdfunding(command) => run_crowdfunding(app_config, command).await,
    }
}

async fn show_balances(app_config: &AppConfig) -> Result<()> {
    print_header("Balances");

    let connection = ChainConnection::connect(app_config)?;
    let batch = load_batch_from_json(&app_config.accounts_file)?;

    let mut rows = Vec::with_capacity(batch.len() + 1);
    if app_config.has_private_key() {
        let source = app_config.source_signer()?.address();
        let balance = connection.balance_of(source).await?;
        rows.push(vec!["source".to_string(), source.to_string(), format_ether(balance)]);
    }

    for (i, address) in batch.addresses()?.into_iter().enumerate() {
        let balance = connection.balance_of(address).await?;
        rows.push(vec![i.to_string(), address.to_string(), format_ether(balance)]);
    }

    format_table(vec!["#", "Address", "Balance"], rows);
    Ok(())
}

async fn run_token(app_config: AppConfig, command: TokenCommand) -> Result<()> {
    let address = app_config.contracts.kui_token;

    match command {
        TokenCommand::Info => {
            print_header("KuiToken");
            let connection = ChainConnection::connect(&app_config)?;
            let token = kui_token::kui_token(address, connection.provider());
            let summary = kui_token::token_summary(&token).await?;

            format_record(vec![
                ("Address", summary.address.to_string()),
                ("Name", summary.name.clone()),
                ("Symbol", summary.symbol.clone()),
                ("Decimals", summary.decimals.to_string()),
                ("Total supply", format_units(summary.total_supply, summary.decimals)?),
                ("Owner", summary.owner.to_string()),
                ("Owner balance", format_units(summary.owner_balance, summary.decimals)?),
                ("Contract balance", format_units(summary.contract_balance, summary.decimals)?),
            ]);
        }
        TokenCommand::Mint { amount, to } => {
            print_header("Mint KuiToken");
            let app_config = ensure_source_key(app_config)?;
            let signer = app_config.source_signer()?;
            let source = signer.address();
            let connection = ChainConnection::connect(&app_config)?;
            let token = kui_token::kui_token(address, connection.signing_provider(signer));

            let decimals = kui_token::decimals(&token).await?;
            let value = parse_amount_units(&amount, decimals)?;
            let recipient = match to {
                Some(to) => to,
                None => kui_token::token_owner(&token).await?,
            };

            print_info(&format!("Minting {} tokens to {} from {}", amount, recipient, source));
            let confirmation = kui_token::mint(&token, recipient, value, connection.confirmation_timeout()).await?;
            print_success(&format!(
                "Minted in {} (block {})",
                confirmation.tx_hash,
                block_label(confirmation.block_number)
            ));

            let balance = kui_token::balance_of(&token, recipient).await?;
            print_info(&format!("Recipient balance: {}", format_units(balance, decimals)?));
        }
        TokenCommand::OwnerCheck => {
            let app_config = ensure_source_key(app_config)?;
            let source = app_config.source_signer()?.address();
            let connection = ChainConnection::connect(&app_config)?;
            let token = kui_token::kui_token(address, connection.provider());

            kui_token::ensure_owner(&token, source).await?;
            print_success(&format!("{} owns the token", source));
        }
    }

    Ok(())
}

async fn run_voting(app_config: AppConfig, command: VotingCommand) -> Result<()> {
    let address = app_config.contracts.voting;

    match command {
        VotingCommand::AddProposal { name } => {
            let (connection, contract) = signed_voting(app_config)?;
            let confirmation = voting::add_proposal(&contract, &name, connection.confirmation_timeout()).await?;
            print_success(&format!("Proposal '{}' added in {}", name, confirmation.tx_hash));
        }
        VotingCommand::DeleteProposal { index } => {
            let (connection, contract) = signed_voting(app_config)?;
            let confirmation =
                voting::delete_proposal(&contract, U256::from(index), connection.confirmation_timeout()).await?;
            print_success(&format!("Proposal {} deleted in {}", index, confirmation.tx_hash));
        }
        VotingCommand::Proposals => {
            print_header("Proposals");
            let connection = ChainConnection::connect(&app_config)?;
            let contract = voting::voting(address, connection.provider());
            let proposals = voting::proposals(&contract).await?;

            let rows = proposals
                .iter()
                .enumerate()
                .map(|(i, p)| vec![i.to_string(), p.name.clone(), p.voteCount.to_string()])
                .collect();
            format_table(vec!["#", "Name", "Votes"], rows);
        }
        VotingCommand::Winning => {
            let connection = ChainConnection::connect(&app_config)?;
            let contract = voting::voting(address, connection.provider());
            let winner = voting::winning_proposal(&contract).await?;
            let proposals = voting::proposals(&contract).await?;

            let name = usize::try_from(winner)
                .ok()
                .and_then(|i| proposals.get(i))
                .map(|p| format!("{} ({} votes)", p.name, p.voteCount))
                .unwrap_or_else(|| "unknown".to_string());
            print_success(&format!("Winning proposal {}: {}", winner, name));
        }
        VotingCommand::VoteAll(args) => {
            print_header("Batch Vote");
            let batch = load_batch_from_json(&app_config.accounts_file)?;
            if !proceed(&args, &format!("Cast one vote from each of {} accounts?", batch.len()))? {
                return Ok(());
            }

            let connection = ChainConnection::connect(&app_config)?;
            let report = voting::vote_with_batch(&connection, address, &batch, args.retry()).await?;
            finish_batch(&report, &args)?;
        }
        VotingCommand::Listen { from_block, interval } => {
            print_header("Voting Events");
            let connection = ChainConnection::connect(&app_config)?;
            let mut listener =
                VoteListener::new(&connection, address).with_poll_interval(Duration::from_secs(interval.max(1)));
            if let Some(block) = from_block {
                listener = listener.from_block(block);
            }

            listener
                .run(|observed| {
                    println!(
                        "{} {}",
                        format!("[block {}]", block_label(observed.block_number)).bright_black(),
                        observed.event
                    );
                })
                .await?;
        }
    }

    Ok(())
}

async fn run_crowdfunding(app_config: AppConfig, command: CrowdfundingCommand) -> Result<()> {
    let address = app_config.contracts.crowdfunding;

    match command {
        CrowdfundingCommand::Total => {
            let connection = ChainConnection::connect(&app_config)?;
            let contract = crowdfunding::crowdfunding(address, connection.provider());
            let total = crowdfunding::total_contributed(&contract).await?;
            print_info(&format!("Total contributed: {}", format_ether(total)));
        }
        CrowdfundingCommand::ContributeAll { amount, batch: args } => {
            print_header("Batch Contribution");
            let value = parse_amount(&amount)?;
            let batch = load_batch_from_json(&app_config.accounts_file)?;
            if !proceed(&args, &format!("Contribute {} from each of {} accounts?", amount, batch.len()))? {
                return Ok(());
            }

            let connection = ChainConnection::connect(&app_config)?;
            let report = crowdfunding::contribute_with_batch(&connection, address, &batch, value, args.retry()).await?;
            finish_batch(&report, &args)?;
        }
        CrowdfundingCommand::Withdraw => {
            let (connection, contract) = signed_crowdfunding(app_config)?;
            let confirmation = crowdfunding::withdraw_funds(&contract, connection.confirmation_timeout()).await?;
            print_success(&format!("Funds withdrawn in {}", confirmation.tx_hash));
        }
        CrowdfundingCommand::ExtendDeadline { minutes } => {
            let (connection, contract) = signed_crowdfunding(app_config)?;
            let confirmation =
                crowdfunding::extend_deadline(&contract, minutes, connection.confirmation_timeout()).await?;
            print_success(&format!("Deadline extended by {} minutes in {}", minutes, confirmation.tx_hash));
        }
    }

    Ok(())
}

fn signed_voting(app_config: AppConfig) -> Result<(ChainConnection, voting::VotingContract)> {
    let app_config = ensure_source_key(app_config)?;
    let connection = ChainConnection::connect(&app_config)?;
    let provider = connection.signing_provider(app_config.source_signer()?);
    let contract = voting::voting(app_config.contracts.voting, provider);
    Ok((connection, contract))
}

fn signed_crowdfunding(app_config: AppConfig) -> Result<(ChainConnection, crowdfunding::CrowdfundingContract)> {
    let app_config = ensure_source_key(app_config)?;
    let connection = ChainConnection::connect(&app_config)?;
    let provider = connection.signing_provider(app_config.source_signer()?);
    let contract = crowdfunding::crowdfunding(app_config.contracts.crowdfunding, provider);
    Ok((connection, contract))
}

fn proceed(args: &BatchArgs, prompt: &str) -> Result<bool> {
    if args.yes || confirm(prompt)? {
        return Ok(true);
    }
    print_info("Cancelled");
    Ok(false)
}

fn finish_batch(report: &BatchReport, args: &BatchArgs) -> Result<()> {
    print_batch_summary(report);

    if let Some(path) = &args.report {
        save_report(report, path)?;
        print_info(&format!("Report written to {}", path.display()));
    }

    if !report.all_confirmed() {
        print_warning(&format!("{} of {} items failed", report.failed_count(), report.requested()));
        if args.strict {
            bail!("{} incomplete", report.action);
        }
    }

    Ok(())
}

fn block_label(block_number: Option<u64>) -> String {
    block_number.map_or_else(|| "pending".to_string(), |b| b.to_string())
}
