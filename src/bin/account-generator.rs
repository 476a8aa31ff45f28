use std::path::PathBuf;

use alloy::primitives::utils::format_ether;
use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use kui_testnet::chain::{ChainConnection, EvmTransferClient};
use kui_testnet::cli_helper::{ensure_source_key, init_tracing, initialize_app_config, save_report};
use kui_testnet::cli_utils::{confirm, print_batch_summary, print_header, print_info, print_success, print_warning};
use kui_testnet::provisioning::accounts::{
    AccountBatch, AccountGenerator, DEFAULT_BATCH_SIZE, GeneratorConfig, load_batch_from_json,
};
use kui_testnet::provisioning::funding::{DEFAULT_FUNDING_AMOUNT, Funder, FundingConfig};
use kui_testnet::provisioning::shared::RetryPolicy;
use kui_testnet::utils::app_config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "account-generator")]
#[command(about = "Generate and fund test accounts for the BSC testnet suites", long_about = None)]
struct Cli {
    /// Batch file shared with the test suites
    #[arg(long, short = 'a', global = true, env = "ACCOUNTS_FILE")]
    accounts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a fresh batch of key pairs, replacing the batch file
    Generate {
        /// Number of accounts to generate
        #[arg(long, short = 'n', default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: u32,
    },
    /// Send native currency from the source account to every account in the batch file
    Fund(FundArgs),
    /// Generate a batch, then fund it
    Provision {
        #[arg(long, short = 'n', default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: u32,

        #[command(flatten)]
        fund: FundArgs,
    },
}

#[derive(Args, Debug)]
struct FundArgs {
    /// Amount of native currency per account, in ether units
    #[arg(long, default_value = DEFAULT_FUNDING_AMOUNT)]
    amount: String,

    /// Extra attempts for transfers that never reached the node
    #[arg(long, default_value_t = 0)]
    retry_limit: u32,

    /// Base delay for exponential backoff in milliseconds
    #[arg(long, default_value_t = 500)]
    retry_delay: u64,

    /// Write the funding report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Exit with an error if any transfer failed
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    print_header("Kui Testnet Account Generator");

    let mut app_config = initialize_app_config()?;
    if let Some(path) = cli.accounts {
        app_config = app_config.with_accounts_file(path);
    }

    match cli.command {
        Command::Generate { batch_size } => {
            generate(&app_config, batch_size)?;
        }
        Command::Fund(args) => {
            let batch = load_batch_from_json(&app_config.accounts_file)?;
            print_info(&format!(
                "Loaded {} accounts from {}",
                batch.len(),
                app_config.accounts_file.display()
            ));
            fund(app_config, &batch, &args).await?;
        }
        Command::Provision { batch_size, fund: args } => {
            let batch = generate(&app_config, batch_size)?;
            fund(app_config, &batch, &args).await?;
        }
    }

    Ok(())
}

fn generate(app_config: &AppConfig, batch_size: u32) -> Result<AccountBatch> {
    let config = GeneratorConfig::new()
        .with_batch_size(batch_size)
        .with_output_file(app_config.accounts_file.clone());

    let batch = AccountGenerator::new(config).generate_and_save()?;

    for (i, account) in batch.iter().enumerate() {
        eprintln!("  [{}] {}", i, account.address);
    }
    print_success(&format!(
        "Saved {} accounts to {}",
        batch.len(),
        app_config.accounts_file.display()
    ));

    Ok(batch)
}

async fn fund(app_config: AppConfig, batch: &AccountBatch, args: &FundArgs) -> Result<()> {
    let app_config = ensure_source_key(app_config)?;
    let funding_config = FundingConfig::new()
        .with_amount_ether(&args.amount)?
        .with_retry(RetryPolicy::new(args.retry_limit, args.retry_delay));

    let connection = ChainConnection::connect(&app_config)?;
    let chain_id = connection.chain_id().await?;
    let client = EvmTransferClient::new(&connection, app_config.source_signer()?);
    let funder = Funder::new(client, funding_config);

    let check = funder.check_balance(batch.len()).await?;
    print_info(&format!(
        "Source {} holds {} (needs {} plus fees)",
        check.source,
        format_ether(check.balance),
        format_ether(check.required)
    ));
    if !check.is_sufficient() {
        print_warning("Source balance does not cover the whole batch; later transfers will fail");
    }

    if !args.yes {
        let prompt = format!(
            "Send {} to each of {} accounts on chain {}?",
            funding_config.amount_ether(),
            batch.len(),
            chain_id
        );
        if !confirm(&prompt)? {
            print_info("Funding cancelled");
            return Ok(());
        }
    }

    let report = funder.fund_batch(batch).await?;
    print_batch_summary(&report);

    if let Some(path) = &args.report {
        save_report(&report, path)?;
        print_info(&format!("Report written to {}", path.display()));
    }

    if report.all_confirmed() {
        print_success("All accounts funded");
    } else {
        eprintln!(
            "{}",
            format!("{} of {} transfers failed", report.failed_count(), report.requested()).red()
        );
        if args.strict {
            bail!("funding incomplete");
        }
    }

    Ok(())
}
