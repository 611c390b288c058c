//! Checkout entrypoint.
//!
//! Pays the configured order and delivers the proof to its backend, or manages proofs the
//! backend has not acknowledged yet.
//!
//! Subcommands:
//! - `pay` (default) – run the checkout in the configured mode
//! - `pending` – print unacknowledged proofs as JSON
//! - `resubmit` – submit every unacknowledged proof once more
//! - `discard <hash>` – forget an unacknowledged proof
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` points at the JSON configuration file
//! - `RUST_LOG` controls log verbosity, `OTEL_*` enables trace export

use clap::Parser;
use dotenvy::dotenv;
use ethpay_checkout::config::{CliArgs, Command, Config, PaymentMode};
use ethpay_checkout::details::PaymentDetailsClient;
use ethpay_checkout::endpoint::TransactionDetailsEndpoint;
use ethpay_checkout::iframe::host::{ConsoleIframeHost, relay_console_input};
use ethpay_checkout::iframe::{IframeMessageChannel, MessageWindow};
use ethpay_checkout::pending::{FileSubmissionStore, HttpProofSubmitter, PendingSubmissionBuffer};
use ethpay_checkout::sig_down::SigDown;
use ethpay_checkout::telemetry::Telemetry;
use ethpay_checkout::ui::ConsoleUi;
use ethpay_checkout::wallet::WalletSession;
use ethpay_checkout::{PaymentOrchestrator, PaymentRoute, PaymentState};
use ethpay_eip155::LocalWallet;
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let outcome = run(CliArgs::parse()).await;
    drop(telemetry);
    // The stdin relay blocks a runtime thread that cannot be cancelled, so leave without
    // waiting for runtime shutdown.
    match outcome {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            eprintln!("Error: {error}");
            std::process::exit(1);
        }
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from_path(&args.config)?;

    let mut endpoint = TransactionDetailsEndpoint::new(config.transaction_details_url().clone());
    if let Some(timeout) = config.request_timeout() {
        endpoint = endpoint.with_timeout(timeout);
    }
    let mut submitter = HttpProofSubmitter::new(endpoint.clone());
    if let Some(token) = config.csrf_token() {
        submitter = submitter.with_csrf_token(token);
    }
    let store = FileSubmissionStore::new(config.pending_store());
    let buffer = Arc::new(PendingSubmissionBuffer::open(
        Arc::new(store),
        Arc::new(submitter),
    )?);

    match args.command.unwrap_or(Command::Pay) {
        Command::Pending => {
            println!("{}", serde_json::to_string_pretty(&buffer.pending())?);
            Ok(())
        }
        Command::Resubmit => {
            let report = buffer.resubmit_pending().await;
            for hash in &report.acknowledged {
                println!("Acknowledged {hash}");
            }
            for lost in &report.failed {
                eprintln!("{lost}");
            }
            if report.failed.is_empty() {
                Ok(())
            } else {
                Err(format!("{} proof(s) still unacknowledged", report.failed.len()).into())
            }
        }
        Command::Discard { transaction_hash } => match buffer.discard(&transaction_hash) {
            Some(_) => {
                println!("Discarded {transaction_hash}");
                Ok(())
            }
            None => Err(format!("No pending proof for {transaction_hash}").into()),
        },
        Command::Pay => pay(&config, endpoint, buffer).await,
    }
}

async fn pay(
    config: &Config,
    endpoint: TransactionDetailsEndpoint,
    buffer: Arc<PendingSubmissionBuffer>,
) -> Result<(), Box<dyn std::error::Error>> {
    let route = match config.mode() {
        PaymentMode::Wallet => {
            let wallet = LocalWallet::try_new(config.wallet()?)?;
            let session = WalletSession::new(Arc::new(wallet));
            let account = session.connect().await?;
            println!(
                "Paying from {} on chain {}",
                account.address, account.chain_id
            );
            PaymentRoute::DirectWallet(session)
        }
        PaymentMode::Iframe => {
            let window = Arc::new(MessageWindow::new());
            let channel = IframeMessageChannel::new(window.clone(), Arc::new(ConsoleIframeHost));
            let relay = channel.clone();
            tokio::spawn(async move {
                let stdin = BufReader::new(tokio::io::stdin());
                if let Err(error) = relay_console_input(stdin, window, relay).await {
                    tracing::error!(%error, "Console relay stopped");
                }
            });
            PaymentRoute::HostedIframe {
                channel,
                settings: config.iframe()?.clone(),
            }
        }
    };

    let orchestrator = PaymentOrchestrator::new(
        PaymentDetailsClient::new(endpoint),
        route,
        buffer,
        Arc::new(ConsoleUi),
    );
    let sig_down = SigDown::try_new()?;
    let cancel = sig_down.cancellation_token();
    let mut states = orchestrator.subscribe_state();

    let settle = async {
        let mut iframe_shown = false;
        loop {
            {
                let state = states.borrow_and_update();
                if state.is_terminal() {
                    break;
                }
                if *state == PaymentState::AwaitingIframePayment {
                    iframe_shown = true;
                } else if iframe_shown && *state == PaymentState::Idle {
                    tracing::info!("Hosted checkout closed without payment");
                    break;
                }
            }
            if states.changed().await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = orchestrator.run(cancel) => {}
        _ = settle => {}
    }
    orchestrator.shutdown();
    sig_down.shutdown().await;

    match orchestrator.state() {
        PaymentState::Error(_) => Err("checkout failed".into()),
        state => {
            tracing::info!(%state, "Checkout finished");
            Ok(())
        }
    }
}
