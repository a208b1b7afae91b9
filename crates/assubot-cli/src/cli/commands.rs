use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use assubot_core::models::{ListContractsArgs, User};
use assubot_core::services::ContractScope;
use assubot_core::{CoreEvent, CoreRuntime};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use super::config::CliConfig;
use super::output::{event_json, print_json};

/// A resolved subcommand
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Login { email: String, password: Option<String> },
    Logout,
    Whoami,
    ListContracts { scope: ContractScope, args: ListContractsArgs },
    ShowContract { scope: ContractScope, id: String },
    Stats,
    Summarize { scope: ContractScope, id: String, wait: Option<Duration> },
    Watch,
}

pub async fn run_command(command: CliCommand, config: CliConfig, pretty: bool) -> Result<()> {
    let runtime = CoreRuntime::new(config.core.clone())?;
    let result = execute(&runtime, &config, command, pretty).await;
    runtime.shutdown();
    result
}

async fn execute(rt: &CoreRuntime, config: &CliConfig, command: CliCommand, pretty: bool) -> Result<()> {
    match command {
        CliCommand::Login { email, password } => {
            let password = password
                .or_else(|| {
                    config
                        .credentials
                        .as_ref()
                        .filter(|c| c.email == email)
                        .and_then(|c| c.resolve_password())
                })
                .ok_or_else(|| anyhow!("No password given (use --password or ASSUBOT_PASSWORD)"))?;
            let user = rt.auth().login(&email, &password).await?;
            print_json(&user, pretty)
        }
        CliCommand::Logout => {
            rt.auth().logout();
            print_json(&json!({"loggedOut": true}), pretty)
        }
        CliCommand::Whoami => {
            let user = ensure_session(rt, config).await?;
            print_json(&user, pretty)
        }
        CliCommand::ListContracts { scope, args } => {
            ensure_session(rt, config).await?;
            let page = rt.contracts().list_contracts(scope, &args).await?;
            print_json(&page, pretty)
        }
        CliCommand::ShowContract { scope, id } => {
            ensure_session(rt, config).await?;
            let contract = rt.contracts().get_contract(scope, &id).await?;
            print_json(&contract, pretty)
        }
        CliCommand::Stats => {
            ensure_session(rt, config).await?;
            let stats = rt.contracts().dashboard_stats().await?;
            print_json(&stats, pretty)
        }
        CliCommand::Summarize { scope, id, wait } => {
            ensure_session(rt, config).await?;
            // Subscribe first so a fast completion is not missed
            let mut events = rt.subscribe_events();
            rt.contracts().start_summarize(scope, &id).await?;

            let Some(timeout) = wait else {
                return print_json(&json!({"contractId": id, "status": "ongoing"}), pretty);
            };
            let _observed = rt.contracts().observe_contract(scope, &id);

            let outcome = tokio::time::timeout(timeout, async {
                loop {
                    match events.recv().await {
                        Ok(CoreEvent::ContractProcessed(notice)) if notice.contract_id == id => {
                            return Ok(notice);
                        }
                        Ok(_) | Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => bail!("Event stream closed"),
                    }
                }
            })
            .await
            .with_context(|| format!("No result for contract {} after {:?}", id, timeout))??;

            // The completion invalidated the cached copy; this refetches it
            let contract = rt.contracts().get_contract(scope, &id).await?;
            print_json(&json!({"result": outcome, "contract": contract}), pretty)
        }
        CliCommand::Watch => {
            ensure_session(rt, config).await?;
            let mut events = rt.subscribe_events();
            let mut sweep = tokio::time::interval(config.core.cache_sweep_interval());
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => print_json(&event_json(&event), false)?,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "watch output lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = sweep.tick() => {
                        let evicted = rt.evict_unused();
                        if evicted > 0 {
                            tracing::debug!(evicted, "evicted unused cache entries");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            Ok(())
        }
    }
}

/// Resume the stored session, or log in with configured credentials
async fn ensure_session(rt: &CoreRuntime, config: &CliConfig) -> Result<User> {
    if let Some(user) = rt.auth().restore_session().await? {
        return Ok(user);
    }

    let Some(credentials) = &config.credentials else {
        bail!("Not logged in. Run `assubot-cli login <email>` first");
    };
    let password = credentials
        .resolve_password()
        .ok_or_else(|| anyhow!("Credentials in config have no password"))?;
    Ok(rt.auth().login(&credentials.email, &password).await?)
}
