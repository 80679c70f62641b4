//! worksheet-engine - Command Line Entry Point
//!
//! Talks to the worksheet API configured through the environment (see
//! `config.rs`) on behalf of the user described by the `ACTOR_*` variables.

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worksheet_engine::approvers::preselect;
use worksheet_engine::remote::{HttpTaskRemote, TransitionRequest};
use worksheet_engine::{ActionDispatcher, Actor, Config, TaskId, UserId, WorksheetId};

#[derive(Parser, Debug)]
#[command(name = "worksheet-engine", version, about = "Task approval worksheets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// A task within a worksheet.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
struct TaskTarget {
    worksheet: WorksheetId,
    task: TaskId,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows completion of one or more worksheets.
    Progress {
        #[arg(required = true)]
        worksheets: Vec<WorksheetId>,
    },

    /// Lists who a task can be submitted to.
    Approvers(TaskTarget),

    /// Lists the actions the acting user may take on a task.
    Actions(TaskTarget),

    /// Lists tasks submitted to the acting user.
    Review,

    /// Submits a task. Without an approver, the only eligible one is used.
    Submit {
        #[command(flatten)]
        target: TaskTarget,
        approver: Option<UserId>,
    },

    /// Withdraws a pending submission.
    Unsubmit(TaskTarget),

    /// Signs off a task.
    Accept(TaskTarget),

    /// Rejects a submission or revokes an approval.
    Reject(TaskTarget),

    /// Resets a rejected task.
    Clear(TaskTarget),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worksheet_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    info!(api_url = %config.api_url, "Loaded configuration");

    let remote = HttpTaskRemote::from_config(&config)?;
    let dispatcher = ActionDispatcher::new(remote, config.policy);

    let (target, request) = match cli.command {
        Command::Progress { worksheets } => {
            for ws in dispatcher.refresh_all(&worksheets).await? {
                let progress = ws.progress();
                println!("{} ({}): {}%", ws.name, ws.id, progress.completion_percentage());
                println!("{}", serde_json::to_string_pretty(&progress)?);
            }
            return Ok(());
        }
        Command::Approvers(target) => {
            dispatcher.refresh(target.worksheet).await?;
            for candidate in dispatcher
                .list_approvers(target.worksheet, target.task)
                .await?
            {
                println!("{}\t{}", candidate.id, candidate.display_name);
            }
            return Ok(());
        }
        Command::Actions(target) => {
            let actor = require_actor(&config)?;
            dispatcher.refresh(target.worksheet).await?;
            for action in dispatcher.permitted_actions(actor, target.worksheet, target.task)? {
                println!("{}", action);
            }
            return Ok(());
        }
        Command::Review => {
            let actor = require_actor(&config)?;
            for item in dispatcher.review_queue(actor).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    item.worksheet_id, item.task.id, item.worksheet_name, item.task.name
                );
            }
            return Ok(());
        }
        Command::Submit { target, approver } => {
            dispatcher.refresh(target.worksheet).await?;
            let approver = match approver {
                Some(approver) => approver,
                None => {
                    let candidates = dispatcher
                        .list_approvers(target.worksheet, target.task)
                        .await?;
                    preselect(&candidates).cloned().ok_or_else(|| {
                        anyhow!(
                            "{} eligible approvers, pass one explicitly",
                            candidates.len()
                        )
                    })?
                }
            };
            (target, TransitionRequest::Submit { approver })
        }
        Command::Unsubmit(target) => (target, TransitionRequest::Unsubmit),
        Command::Accept(target) => (target, TransitionRequest::Accept),
        Command::Reject(target) => (target, TransitionRequest::Reject),
        Command::Clear(target) => (target, TransitionRequest::Clear),
    };

    let actor = require_actor(&config)?;
    if dispatcher.worksheet(target.worksheet).is_none() {
        dispatcher.refresh(target.worksheet).await?;
    }
    let outcome = dispatcher
        .dispatch(actor, target.worksheet, target.task, request)
        .await?;
    println!(
        "{}: {} (approver: {}), worksheet {}% complete",
        outcome.task.name,
        outcome.task.status,
        outcome
            .task
            .approver
            .as_ref()
            .map(UserId::as_str)
            .unwrap_or("-"),
        outcome.progress.completion_percentage()
    );

    Ok(())
}

fn require_actor(config: &Config) -> anyhow::Result<&Actor> {
    config
        .actor
        .as_ref()
        .context("ACTOR_ID must be set for this command")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    const WS: &str = "7f0c9a4e-8a53-4f7a-9d57-7a0c1d7b6f11";
    const TASK: &str = "0b6c3f2e-1d4a-4c8e-9f3b-2a7d5e6c8b90";

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_with_and_without_approver() {
        let cli = Cli::try_parse_from(["worksheet-engine", "submit", WS, TASK, "leader"]).unwrap();
        match cli.command {
            Command::Submit { target, approver } => {
                assert_eq!(target.worksheet, WS.parse().unwrap());
                assert_eq!(target.task, TASK.parse().unwrap());
                assert_eq!(approver, Some(UserId::new("leader")));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["worksheet-engine", "submit", WS, TASK]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Submit { approver: None, .. }
        ));
    }

    #[test]
    fn test_missing_task_is_usage_error() {
        let err = Cli::try_parse_from(["worksheet-engine", "submit", WS]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["worksheet-engine", "progress"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_invalid_ids_and_help() {
        let err = Cli::try_parse_from(["worksheet-engine", "accept", "nope", TASK]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let err = Cli::try_parse_from(["worksheet-engine", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_progress_takes_many_worksheets() {
        let other = "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f";
        let cli = Cli::try_parse_from(["worksheet-engine", "progress", WS, other]).unwrap();
        match cli.command {
            Command::Progress { worksheets } => assert_eq!(worksheets.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
