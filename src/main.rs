use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::catalog::{ActionsCommand, StagesCommand};
use cli::commands::project::{
    AcceptBidCommand, BidCommand, CreateCommand, ShowCommand, TransitionCommand,
};
use cli::commands::team::{TeamChange, TeamCommand};
use cli::commands::Command;
use cli::{Cli, Commands};
use project_workflow::config::WorkflowConfig;
use project_workflow::telemetry::init_telemetry;

fn load_config(cli: &Cli) -> Result<WorkflowConfig> {
    WorkflowConfig::load_env_file()?;
    match &cli.config {
        Some(path) => WorkflowConfig::load_from(path),
        None => WorkflowConfig::load(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_telemetry(
        config.observability.json_logs,
        &config.observability.log_level,
    )?;

    tokio::runtime::Runtime::new()?.block_on(async move {
        match cli.command {
            Commands::Stages => StagesCommand.execute().await,
            Commands::Actions { stage, role } => ActionsCommand { stage, role }.execute().await,
            Commands::Create {
                owner,
                project_type,
                description,
                address,
                address2,
                city,
                postcode,
                country,
                property_type,
                budget,
                timeline,
                title,
            } => {
                CreateCommand {
                    config,
                    owner,
                    project_type,
                    description,
                    address,
                    address2,
                    city,
                    postcode,
                    country,
                    property_type,
                    budget,
                    timeline,
                    title,
                }
                .execute()
                .await
            }
            Commands::Show { project_id } => ShowCommand { config, project_id }.execute().await,
            Commands::Transition {
                project_id,
                to,
                user,
                force,
            } => {
                TransitionCommand {
                    config,
                    project_id,
                    to,
                    user,
                    force,
                }
                .execute()
                .await
            }
            Commands::Assign {
                project_id,
                user,
                role,
                actor,
            } => {
                TeamCommand {
                    config,
                    project_id,
                    actor,
                    change: TeamChange::Assign { user, role },
                }
                .execute()
                .await
            }
            Commands::Invite {
                project_id,
                user,
                role,
                actor,
            } => {
                TeamCommand {
                    config,
                    project_id,
                    actor,
                    change: TeamChange::Invite { user, role },
                }
                .execute()
                .await
            }
            Commands::Accept { project_id, user } => {
                TeamCommand {
                    config,
                    project_id,
                    actor: user,
                    change: TeamChange::Accept,
                }
                .execute()
                .await
            }
            Commands::Remove {
                project_id,
                user,
                actor,
            } => {
                TeamCommand {
                    config,
                    project_id,
                    actor,
                    change: TeamChange::Remove { user },
                }
                .execute()
                .await
            }
            Commands::Bid {
                project_id,
                user,
                amount_pence,
            } => {
                BidCommand {
                    config,
                    project_id,
                    user,
                    amount_pence,
                }
                .execute()
                .await
            }
            Commands::AcceptBid {
                project_id,
                bid,
                user,
            } => {
                AcceptBidCommand {
                    config,
                    project_id,
                    bid,
                    user,
                }
                .execute()
                .await
            }
        }
    })
}
