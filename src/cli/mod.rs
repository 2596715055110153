use clap::{Parser, Subcommand};
use std::path::PathBuf;

use project_workflow::intake::{BudgetRange, ProjectType, PropertyType, Timeline};
use project_workflow::workflow::{Role, Stage};

pub mod commands;

#[derive(Parser)]
#[command(name = "project-workflow")]
#[command(about = "Stage workflow for home-improvement projects")]
#[command(long_about = "Moves projects through planning assessment, planning application, party wall, \
                       contractor selection, construction and completion. Every command prints JSON.")]
pub struct Cli {
    /// Configuration file to use instead of project-workflow.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the main stage sequence and the side stages
    Stages,
    /// Show the actions a role gets at a stage
    Actions {
        #[arg(long, help = "Stage id, e.g. contractor_selection")]
        stage: String,
        #[arg(long, help = "homeowner, architect, surveyor, contractor, consultant or admin")]
        role: Role,
    },
    /// Open a new project through the quick intake
    Create {
        #[arg(long, help = "User id of the homeowner opening the project")]
        owner: String,
        #[arg(long = "type", help = "Project type, e.g. loft_conversion")]
        project_type: ProjectType,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, help = "First line of the property address")]
        address: String,
        #[arg(long)]
        address2: Option<String>,
        #[arg(long)]
        city: String,
        #[arg(long, help = "Postcode; checked as a UK postcode unless --country says otherwise")]
        postcode: String,
        #[arg(long, help = "Defaults to United Kingdom")]
        country: Option<String>,
        #[arg(long, default_value = "residential")]
        property_type: PropertyType,
        #[arg(long, help = "Budget range, e.g. 25k_50k")]
        budget: Option<BudgetRange>,
        #[arg(long, help = "Expected timeline, e.g. 3_6_months")]
        timeline: Option<Timeline>,
        #[arg(long, help = "Defaults to '<project type> at <address>'")]
        title: Option<String>,
    },
    /// Print a project's snapshot and timeline
    Show {
        project_id: String,
    },
    /// Move a project to another stage
    Transition {
        project_id: String,
        #[arg(long)]
        to: Stage,
        #[arg(long, help = "User id requesting the change")]
        user: String,
        #[arg(long, help = "Proceed despite unmet preconditions")]
        force: bool,
    },
    /// Give a user an active role on a project
    Assign {
        project_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: Role,
        #[arg(long, help = "Homeowner or admin making the change")]
        actor: String,
    },
    /// Invite a professional to a project
    Invite {
        project_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: Role,
        #[arg(long, help = "Homeowner or admin sending the invitation")]
        actor: String,
    },
    /// Accept your pending invitation
    Accept {
        project_id: String,
        #[arg(long)]
        user: String,
    },
    /// Remove a user from a project
    Remove {
        project_id: String,
        #[arg(long)]
        user: String,
        #[arg(long, help = "Homeowner or admin making the change")]
        actor: String,
    },
    /// Submit a contractor bid
    Bid {
        project_id: String,
        #[arg(long, help = "Contractor user id")]
        user: String,
        #[arg(long)]
        amount_pence: u64,
    },
    /// Accept a submitted bid
    AcceptBid {
        project_id: String,
        #[arg(long)]
        bid: String,
        #[arg(long, help = "Homeowner accepting the bid")]
        user: String,
    },
}
