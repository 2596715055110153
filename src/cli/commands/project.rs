use anyhow::Result;
use serde::Serialize;

use super::{print_json, with_service, Command};
use project_workflow::config::WorkflowConfig;
use project_workflow::intake::{
    quick_start, AdditionalInfo, BudgetRange, NewProjectRequest, ProjectType, PropertyDetails,
    PropertyType, Timeline,
};
use project_workflow::workflow::{Milestone, ProjectId, ProjectState, Stage, UserId, WorkflowCommand};

pub struct CreateCommand {
    pub config: WorkflowConfig,
    pub owner: String,
    pub project_type: ProjectType,
    pub description: Option<String>,
    pub address: String,
    pub address2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub country: Option<String>,
    pub property_type: PropertyType,
    pub budget: Option<BudgetRange>,
    pub timeline: Option<Timeline>,
    pub title: Option<String>,
}

#[derive(Serialize)]
struct Created {
    request: NewProjectRequest,
    state: ProjectState,
}

impl Command for CreateCommand {
    async fn execute(&self) -> Result<()> {
        let mut property = PropertyDetails::new(&self.address, &self.city, &self.postcode);
        property.address_line2 = self.address2.clone();
        property.property_type = self.property_type;
        if let Some(country) = &self.country {
            property.country = country.clone();
        }

        let request = quick_start(
            self.owner.as_str(),
            self.project_type,
            self.description.clone(),
            property,
            AdditionalInfo {
                budget_range: self.budget,
                timeline: self.timeline,
                title: self.title.clone(),
            },
        )?;

        with_service(&self.config, |service| async move {
            let state = service.create_project(&request).await?;
            print_json(&Created { request, state })
        })
        .await
    }
}

pub struct ShowCommand {
    pub config: WorkflowConfig,
    pub project_id: String,
}

#[derive(Serialize)]
struct Shown {
    stage_label: &'static str,
    timeline: Vec<Milestone>,
    state: ProjectState,
}

impl Command for ShowCommand {
    async fn execute(&self) -> Result<()> {
        let project_id = ProjectId::from(self.project_id.as_str());
        with_service(&self.config, |service| async move {
            let state = service.load(&project_id).await?;
            print_json(&Shown {
                stage_label: state.current_stage.label(),
                timeline: state.timeline(),
                state,
            })
        })
        .await
    }
}

pub struct TransitionCommand {
    pub config: WorkflowConfig,
    pub project_id: String,
    pub to: Stage,
    pub user: String,
    pub force: bool,
}

impl Command for TransitionCommand {
    async fn execute(&self) -> Result<()> {
        let project_id = ProjectId::from(self.project_id.as_str());
        let user = UserId::from(self.user.as_str());
        let command = WorkflowCommand::RequestTransition {
            target: self.to,
            force: self.force,
        };
        with_service(&self.config, |service| async move {
            let report = service.execute(&project_id, &user, &command).await?;
            print_json(&report)
        })
        .await
    }
}

pub struct BidCommand {
    pub config: WorkflowConfig,
    pub project_id: String,
    pub user: String,
    pub amount_pence: u64,
}

impl Command for BidCommand {
    async fn execute(&self) -> Result<()> {
        let project_id = ProjectId::from(self.project_id.as_str());
        let user = UserId::from(self.user.as_str());
        let command = WorkflowCommand::SubmitBid {
            amount_pence: self.amount_pence,
        };
        with_service(&self.config, |service| async move {
            print_json(&service.execute(&project_id, &user, &command).await?)
        })
        .await
    }
}

pub struct AcceptBidCommand {
    pub config: WorkflowConfig,
    pub project_id: String,
    pub bid: String,
    pub user: String,
}

impl Command for AcceptBidCommand {
    async fn execute(&self) -> Result<()> {
        let project_id = ProjectId::from(self.project_id.as_str());
        let user = UserId::from(self.user.as_str());
        let command = WorkflowCommand::AcceptBid {
            bid_id: self.bid.clone(),
        };
        with_service(&self.config, |service| async move {
            print_json(&service.execute(&project_id, &user, &command).await?)
        })
        .await
    }
}
