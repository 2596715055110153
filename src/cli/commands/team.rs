use anyhow::Result;

use super::{print_json, with_service, Command};
use project_workflow::config::WorkflowConfig;
use project_workflow::workflow::{ProjectId, Role, UserId, WorkflowCommand};

/// Membership changes: assign, invite, accept and remove
pub enum TeamChange {
    Assign { user: String, role: Role },
    Invite { user: String, role: Role },
    Accept,
    Remove { user: String },
}

pub struct TeamCommand {
    pub config: WorkflowConfig,
    pub project_id: String,
    /// Who issues the change; the invitee for `Accept`
    pub actor: String,
    pub change: TeamChange,
}

impl TeamCommand {
    fn workflow_command(&self) -> WorkflowCommand {
        match &self.change {
            TeamChange::Assign { user, role } => WorkflowCommand::AssignMembership {
                user_id: UserId::from(user.as_str()),
                role: *role,
            },
            TeamChange::Invite { user, role } => WorkflowCommand::InviteProfessional {
                user_id: UserId::from(user.as_str()),
                role: *role,
            },
            TeamChange::Accept => WorkflowCommand::AcceptInvitation,
            TeamChange::Remove { user } => WorkflowCommand::RemoveMembership {
                user_id: UserId::from(user.as_str()),
            },
        }
    }
}

impl Command for TeamCommand {
    async fn execute(&self) -> Result<()> {
        let project_id = ProjectId::from(self.project_id.as_str());
        let actor = UserId::from(self.actor.as_str());
        let command = self.workflow_command();
        with_service(&self.config, |service| async move {
            print_json(&service.execute(&project_id, &actor, &command).await?)
        })
        .await
    }
}
