use anyhow::Result;
use serde::Serialize;

use super::{print_json, Command};
use project_workflow::workflow::{
    list_stages, side_stages, ActionDescriptor, Role, RoleActionPolicy, StageInfo,
};

pub struct StagesCommand;

#[derive(Serialize)]
struct StageListing {
    main: &'static [StageInfo],
    side: &'static [StageInfo],
}

impl Command for StagesCommand {
    async fn execute(&self) -> Result<()> {
        print_json(&StageListing {
            main: list_stages(),
            side: side_stages(),
        })
    }
}

pub struct ActionsCommand {
    pub stage: String,
    pub role: Role,
}

#[derive(Serialize)]
struct ActionListing<'a> {
    stage: &'a str,
    role: Role,
    actions: Vec<ActionDescriptor>,
}

impl Command for ActionsCommand {
    async fn execute(&self) -> Result<()> {
        let actions = RoleActionPolicy::default().ordered_actions_for_key(&self.stage, self.role);
        print_json(&ActionListing {
            stage: &self.stage,
            role: self.role,
            actions,
        })
    }
}
