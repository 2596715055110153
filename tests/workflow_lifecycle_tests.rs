//! End-to-end workflow lifecycle through the public coordinator API
//!
//! Drives a project from intake to completion, checking the policy table,
//! precondition enforcement, effects and the timeline along the way.

use project_workflow::workflow::{
    label_of, list_stages, side_stages, Action, Actor, DocumentKind, Effect, Enforcement,
    EnforcementPolicy, Milestone, Notice, Precondition, ProjectId, Role, RoleActionPolicy, Stage,
    TransitionKind, TransitionValidator, UserId, WorkflowCommand, WorkflowCoordinator,
    WorkflowError,
};

mod fixtures;

use fixtures::*;

fn actor(user: &str, role: Role) -> Actor {
    Actor::new(user, role)
}

fn active_milestone(timeline: &[Milestone]) -> Option<Stage> {
    timeline.iter().find(|m| m.active).map(|m| m.stage)
}

#[test]
fn test_registry_and_labels() {
    let ids: Vec<&str> = list_stages().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "initial",
            "planning_assessment",
            "planning_application",
            "party_wall",
            "contractor_selection",
            "construction",
            "completion",
        ]
    );
    assert_eq!(side_stages().len(), 2);
    assert_eq!(label_of("party_wall").unwrap(), "Party Wall");
    assert_eq!(label_of("on_hold").unwrap(), "On Hold");

    let err = label_of("demolition").unwrap_err();
    assert_eq!(err.stage, "demolition");
}

#[test]
fn test_request_to_completion() {
    let coordinator = coordinator();
    let request = loft_request();
    let mut state = request.to_project_state(ProjectId::from("life-1"), march_14());
    assert_eq!(state.title.as_deref(), Some("Loft Conversion at 12 Acacia Avenue"));

    let owner = actor(OWNER, Role::Homeowner);
    let run = |state: &_, actor: &Actor, command: WorkflowCommand| {
        coordinator
            .apply(state, actor, &command)
            .unwrap_or_else(|e| panic!("{} failed: {e}", command.name()))
    };

    // Planning assessment needs an assessor on the team
    let blocked = coordinator
        .apply(
            &state,
            &owner,
            &WorkflowCommand::RequestTransition {
                target: Stage::PlanningAssessment,
                force: false,
            },
        )
        .unwrap_err();
    assert_eq!(
        blocked.unmet_preconditions(),
        &[Precondition::AssessorRequired][..]
    );

    state = run(
        &state,
        &owner,
        WorkflowCommand::InviteProfessional {
            user_id: UserId::from(ARCHITECT),
            role: Role::Architect,
        },
    )
    .state;
    state = run(&state, &actor(ARCHITECT, Role::Architect), WorkflowCommand::AcceptInvitation).state;

    for target in [Stage::PlanningAssessment, Stage::PlanningApplication] {
        state = run(
            &state,
            &owner,
            WorkflowCommand::RequestTransition {
                target,
                force: false,
            },
        )
        .state;
    }

    state = run(
        &state,
        &owner,
        WorkflowCommand::AssignMembership {
            user_id: UserId::from(SURVEYOR),
            role: Role::Surveyor,
        },
    )
    .state;
    let outcome = run(
        &state,
        &owner,
        WorkflowCommand::RequestTransition {
            target: Stage::PartyWall,
            force: false,
        },
    );
    assert!(outcome.effects.iter().any(|e| matches!(
        e,
        Effect::RequireDocumentUpload(upload)
            if upload.document == DocumentKind::PartyWallNotice
                && upload.requested_from == Role::Surveyor
    )));
    state = outcome.state;

    state = run(
        &state,
        &owner,
        WorkflowCommand::InviteProfessional {
            user_id: UserId::from(CONTRACTOR),
            role: Role::Contractor,
        },
    )
    .state;
    state = run(&state, &actor(CONTRACTOR, Role::Contractor), WorkflowCommand::AcceptInvitation).state;
    state = run(
        &state,
        &owner,
        WorkflowCommand::RequestTransition {
            target: Stage::ContractorSelection,
            force: false,
        },
    )
    .state;

    let contractor = actor(CONTRACTOR, Role::Contractor);
    assert!(coordinator
        .available_actions(&state, Role::Contractor)
        .iter()
        .any(|a| a.action == Action::SubmitBid && a.primary));

    state = run(&state, &contractor, WorkflowCommand::SubmitBid { amount_pence: 6_500_000 }).state;
    let bid_id = state.bids[0].bid_id.clone();
    state = run(&state, &owner, WorkflowCommand::AcceptBid { bid_id }).state;

    let outcome = run(
        &state,
        &owner,
        WorkflowCommand::RequestTransition {
            target: Stage::Construction,
            force: false,
        },
    );
    assert!(outcome.warnings.is_empty());
    // Accepted bid is not open, so nothing to close
    assert!(!outcome
        .effects
        .iter()
        .any(|e| matches!(e, Effect::CloseOpenBids(_))));
    state = outcome.state;

    state = run(
        &state,
        &contractor,
        WorkflowCommand::RequestTransition {
            target: Stage::Completion,
            force: false,
        },
    )
    .state;

    assert_eq!(state.current_stage, Stage::Completion);
    assert_eq!(state.history.len(), 6);
    assert!(state
        .history
        .iter()
        .all(|record| record.kind == TransitionKind::Advance));
    assert!(state.timeline().iter().take(6).all(|m| m.completed));
    assert_eq!(active_milestone(&state.timeline()), Some(Stage::Completion));

    // Completion is terminal
    let err = coordinator
        .apply(
            &state,
            &owner,
            &WorkflowCommand::RequestTransition {
                target: Stage::Cancelled,
                force: true,
            },
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidEdge { .. }));
}

#[test]
fn test_hold_keeps_timeline_anchor_and_resume_rechecks() {
    let coordinator = coordinator();
    let owner = actor(OWNER, Role::Homeowner);
    let mut state = staffed_project("life-2", Stage::ContractorSelection);

    let held = coordinator
        .request_transition(&state, Stage::OnHold, Role::Homeowner, false)
        .unwrap();
    assert_eq!(held.transition, Some(TransitionKind::Suspend));
    state = held.state;
    assert_eq!(
        active_milestone(&state.timeline()),
        Some(Stage::ContractorSelection)
    );

    let err = coordinator
        .apply(
            &state,
            &owner,
            &WorkflowCommand::RequestTransition {
                target: Stage::Construction,
                force: false,
            },
        )
        .unwrap_err();
    assert_eq!(
        err,
        WorkflowError::PreconditionUnmet {
            from: Stage::OnHold,
            to: Stage::Construction,
            unmet: vec![Precondition::AcceptedBidRequired],
        }
    );

    let resumed = coordinator
        .request_transition(&state, Stage::ContractorSelection, Role::Homeowner, false)
        .unwrap();
    assert_eq!(resumed.transition, Some(TransitionKind::Resume));
}

#[test]
fn test_cancel_closes_open_bids_and_notifies_bidders() {
    let coordinator = coordinator();
    let state = staffed_project("life-3", Stage::ContractorSelection);
    let state = coordinator
        .submit_bid(&state, &UserId::from(CONTRACTOR), Role::Contractor, 4_200_000)
        .unwrap()
        .state;

    let outcome = coordinator
        .request_transition(&state, Stage::Cancelled, Role::Homeowner, false)
        .unwrap();
    assert_eq!(outcome.transition, Some(TransitionKind::Cancel));

    let closed = outcome
        .effects
        .iter()
        .find_map(|e| match e {
            Effect::CloseOpenBids(closed) => Some(closed),
            _ => None,
        })
        .expect("open bid closed");
    assert_eq!(closed.bidders, vec![UserId::from(CONTRACTOR)]);
    assert_eq!(outcome.state.open_bids().count(), 0);

    let notify = match &outcome.effects[0] {
        Effect::NotifyParticipants(notify) => notify,
        other => panic!("expected notification first, got {}", other.name()),
    };
    assert!(matches!(
        notify.notice,
        Notice::StageChanged {
            to: Stage::Cancelled,
            ..
        }
    ));
}

#[test]
fn test_configured_coordinator_allows_skipping_and_strict_reopen() {
    let coordinator = WorkflowCoordinator::new(
        RoleActionPolicy::default(),
        TransitionValidator::new(true),
        EnforcementPolicy::default()
            .with(Precondition::DownstreamApprovalsInvalidated, Enforcement::Mandatory)
            .with(Precondition::AcceptedBidRequired, Enforcement::Advisory),
    );
    let state = staffed_project("life-4", Stage::Initial);

    // Skipping forward collects every entered stage's preconditions
    let outcome = coordinator
        .request_transition(&state, Stage::Construction, Role::Homeowner, false)
        .unwrap();
    assert_eq!(outcome.transition, Some(TransitionKind::Advance));
    assert_eq!(outcome.warnings, vec![Precondition::AcceptedBidRequired]);

    let err = coordinator
        .request_transition(&outcome.state, Stage::PlanningApplication, Role::Homeowner, false)
        .unwrap_err();
    assert_eq!(
        err.unmet_preconditions(),
        &[Precondition::DownstreamApprovalsInvalidated][..]
    );

    let forced = coordinator
        .request_transition(&outcome.state, Stage::PlanningApplication, Role::Homeowner, true)
        .unwrap();
    assert_eq!(forced.transition, Some(TransitionKind::Reopen));
    assert!(forced.state.history.last().unwrap().forced);
}
