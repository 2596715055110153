use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use statig::prelude::*;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use super::catalog::{BudgetRange, ProjectType, PropertyType, Timeline};
use crate::workflow::{ProjectId, ProjectState, UserId};

pub const DEFAULT_COUNTRY: &str = "United Kingdom";

static UK_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)([A-Z]{1,2}[0-9][A-Z0-9]?)\s*([0-9][A-Z]{2})$")
        .expect("postcode pattern is valid")
});

/// Normalise a UK postcode to upper case with a single space, or `None`
/// when it is not shaped like one
pub fn normalize_postcode(raw: &str) -> Option<String> {
    let captures = UK_POSTCODE.captures(raw.trim())?;
    Some(format!(
        "{} {}",
        captures[1].to_ascii_uppercase(),
        captures[2].to_ascii_uppercase()
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    ProjectType,
    PropertyDetails,
    AdditionalInfo,
    Submitted,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::ProjectType => "project_type",
            WizardStep::PropertyDetails => "property_details",
            WizardStep::AdditionalInfo => "additional_info",
            WizardStep::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("{postcode} is not a valid UK postcode")]
    InvalidPostcode { postcode: String },

    #[error("{event} is not accepted at step {step}")]
    UnexpectedEvent { step: WizardStep, event: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub postcode: String,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

impl PropertyDetails {
    pub fn new(
        address_line1: impl Into<String>,
        city: impl Into<String>,
        postcode: impl Into<String>,
    ) -> Self {
        Self {
            address_line1: address_line1.into(),
            address_line2: None,
            city: city.into(),
            postcode: postcode.into(),
            property_type: PropertyType::default(),
            country: default_country(),
        }
    }

    /// Trimmed copy. UK postcodes are checked and normalised; other
    /// countries' postal codes are kept as entered.
    fn validated(&self) -> Result<PropertyDetails, IntakeError> {
        let address_line1 = required("address_line1", &self.address_line1)?;
        let city = required("city", &self.city)?;
        let country = match self.country.trim() {
            "" => default_country(),
            country => country.to_string(),
        };
        let postcode = required("postcode", &self.postcode)?;
        let postcode = if is_united_kingdom(&country) {
            normalize_postcode(&postcode).ok_or(IntakeError::InvalidPostcode { postcode })?
        } else {
            postcode
        };

        Ok(PropertyDetails {
            address_line1,
            address_line2: self
                .address_line2
                .as_deref()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
            city,
            postcode,
            property_type: self.property_type,
            country,
        })
    }
}

fn is_united_kingdom(country: &str) -> bool {
    ["united kingdom", "uk", "gb", "great britain"]
        .iter()
        .any(|name| country.eq_ignore_ascii_case(name))
}

fn required(field: &'static str, value: &str) -> Result<String, IntakeError> {
    match value.trim() {
        "" => Err(IntakeError::MissingField { field }),
        trimmed => Ok(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    pub budget_range: Option<BudgetRange>,
    pub timeline: Option<Timeline>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    ChooseProjectType {
        project_type: Option<ProjectType>,
        description: Option<String>,
    },
    EnterProperty(PropertyDetails),
    Submit(AdditionalInfo),
    Back,
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            WizardEvent::ChooseProjectType { .. } => "choose_project_type",
            WizardEvent::EnterProperty(_) => "enter_property",
            WizardEvent::Submit(_) => "submit",
            WizardEvent::Back => "back",
        }
    }
}

/// Everything needed to open a new project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProjectRequest {
    pub owner: UserId,
    pub title: String,
    pub project_type: ProjectType,
    pub description: Option<String>,
    pub property: PropertyDetails,
    #[serde(default)]
    pub budget_range: Option<BudgetRange>,
    #[serde(default)]
    pub timeline: Option<Timeline>,
}

impl NewProjectRequest {
    /// First snapshot of the project: stage `initial`, owner as active homeowner
    pub fn to_project_state(&self, project_id: ProjectId, created_at: DateTime<Utc>) -> ProjectState {
        let mut state = ProjectState::new(project_id, self.owner.clone(), created_at);
        state.title = Some(self.title.clone());
        state
    }
}

/// Three-step quick start: project type, property details, then budget,
/// timeline and title.
#[derive(Debug)]
pub struct QuickProjectWizard {
    owner: UserId,
    step: WizardStep,
    project_type: Option<ProjectType>,
    description: Option<String>,
    property: Option<PropertyDetails>,
    request: Option<NewProjectRequest>,
    rejection: Option<IntakeError>,
}

impl QuickProjectWizard {
    pub fn new(owner: impl Into<UserId>) -> Self {
        Self {
            owner: owner.into(),
            step: WizardStep::ProjectType,
            project_type: None,
            description: None,
            property: None,
            request: None,
            rejection: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn chosen_project_type(&self) -> Option<ProjectType> {
        self.project_type
    }

    pub fn chosen_property(&self) -> Option<&PropertyDetails> {
        self.property.as_ref()
    }

    /// Why the last event was refused, if it was
    pub fn rejection(&self) -> Option<&IntakeError> {
        self.rejection.as_ref()
    }

    pub fn request(&self) -> Option<&NewProjectRequest> {
        self.request.as_ref()
    }

    fn reject(&mut self, error: IntakeError) {
        tracing::debug!(step = %self.step, error = %error, "Intake event rejected");
        self.rejection = Some(error);
    }

    fn unexpected(&mut self, event: &WizardEvent) {
        self.reject(IntakeError::UnexpectedEvent {
            step: self.step,
            event: event.name(),
        });
    }

    fn build_request(&self, info: &AdditionalInfo) -> Result<NewProjectRequest, IntakeError> {
        let project_type = self.project_type.ok_or(IntakeError::MissingField {
            field: "project_type",
        })?;
        let property = self.property.clone().ok_or(IntakeError::MissingField {
            field: "property",
        })?;
        let title = info
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} at {}", project_type.label(), property.address_line1));

        Ok(NewProjectRequest {
            owner: self.owner.clone(),
            title,
            project_type,
            description: self.description.clone(),
            property,
            budget_range: info.budget_range,
            timeline: info.timeline,
        })
    }
}

#[state_machine(initial = "State::project_type()")]
impl QuickProjectWizard {
    #[state]
    fn project_type(&mut self, event: &WizardEvent) -> Outcome<State> {
        self.rejection = None;
        match event {
            WizardEvent::ChooseProjectType {
                project_type: Some(project_type),
                description,
            } => {
                self.project_type = Some(*project_type);
                self.description = description
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string);
                self.step = WizardStep::PropertyDetails;
                Transition(State::property_details())
            }
            WizardEvent::ChooseProjectType { project_type: None, .. } => {
                self.reject(IntakeError::MissingField {
                    field: "project_type",
                });
                Handled
            }
            _ => {
                self.unexpected(event);
                Handled
            }
        }
    }

    #[state]
    fn property_details(&mut self, event: &WizardEvent) -> Outcome<State> {
        self.rejection = None;
        match event {
            WizardEvent::EnterProperty(details) => match details.validated() {
                Ok(property) => {
                    self.property = Some(property);
                    self.step = WizardStep::AdditionalInfo;
                    Transition(State::additional_info())
                }
                Err(e) => {
                    self.reject(e);
                    Handled
                }
            },
            WizardEvent::Back => {
                self.step = WizardStep::ProjectType;
                Transition(State::project_type())
            }
            _ => {
                self.unexpected(event);
                Handled
            }
        }
    }

    #[state]
    fn additional_info(&mut self, event: &WizardEvent) -> Outcome<State> {
        self.rejection = None;
        match event {
            WizardEvent::Submit(info) => match self.build_request(info) {
                Ok(request) => {
                    tracing::info!(
                        owner = %request.owner,
                        project_type = %request.project_type,
                        title = %request.title,
                        "Quick project intake submitted"
                    );
                    self.request = Some(request);
                    self.step = WizardStep::Submitted;
                    Transition(State::submitted())
                }
                Err(e) => {
                    self.reject(e);
                    Handled
                }
            },
            WizardEvent::Back => {
                self.step = WizardStep::PropertyDetails;
                Transition(State::property_details())
            }
            _ => {
                self.unexpected(event);
                Handled
            }
        }
    }

    #[state]
    fn submitted(&mut self, event: &WizardEvent) -> Outcome<State> {
        self.rejection = None;
        self.unexpected(event);
        Handled
    }
}

/// Drives a [`QuickProjectWizard`] and reports refusals as errors
pub struct IntakeSession {
    machine: StateMachine<QuickProjectWizard>,
}

impl IntakeSession {
    pub fn new(owner: impl Into<UserId>) -> Self {
        Self {
            machine: QuickProjectWizard::new(owner).state_machine(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.machine.inner().step()
    }

    pub fn wizard(&self) -> &QuickProjectWizard {
        self.machine.inner()
    }

    /// Feed one event, returning the step the wizard is now on
    pub fn handle(&mut self, event: WizardEvent) -> Result<WizardStep, IntakeError> {
        self.machine.handle(&event);
        match self.machine.inner().rejection() {
            Some(error) => Err(error.clone()),
            None => Ok(self.step()),
        }
    }

    /// The request produced on submission
    pub fn request(&self) -> Option<&NewProjectRequest> {
        self.machine.inner().request()
    }
}

/// Run all three steps in one go
pub fn quick_start(
    owner: impl Into<UserId>,
    project_type: ProjectType,
    description: Option<String>,
    property: PropertyDetails,
    info: AdditionalInfo,
) -> Result<NewProjectRequest, IntakeError> {
    let mut session = IntakeSession::new(owner);
    session.handle(WizardEvent::ChooseProjectType {
        project_type: Some(project_type),
        description,
    })?;
    session.handle(WizardEvent::EnterProperty(property))?;
    session.handle(WizardEvent::Submit(info))?;
    session.request().cloned().ok_or(IntakeError::UnexpectedEvent {
        step: session.step(),
        event: "submit",
    })
}
