// Runs coordinator effects against the configured collaborators.
// Delivery failures are logged and reported, never raised.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::traits::{DeliveryError, DocumentStore, Notifier, PendingUploadRequest};
use crate::workflow::{Effect, Notice, NotifyParticipants};

/// One effect that could not be delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub effect: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub pending_uploads: Vec<PendingUploadRequest>,
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, effect: &Effect, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                error!(effect = effect.name(), error = %e, "Effect delivery failed");
                self.failures.push(DeliveryFailure {
                    effect: effect.name(),
                    error: e.to_string(),
                });
            }
        }
    }
}

#[derive(Clone)]
pub struct EffectExecutor {
    notifier: Arc<dyn Notifier>,
    documents: Arc<dyn DocumentStore>,
}

impl EffectExecutor {
    pub fn new(notifier: Arc<dyn Notifier>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            notifier,
            documents,
        }
    }

    /// Run `effects` in order
    pub async fn dispatch(&self, effects: &[Effect]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for effect in effects {
            debug!(effect = effect.name(), "Dispatching effect");
            match effect {
                Effect::NotifyParticipants(notify) => {
                    let result = self.notifier.notify(notify).await;
                    report.record(effect, result);
                }
                Effect::RequireDocumentUpload(upload) => {
                    match self.documents.require_upload(upload).await {
                        Ok(pending) => {
                            report.pending_uploads.push(pending);
                            report.record(effect, Ok(()));
                        }
                        Err(e) => report.record(effect, Err(e)),
                    }
                }
                Effect::CloseOpenBids(closed) => {
                    let notify = NotifyParticipants {
                        project_id: closed.project_id.clone(),
                        recipients: closed.bidders.clone(),
                        notice: Notice::BidsClosed {
                            bid_ids: closed.bid_ids.clone(),
                        },
                    };
                    let result = self.notifier.notify(&notify).await;
                    report.record(effect, result);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::memory::{PendingUploadQueue, RecordingNotifier};
    use crate::collaborators::traits::{MockDocumentStore, MockNotifier};
    use crate::workflow::{
        CloseOpenBids, DocumentKind, ProjectId, RequireDocumentUpload, Role, Stage,
        TransitionKind, UserId,
    };

    fn project_id() -> ProjectId {
        ProjectId::from("exec-1")
    }

    fn stage_changed() -> Effect {
        Effect::NotifyParticipants(NotifyParticipants {
            project_id: project_id(),
            recipients: vec![UserId::from("owner")],
            notice: Notice::StageChanged {
                from: Stage::ContractorSelection,
                to: Stage::Construction,
                kind: TransitionKind::Advance,
            },
        })
    }

    fn upload() -> Effect {
        Effect::RequireDocumentUpload(RequireDocumentUpload {
            project_id: project_id(),
            stage: Stage::Construction,
            document: DocumentKind::BuildingContract,
            requested_from: Role::Contractor,
        })
    }

    #[tokio::test]
    async fn test_dispatch_runs_every_effect() {
        let notifier = Arc::new(RecordingNotifier::new());
        let documents = Arc::new(PendingUploadQueue::new());
        let executor = EffectExecutor::new(notifier.clone(), documents.clone());

        let effects = vec![
            stage_changed(),
            upload(),
            Effect::CloseOpenBids(CloseOpenBids {
                project_id: project_id(),
                bid_ids: vec!["bid-1".to_string()],
                bidders: vec![UserId::from("builder-b")],
            }),
        ];

        let report = executor.dispatch(&effects).await;
        assert!(report.is_clean());
        assert_eq!(report.delivered, 3);
        assert_eq!(report.pending_uploads.len(), 1);

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].recipients, vec![UserId::from("builder-b")]);
        assert!(matches!(sent[1].notice, Notice::BidsClosed { .. }));
        assert_eq!(documents.pending().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_stop_later_effects() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_| {
            Err(DeliveryError::Unavailable {
                reason: "smtp down".to_string(),
            })
        });

        let mut documents = MockDocumentStore::new();
        documents.expect_require_upload().times(1).returning(|effect| {
            Ok(PendingUploadRequest {
                upload_id: "upload-1".to_string(),
                request: effect.clone(),
                requested_at: chrono::Utc::now(),
            })
        });

        let executor = EffectExecutor::new(Arc::new(notifier), Arc::new(documents));
        let report = executor.dispatch(&[stage_changed(), upload()]).await;

        assert!(!report.is_clean());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures[0].effect, "notify_participants");
        assert!(report.failures[0].error.contains("smtp down"));
        assert_eq!(report.pending_uploads[0].upload_id, "upload-1");
    }
}
