use std::sync::Arc;

use companyinfo_core::{
    compose_company_message, AppMessage, EventKind, InboundEvent, RecognizedEntity, ServiceError,
};
use companyinfo_entities::{EntityRecognizer, MetadataSource, RecognitionRequest};
use companyinfo_watson::MessageSender;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    UnsupportedType,
    OwnMessage,
    EmptyContent,
    MissingSpace,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedType => "unsupported_type",
            Self::OwnMessage => "own_message",
            Self::EmptyContent => "empty_content",
            Self::MissingSpace => "missing_space",
        }
    }
}

/// What a verified webhook event leads to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Challenge,
    Ignored(IgnoreReason),
    Process,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchOutcome {
    Sent,
    NoInfo,
    LookupFailed(ServiceError),
    SendFailed(ServiceError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    pub recognized: usize,
    pub relevant: usize,
    pub sent: usize,
    pub no_info: usize,
    pub failed: usize,
    pub recognition_error: Option<ServiceError>,
}

impl ProcessingReport {
    fn record(&mut self, outcome: &BranchOutcome) {
        match outcome {
            BranchOutcome::Sent => self.sent += 1,
            BranchOutcome::NoInfo => self.no_info += 1,
            BranchOutcome::LookupFailed(_) | BranchOutcome::SendFailed(_) => self.failed += 1,
        }
    }
}

/// Runs recognize → lookup → send for qualifying messages.
pub struct Dispatcher {
    app_id: String,
    recognizer: Arc<dyn EntityRecognizer>,
    metadata: Arc<dyn MetadataSource>,
    sender: Arc<dyn MessageSender>,
}

impl Dispatcher {
    pub fn new(
        app_id: impl Into<String>,
        recognizer: Arc<dyn EntityRecognizer>,
        metadata: Arc<dyn MetadataSource>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self { app_id: app_id.into(), recognizer, metadata, sender }
    }

    pub fn classify(&self, event: &InboundEvent) -> Disposition {
        match event.kind() {
            EventKind::Verification => return Disposition::Challenge,
            EventKind::MessageCreated => {}
            EventKind::Other(_) => return Disposition::Ignored(IgnoreReason::UnsupportedType),
        }

        if event.is_authored_by(&self.app_id) {
            return Disposition::Ignored(IgnoreReason::OwnMessage);
        }
        if event.text().is_none() {
            return Disposition::Ignored(IgnoreReason::EmptyContent);
        }
        if event.space_id.as_deref().map_or(true, str::is_empty) {
            return Disposition::Ignored(IgnoreReason::MissingSpace);
        }
        Disposition::Process
    }

    /// Detaches processing of `event` from the caller. Failures are only logged.
    pub fn spawn(
        self: &Arc<Self>,
        event: InboundEvent,
        correlation_id: String,
    ) -> JoinHandle<ProcessingReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.process(&event, &correlation_id).await })
    }

    pub async fn process(&self, event: &InboundEvent, correlation_id: &str) -> ProcessingReport {
        let mut report = ProcessingReport::default();
        let (Some(request), Some(space_id)) =
            (RecognitionRequest::from_event(event), event.space_id.clone())
        else {
            return report;
        };

        let entities = match self.recognizer.recognize(&request).await {
            Ok(entities) => entities,
            Err(error) => {
                warn!(
                    event_name = "entities.recognition.failed",
                    correlation_id,
                    space_id = %space_id,
                    error = %error,
                    "could not extract entities from message"
                );
                report.recognition_error = Some(error);
                return report;
            }
        };
        report.recognized = entities.len();
        debug!(
            event_name = "entities.recognition.completed",
            correlation_id,
            entities = ?entities,
            "recognized company entities"
        );

        let mut branches = JoinSet::new();
        for entity in entities.into_iter().filter(RecognizedEntity::is_relevant) {
            report.relevant += 1;
            let metadata = Arc::clone(&self.metadata);
            let sender = Arc::clone(&self.sender);
            let space_id = space_id.clone();
            let correlation_id = correlation_id.to_string();
            branches.spawn(async move {
                describe_entity(metadata, sender, entity, &space_id, &correlation_id).await
            });
        }

        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok(outcome) => report.record(&outcome),
                Err(join_error) => {
                    error!(
                        event_name = "webhook.branch.aborted",
                        correlation_id,
                        error = %join_error,
                        "entity branch terminated unexpectedly"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            event_name = "webhook.processing.completed",
            correlation_id,
            space_id = %space_id,
            recognized = report.recognized,
            relevant = report.relevant,
            sent = report.sent,
            failed = report.failed,
            "finished processing message"
        );
        report
    }
}

async fn describe_entity(
    metadata: Arc<dyn MetadataSource>,
    sender: Arc<dyn MessageSender>,
    entity: RecognizedEntity,
    space_id: &str,
    correlation_id: &str,
) -> BranchOutcome {
    let info = match metadata.metadata(&entity.id).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            debug!(
                event_name = "entities.metadata.empty",
                correlation_id,
                entity_id = %entity.id,
                "no company information for entity"
            );
            return BranchOutcome::NoInfo;
        }
        Err(error) => {
            warn!(
                event_name = "entities.metadata.failed",
                correlation_id,
                entity_id = %entity.id,
                error = %error,
                "could not retrieve entity information"
            );
            return BranchOutcome::LookupFailed(error);
        }
    };

    let message = AppMessage::generic(compose_company_message(&info));
    match sender.send(space_id, &message).await {
        Ok(()) => {
            info!(
                event_name = "watson.messages.company_posted",
                correlation_id,
                entity_id = %entity.id,
                space_id,
                "posted company information"
            );
            BranchOutcome::Sent
        }
        Err(error) => {
            error!(
                event_name = "watson.messages.send_failed",
                correlation_id,
                entity_id = %entity.id,
                space_id,
                error = %error,
                "error sending company information"
            );
            BranchOutcome::SendFailed(error)
        }
    }
}
