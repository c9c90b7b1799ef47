use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use companyinfo_core::{
    AppMessage, CompanyMetadata, InboundEvent, NamedItem, RecognizedEntity, ServiceError,
};
use companyinfo_entities::{EntityRecognizer, MetadataSource, RecognitionRequest};
use companyinfo_watson::MessageSender;

use crate::dispatcher::Dispatcher;

pub(crate) fn acme() -> CompanyMetadata {
    CompanyMetadata {
        name: "The Acme company".to_string(),
        languages: vec![],
        industries: vec![NamedItem::new("Test industry")],
        sectors: vec![NamedItem::new("Test sector")],
        segments: vec![NamedItem::new("Test segment")],
    }
}

pub(crate) fn message_event(content: &str) -> InboundEvent {
    InboundEvent {
        event_type: Some("message-created".to_string()),
        user_id: Some("testuser".to_string()),
        user_name: Some("Jane".to_string()),
        space_id: Some("testspace".to_string()),
        message_id: Some("testmsg".to_string()),
        time: Some(1_760_000_000_000),
        content: Some(content.to_string()),
        challenge: None,
    }
}

pub(crate) struct FakeRecognizer {
    reply: Result<Vec<RecognizedEntity>, ServiceError>,
    calls: AtomicUsize,
}

impl FakeRecognizer {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityRecognizer for FakeRecognizer {
    async fn recognize(
        &self,
        _request: &RecognitionRequest,
    ) -> Result<Vec<RecognizedEntity>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

#[derive(Default)]
pub(crate) struct FakeMetadata {
    replies: HashMap<String, Result<Option<CompanyMetadata>, ServiceError>>,
    looked_up: Mutex<Vec<String>>,
}

impl FakeMetadata {
    pub(crate) fn with(
        mut self,
        entity_id: &str,
        reply: Result<Option<CompanyMetadata>, ServiceError>,
    ) -> Self {
        self.replies.insert(entity_id.to_string(), reply);
        self
    }

    pub(crate) fn looked_up(&self) -> Vec<String> {
        self.looked_up.lock().expect("lookup lock").clone()
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn metadata(&self, entity_id: &str) -> Result<Option<CompanyMetadata>, ServiceError> {
        self.looked_up.lock().expect("lookup lock").push(entity_id.to_string());
        self.replies
            .get(entity_id)
            .cloned()
            .unwrap_or(Err(ServiceError::Status { service: "entity-metadata", status: 404 }))
    }
}

#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
    fail_next: AtomicBool,
}

impl RecordingSender {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub(crate) fn fail_first(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, space_id: &str, message: &AppMessage) -> Result<(), ServiceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::Status { service: "space-messages", status: 403 });
        }
        let text = message.text().unwrap_or_default().to_string();
        self.sent.lock().expect("sent lock").push((space_id.to_string(), text));
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) recognizer: Arc<FakeRecognizer>,
    pub(crate) metadata: Arc<FakeMetadata>,
    pub(crate) sender: Arc<RecordingSender>,
}

impl Harness {
    /// Every recognized entity resolves to the Acme fixture.
    pub(crate) fn new(entities: Vec<RecognizedEntity>) -> Self {
        let metadata = entities
            .iter()
            .fold(FakeMetadata::default(), |fake, entity| fake.with(&entity.id, Ok(Some(acme()))));
        Self::with_metadata(entities, metadata)
    }

    pub(crate) fn with_metadata(entities: Vec<RecognizedEntity>, metadata: FakeMetadata) -> Self {
        Self::build(Ok(entities), metadata)
    }

    pub(crate) fn failing_recognition(error: ServiceError) -> Self {
        Self::build(Err(error), FakeMetadata::default())
    }

    fn build(
        reply: Result<Vec<RecognizedEntity>, ServiceError>,
        metadata: FakeMetadata,
    ) -> Self {
        let recognizer = Arc::new(FakeRecognizer { reply, calls: AtomicUsize::new(0) });
        let metadata = Arc::new(metadata);
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Arc::new(Dispatcher::new(
            "testappid",
            recognizer.clone(),
            metadata.clone(),
            sender.clone(),
        ));
        Self { dispatcher, recognizer, metadata, sender }
    }
}
