use async_trait::async_trait;
use parking_lot::Mutex;
use publishing_core::models::Platform;
use publishing_core::orchestration::PublishingError;
use publishing_core::uploaders::{PlatformUploader, UploadContext, UploadResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One scripted reaction to an upload call
#[derive(Debug, Clone)]
pub enum Scripted {
    Publish(String),
    Fail(PublishingError),
    Panic(&'static str),
}

/// What the uploader saw on one call
#[derive(Debug, Clone, PartialEq)]
pub struct SeenUpload {
    pub title: String,
    pub description: Option<String>,
    pub attempts: u32,
}

/// Uploader that replays a script, then falls back to a fixed reaction.
///
/// Without any script it publishes every call with a generated post id.
#[derive(Debug)]
pub struct ScriptedUploader {
    platform: Platform,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<Scripted>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenUpload>>,
}

impl ScriptedUploader {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reaction: Scripted) -> &Self {
        self.script.lock().push_back(reaction);
        self
    }

    pub fn fail_times(&self, times: usize, error: PublishingError) -> &Self {
        for _ in 0..times {
            self.push(Scripted::Fail(error.clone()));
        }
        self
    }

    /// Reaction once the script is exhausted
    pub fn always(&self, reaction: Scripted) -> &Self {
        *self.fallback.lock() = Some(reaction);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenUpload> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PlatformUploader for ScriptedUploader {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn upload(&self, context: &UploadContext) -> Result<UploadResult, PublishingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().push(SeenUpload {
            title: context.title().to_string(),
            description: context.description().map(str::to_string),
            attempts: context.task.attempts,
        });

        let reaction = self
            .script
            .lock()
            .pop_front()
            .or_else(|| self.fallback.lock().clone());

        match reaction {
            Some(Scripted::Publish(post_id)) => Ok(UploadResult::new(post_id)),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Panic(message)) => panic!("{message}"),
            None => Ok(UploadResult::new(format!("{}-post-{call}", self.platform))),
        }
    }
}

/// Platform API error carrying an HTTP status
pub fn http_error(platform: Platform, status: u16) -> PublishingError {
    PublishingError::platform_api(platform, Some(status), format!("HTTP {status}"))
}
