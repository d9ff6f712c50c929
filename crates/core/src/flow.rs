//! Client-side upload and review flow.
//!
//! `NoSelection → PartSelected → ImageStaged → Submitting → {Results | SubmissionFailed}`, with
//! [`UploadFlow::reset`] returning to `NoSelection` from anywhere. Only one submission may be in
//! flight at a time.

use crate::body_part::BodyPart;
use crate::constants::MAX_IMAGE_BYTES;
use crate::dispatch::HistoryDispatcher;
use crate::finding::AnalysisResult;
use crate::orchestrator::{AnalysisRequest, Analyzer};
use crate::store::AnalysisHistoryRecord;
use crate::user_id::UserId;
use crate::{AnalysisError, AnalysisOutcome};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vdd_types::NonEmptyText;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FlowError {
    #[error("Select a body part first")]
    NoBodyPartSelected,
    #[error("Upload an image first")]
    NoImageStaged,
    #[error("Please upload an image smaller than 5MB ({size} bytes > {limit} bytes)")]
    ImageTooLarge { size: usize, limit: usize },
    #[error("The selected file is empty")]
    EmptyImage,
    #[error("An analysis is already in progress")]
    SubmissionInFlight,
    #[error("No analysis is in progress")]
    NotSubmitting,
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    NoSelection,
    PartSelected,
    ImageStaged,
    Submitting,
    Results,
    SubmissionFailed,
}

/// What the user is told after a failed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionNotice {
    /// The image was rejected as not showing the selected part; carries the server message.
    WrongBodyPart(String),
    TryAgain,
}

impl SubmissionNotice {
    fn from_error(error: &AnalysisError) -> Self {
        match error {
            AnalysisError::ImageRejected { .. } => Self::WrongBodyPart(error.to_string()),
            _ => Self::TryAgain,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::WrongBodyPart(_) => "Invalid image",
            Self::TryAgain => "Analysis Failed",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::WrongBodyPart(message) => message,
            Self::TryAgain => "Please try again or use a different image",
        }
    }
}

/// State for one user's upload session.
pub struct UploadFlow {
    state: FlowState,
    part: Option<BodyPart>,
    image: Option<NonEmptyText>,
    result: Option<AnalysisResult>,
    notice: Option<SubmissionNotice>,
    history: Option<(UserId, HistoryDispatcher)>,
    pending_history: Option<JoinHandle<()>>,
}

impl Default for UploadFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadFlow {
    /// A flow for an anonymous user; results are not recorded.
    pub fn new() -> Self {
        Self {
            state: FlowState::NoSelection,
            part: None,
            image: None,
            result: None,
            notice: None,
            history: None,
            pending_history: None,
        }
    }

    /// A flow for a signed-in user whose successful results are recorded in the background.
    pub fn signed_in(user: UserId, dispatcher: HistoryDispatcher) -> Self {
        Self {
            history: Some((user, dispatcher)),
            ..Self::new()
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn body_part(&self) -> Option<BodyPart> {
        self.part
    }

    pub fn staged_image(&self) -> Option<&NonEmptyText> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn notice(&self) -> Option<&SubmissionNotice> {
        self.notice.as_ref()
    }

    /// Choosing a different part discards any staged image.
    pub fn select_part(&mut self, part: BodyPart) -> FlowResult<()> {
        self.ensure_idle()?;
        if self.part != Some(part) {
            self.image = None;
        }
        self.part = Some(part);
        self.result = None;
        self.notice = None;
        self.state = if self.image.is_some() {
            FlowState::ImageStaged
        } else {
            FlowState::PartSelected
        };
        Ok(())
    }

    /// Stage raw image bytes as a `data:<mime>;base64,...` URI.
    ///
    /// # Errors
    /// Oversized or empty files are refused here and never reach the network.
    pub fn stage_image(&mut self, bytes: &[u8], mime: &str) -> FlowResult<()> {
        self.ensure_idle()?;
        if self.part.is_none() {
            return Err(FlowError::NoBodyPartSelected);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            warn!(size = bytes.len(), "image exceeds upload limit");
            return Err(FlowError::ImageTooLarge {
                size: bytes.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }
        if bytes.is_empty() {
            return Err(FlowError::EmptyImage);
        }

        let uri = format!("data:{};base64,{}", mime.trim(), STANDARD.encode(bytes));
        self.image = NonEmptyText::new(uri).ok();
        self.result = None;
        self.notice = None;
        self.state = FlowState::ImageStaged;
        debug!(size = bytes.len(), mime, "image staged");
        Ok(())
    }

    /// Enter `Submitting` and hand out the request to send.
    pub fn begin_submit(&mut self) -> FlowResult<AnalysisRequest> {
        self.ensure_idle()?;
        let part = self.part.ok_or(FlowError::NoBodyPartSelected)?;
        let image = self.image.clone().ok_or(FlowError::NoImageStaged)?;

        self.result = None;
        self.notice = None;
        self.state = FlowState::Submitting;
        Ok(AnalysisRequest::new(image, part))
    }

    /// Leave `Submitting` with the analysis outcome.
    ///
    /// On success for a signed-in user a history write is dispatched and not awaited. A failure
    /// keeps the staged image so the user can retry.
    pub fn finish(&mut self, outcome: AnalysisOutcome<AnalysisResult>) -> FlowResult<FlowState> {
        if self.state != FlowState::Submitting {
            return Err(FlowError::NotSubmitting);
        }

        match outcome {
            Ok(result) => {
                info!(deficiencies = result.deficiencies.len(), "analysis complete");
                self.record_history(&result);
                self.result = Some(result);
                self.state = FlowState::Results;
            }
            Err(e) => {
                warn!(error = %e, "analysis failed");
                self.notice = Some(SubmissionNotice::from_error(&e));
                self.state = FlowState::SubmissionFailed;
            }
        }
        Ok(self.state)
    }

    /// Submit the staged image through `analyzer` and settle the flow.
    pub async fn submit(&mut self, analyzer: &dyn Analyzer) -> FlowResult<FlowState> {
        let request = self.begin_submit()?;
        let outcome = analyzer.analyze(request).await;
        self.finish(outcome)
    }

    /// Back to `NoSelection`. A pending history write keeps running.
    pub fn reset(&mut self) {
        self.state = FlowState::NoSelection;
        self.part = None;
        self.image = None;
        self.result = None;
        self.notice = None;
    }

    /// Handle of the most recent history write, if one was dispatched.
    pub fn take_pending_history(&mut self) -> Option<JoinHandle<()>> {
        self.pending_history.take()
    }

    fn ensure_idle(&self) -> FlowResult<()> {
        if self.state == FlowState::Submitting {
            return Err(FlowError::SubmissionInFlight);
        }
        Ok(())
    }

    fn record_history(&mut self, result: &AnalysisResult) {
        let (Some((user, dispatcher)), Some(part), Some(image)) =
            (&self.history, self.part, &self.image)
        else {
            return;
        };
        let record = AnalysisHistoryRecord::new(*user, part, image, result.clone());
        self.pending_history = Some(dispatcher.dispatch(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreResult;
    use crate::StoreError;
    use crate::store::{MedicalHistory, MedicalHistoryFields, ProfileStore, UserProfile};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAnalyzer {
        calls: AtomicUsize,
        outcome: fn() -> AnalysisOutcome<AnalysisResult>,
    }

    impl CountingAnalyzer {
        fn new(outcome: fn() -> AnalysisOutcome<AnalysisResult>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Analyzer for CountingAnalyzer {
        async fn analyze(&self, _request: AnalysisRequest) -> AnalysisOutcome<AnalysisResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn clear_nails() -> AnalysisOutcome<AnalysisResult> {
        Ok(AnalysisResult {
            deficiencies: vec![],
            overall_health: BodyPart::Nails.no_deficiency_message().to_string(),
        })
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    impl ProfileStore for BrokenStore {
        fn profile(&self, _: &UserId) -> StoreResult<UserProfile> {
            Err(StoreError::InvalidInput("broken".into()))
        }
        fn update_profile(&self, _: &UserId, _: String, _: String) -> StoreResult<UserProfile> {
            Err(StoreError::InvalidInput("broken".into()))
        }
        fn medical_history(&self, _: &UserId) -> StoreResult<MedicalHistory> {
            Err(StoreError::InvalidInput("broken".into()))
        }
        fn upsert_medical_history(
            &self,
            _: &UserId,
            _: MedicalHistoryFields,
        ) -> StoreResult<MedicalHistory> {
            Err(StoreError::InvalidInput("broken".into()))
        }
        fn append_analysis(&self, _: &AnalysisHistoryRecord) -> StoreResult<()> {
            Err(StoreError::InvalidInput("broken".into()))
        }
        fn list_analyses(&self, _: &UserId) -> StoreResult<Vec<AnalysisHistoryRecord>> {
            Err(StoreError::InvalidInput("broken".into()))
        }
    }

    fn staged(part: BodyPart) -> UploadFlow {
        let mut flow = UploadFlow::new();
        flow.select_part(part).unwrap();
        flow.stage_image(&[0xff, 0xd8, 0xff], "image/jpeg").unwrap();
        flow
    }

    #[test]
    fn staging_encodes_a_data_uri() {
        let flow = staged(BodyPart::Nails);
        assert_eq!(flow.state(), FlowState::ImageStaged);
        assert_eq!(
            flow.staged_image().unwrap().as_str(),
            "data:image/jpeg;base64,/9j/"
        );
    }

    #[test]
    fn image_requires_a_selected_part() {
        let mut flow = UploadFlow::new();
        assert_eq!(
            flow.stage_image(b"abc", "image/png"),
            Err(FlowError::NoBodyPartSelected)
        );
    }

    #[test]
    fn switching_part_discards_staged_image() {
        let mut flow = staged(BodyPart::Nails);
        flow.select_part(BodyPart::Nails).unwrap();
        assert_eq!(flow.state(), FlowState::ImageStaged);

        flow.select_part(BodyPart::Eyes).unwrap();
        assert_eq!(flow.state(), FlowState::PartSelected);
        assert!(flow.staged_image().is_none());
    }

    #[tokio::test]
    async fn oversized_image_never_reaches_the_analyzer() {
        let analyzer = CountingAnalyzer::new(clear_nails);
        let mut flow = UploadFlow::new();
        flow.select_part(BodyPart::Skin).unwrap();

        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = flow.stage_image(&big, "image/png").unwrap_err();
        assert!(matches!(err, FlowError::ImageTooLarge { .. }));

        assert_eq!(flow.submit(&analyzer).await, Err(FlowError::NoImageStaged));
        assert_eq!(analyzer.calls(), 0);
    }

    #[test]
    fn image_at_the_limit_is_accepted() {
        let mut flow = UploadFlow::new();
        flow.select_part(BodyPart::Skin).unwrap();
        flow.stage_image(&vec![1u8; MAX_IMAGE_BYTES], "image/png")
            .unwrap();
        assert_eq!(flow.state(), FlowState::ImageStaged);
    }

    #[test]
    fn second_submit_is_refused_while_in_flight() {
        let mut flow = staged(BodyPart::Tongue);
        flow.begin_submit().unwrap();
        assert_eq!(flow.begin_submit(), Err(FlowError::SubmissionInFlight));
        assert_eq!(flow.select_part(BodyPart::Eyes), Err(FlowError::SubmissionInFlight));

        flow.finish(Err(AnalysisError::RateLimited)).unwrap();
        assert!(flow.begin_submit().is_ok());
    }

    #[test]
    fn rejection_asks_for_a_reupload() {
        let mut flow = staged(BodyPart::Eyes);
        flow.begin_submit().unwrap();
        let state = flow
            .finish(Err(AnalysisError::ImageRejected {
                body_part: BodyPart::Eyes,
            }))
            .unwrap();

        assert_eq!(state, FlowState::SubmissionFailed);
        let notice = flow.notice().unwrap();
        assert!(matches!(notice, SubmissionNotice::WrongBodyPart(_)));
        assert!(notice.description().contains("valid eyes image"));
        assert!(flow.staged_image().is_some());
    }

    #[test]
    fn other_failures_ask_to_try_again() {
        let mut flow = staged(BodyPart::Eyes);
        flow.begin_submit().unwrap();
        flow.finish(Err(AnalysisError::Gateway { status: 500 }))
            .unwrap();
        assert_eq!(flow.notice(), Some(&SubmissionNotice::TryAgain));
        assert_eq!(
            flow.notice().unwrap().description(),
            "Please try again or use a different image"
        );
    }

    #[test]
    fn finish_outside_submission_is_an_error() {
        let mut flow = staged(BodyPart::Eyes);
        assert_eq!(flow.finish(clear_nails()), Err(FlowError::NotSubmitting));
    }

    #[test]
    fn reset_returns_to_no_selection() {
        let mut flow = staged(BodyPart::Skin);
        flow.reset();
        assert_eq!(flow.state(), FlowState::NoSelection);
        assert!(flow.body_part().is_none());
        assert!(flow.staged_image().is_none());
    }

    #[tokio::test]
    async fn anonymous_success_records_nothing() {
        let analyzer = CountingAnalyzer::new(clear_nails);
        let mut flow = staged(BodyPart::Nails);

        assert_eq!(flow.submit(&analyzer).await, Ok(FlowState::Results));
        assert!(flow.result().unwrap().is_clear());
        assert!(flow.take_pending_history().is_none());
    }

    #[tokio::test]
    async fn failing_history_write_does_not_affect_results() {
        let analyzer = CountingAnalyzer::new(clear_nails);
        let dispatcher = HistoryDispatcher::new(Arc::new(BrokenStore));
        let mut flow = UploadFlow::signed_in(UserId::new(), dispatcher);
        flow.select_part(BodyPart::Nails).unwrap();
        flow.stage_image(b"png", "image/png").unwrap();

        let state = flow.submit(&analyzer).await.unwrap();
        assert_eq!(state, FlowState::Results);

        let handle = flow.take_pending_history().expect("history write dispatched");
        handle.await.unwrap();
        assert_eq!(flow.state(), FlowState::Results);
    }

    #[tokio::test]
    async fn signed_in_success_is_recorded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = Arc::new(crate::store::FileProfileStore::new(tmp.path()));
        let user = UserId::new();
        let analyzer = CountingAnalyzer::new(clear_nails);

        let mut flow = UploadFlow::signed_in(user, HistoryDispatcher::new(store.clone()));
        flow.select_part(BodyPart::Nails).unwrap();
        flow.stage_image(b"png", "image/png").unwrap();
        flow.submit(&analyzer).await.unwrap();
        flow.take_pending_history().unwrap().await.unwrap();

        let history = store.list_analyses(&user).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body_part, BodyPart::Nails);
    }
}
