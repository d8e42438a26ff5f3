use std::fmt;

use serde::Deserialize;

use crate::wizard::order::{
    BackgroundColor, Costume, Customer, EditChoices, OrderChange, OrderConfig, OrderError,
    PlacedOrder,
};
use crate::wizard::upload::{PhotoPayload, UploadedImage};

pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze photo. Please try again.";
pub const ENHANCEMENT_FAILED_MESSAGE: &str = "Failed to enhance photo. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Upload = 1,
    Analyze = 2,
    Customize = 3,
    Confirm = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Upload, Step::Analyze, Step::Customize, Step::Confirm];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Upload => "Upload",
            Step::Analyze => "Analyze",
            Step::Customize => "Customize",
            Step::Confirm => "Confirm",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl AnalysisResult {
    pub const FALLBACK_ISSUE: &'static str = "The photo does not meet passport photo requirements.";

    /// Keeps `issues` empty exactly when the photo is valid.
    pub fn normalized(mut self) -> Self {
        self.issues = self
            .issues
            .into_iter()
            .map(|issue| issue.trim().to_string())
            .filter(|issue| !issue.is_empty())
            .collect();
        if self.is_valid {
            self.issues.clear();
        } else if self.issues.is_empty() {
            self.issues.push(Self::FALLBACK_ISSUE.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enhancement {
    Background(BackgroundColor),
    Costume(Costume),
}

impl Enhancement {
    pub fn label(self) -> String {
        match self {
            Enhancement::Background(color) => format!("{} background", color.label()),
            Enhancement::Costume(costume) => costume.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Analysis,
    Enhancement(Enhancement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub upload: UploadedImage,
    pub analysis: Option<AnalysisResult>,
    /// Set when `analysis` describes the photo before the latest edit.
    pub analysis_stale: bool,
    pub enhanced: Option<PhotoPayload>,
    pub edits: EditChoices,
    pub pending: Option<PendingRequest>,
    pub error: Option<String>,
}

impl Review {
    fn new(upload: UploadedImage) -> Self {
        Self {
            upload,
            analysis: None,
            analysis_stale: false,
            enhanced: None,
            edits: EditChoices::default(),
            pending: None,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// The image edits and analysis operate on: the latest edit, else the upload.
    pub fn current_photo(&self) -> &PhotoPayload {
        self.enhanced.as_ref().unwrap_or(&self.upload.payload)
    }

    /// True when the current photo has no verdict of its own yet and no
    /// request or error is outstanding.
    pub fn needs_analysis(&self) -> bool {
        (self.analysis.is_none() || self.analysis_stale)
            && self.pending.is_none()
            && self.error.is_none()
    }

    /// A verdict for an earlier version of the photo is enough to order.
    pub fn can_proceed(&self) -> bool {
        self.analysis.is_some() && self.pending.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub upload: UploadedImage,
    pub analysis: AnalysisResult,
    pub enhanced: Option<PhotoPayload>,
    pub config: OrderConfig,
}

impl Ordering {
    pub fn final_photo(&self) -> &PhotoPayload {
        self.enhanced.as_ref().unwrap_or(&self.upload.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub order: PlacedOrder,
    pub photo: PhotoPayload,
    pub processing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WizardState {
    #[default]
    Uploading,
    Reviewing(Review),
    Ordering(Ordering),
    Confirmed(Confirmation),
}

impl WizardState {
    pub fn step(&self) -> Step {
        match self {
            WizardState::Uploading => Step::Upload,
            WizardState::Reviewing(_) => Step::Analyze,
            WizardState::Ordering(_) => Step::Customize,
            WizardState::Confirmed(_) => Step::Confirm,
        }
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        match self {
            WizardState::Reviewing(review) => review.is_loading(),
            WizardState::Confirmed(confirmation) => confirmation.processing,
            WizardState::Uploading | WizardState::Ordering(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    FileSelected(UploadedImage),
    AnalysisRequested,
    AnalysisSucceeded {
        request: RequestId,
        result: AnalysisResult,
    },
    AnalysisFailed {
        request: RequestId,
    },
    EnhancementRequested(Enhancement),
    EnhancementSucceeded {
        request: RequestId,
        image: PhotoPayload,
    },
    EnhancementFailed {
        request: RequestId,
    },
    Proceed,
    OrderChanged(OrderChange),
    SubmitOrder(Customer),
    OrderProcessed,
    Reset,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::FileSelected(_) => "file_selected",
            Intent::AnalysisRequested => "analysis_requested",
            Intent::AnalysisSucceeded { .. } => "analysis_succeeded",
            Intent::AnalysisFailed { .. } => "analysis_failed",
            Intent::EnhancementRequested(_) => "enhancement_requested",
            Intent::EnhancementSucceeded { .. } => "enhancement_succeeded",
            Intent::EnhancementFailed { .. } => "enhancement_failed",
            Intent::Proceed => "proceed",
            Intent::OrderChanged(_) => "order_changed",
            Intent::SubmitOrder(_) => "submit_order",
            Intent::OrderProcessed => "order_processed",
            Intent::Reset => "reset",
        }
    }
}

/// Work the caller has to perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Analyze {
        request: RequestId,
        photo: PhotoPayload,
    },
    Enhance {
        request: RequestId,
        enhancement: Enhancement,
        photo: PhotoPayload,
    },
    PlaceOrder {
        order: PlacedOrder,
        photo: PhotoPayload,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("{intent} is not available at {step}")]
    NotAvailable { intent: &'static str, step: Step },
    #[error("response for request {0} was superseded")]
    Superseded(RequestId),
    #[error("the photo has to be analyzed before ordering")]
    AnalysisRequired,
    #[error("an AI request is still running")]
    RequestInFlight,
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// One chat's wizard. The request counter lives outside [`WizardState`] so that a
/// reset cannot re-issue an id an in-flight response still carries.
#[derive(Debug, Clone, Default)]
pub struct Wizard {
    state: WizardState,
    issued_requests: u64,
}

impl Wizard {
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    fn next_request(&mut self) -> RequestId {
        self.issued_requests += 1;
        RequestId(self.issued_requests)
    }

    fn not_available(&self, intent: &Intent) -> WizardError {
        WizardError::NotAvailable {
            intent: intent.name(),
            step: self.state.step(),
        }
    }

    pub fn apply(&mut self, intent: Intent) -> Result<Effect, WizardError> {
        match intent {
            Intent::Reset => {
                self.state = WizardState::Uploading;
                Ok(Effect::None)
            }
            Intent::FileSelected(upload) => {
                if !matches!(
                    self.state,
                    WizardState::Uploading | WizardState::Reviewing(_)
                ) {
                    return Err(self.not_available(&Intent::FileSelected(upload)));
                }
                self.state = WizardState::Reviewing(Review::new(upload));
                Ok(Effect::None)
            }
            Intent::AnalysisRequested => {
                let request = self.next_request();
                let WizardState::Reviewing(review) = &mut self.state else {
                    return Err(self.not_available(&intent));
                };
                review.pending = Some(PendingRequest {
                    id: request,
                    kind: RequestKind::Analysis,
                });
                review.error = None;
                Ok(Effect::Analyze {
                    request,
                    photo: review.current_photo().clone(),
                })
            }
            Intent::EnhancementRequested(enhancement) => {
                let request = self.next_request();
                let WizardState::Reviewing(review) = &mut self.state else {
                    return Err(self.not_available(&intent));
                };
                review.pending = Some(PendingRequest {
                    id: request,
                    kind: RequestKind::Enhancement(enhancement),
                });
                review.error = None;
                Ok(Effect::Enhance {
                    request,
                    enhancement,
                    photo: review.current_photo().clone(),
                })
            }
            Intent::AnalysisSucceeded { request, result } => {
                let review = self.claim_response(request, "analysis_succeeded")?;
                review.pending = None;
                review.analysis = Some(result.normalized());
                review.analysis_stale = false;
                Ok(Effect::None)
            }
            Intent::AnalysisFailed { request } => {
                let review = self.claim_response(request, "analysis_failed")?;
                review.pending = None;
                review.error = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                Ok(Effect::None)
            }
            Intent::EnhancementSucceeded { request, image } => {
                let review = self.claim_response(request, "enhancement_succeeded")?;
                if let Some(PendingRequest {
                    kind: RequestKind::Enhancement(enhancement),
                    ..
                }) = review.pending.take()
                {
                    match enhancement {
                        Enhancement::Background(color) => review.edits.background = Some(color),
                        Enhancement::Costume(costume) => review.edits.costume = Some(costume),
                    }
                }
                review.enhanced = Some(image);
                review.analysis_stale = true;
                Ok(Effect::None)
            }
            Intent::EnhancementFailed { request } => {
                let review = self.claim_response(request, "enhancement_failed")?;
                review.pending = None;
                review.error = Some(ENHANCEMENT_FAILED_MESSAGE.to_string());
                Ok(Effect::None)
            }
            Intent::Proceed => {
                let WizardState::Reviewing(review) = &self.state else {
                    return Err(self.not_available(&intent));
                };
                if review.is_loading() {
                    return Err(WizardError::RequestInFlight);
                }
                let Some(analysis) = review.analysis.clone() else {
                    return Err(WizardError::AnalysisRequired);
                };
                let ordering = Ordering {
                    upload: review.upload.clone(),
                    analysis,
                    enhanced: review.enhanced.clone(),
                    config: OrderConfig::new(review.edits),
                };
                self.state = WizardState::Ordering(ordering);
                Ok(Effect::None)
            }
            Intent::OrderChanged(change) => {
                let WizardState::Ordering(ordering) = &mut self.state else {
                    return Err(self.not_available(&Intent::OrderChanged(change)));
                };
                ordering.config.apply(change)?;
                Ok(Effect::None)
            }
            Intent::SubmitOrder(customer) => {
                let WizardState::Ordering(ordering) = &self.state else {
                    return Err(self.not_available(&Intent::SubmitOrder(customer)));
                };
                let quote = ordering.config.quote()?;
                let order = PlacedOrder {
                    config: ordering.config.clone(),
                    quote,
                    customer,
                };
                let photo = ordering.final_photo().clone();
                self.state = WizardState::Confirmed(Confirmation {
                    order: order.clone(),
                    photo: photo.clone(),
                    processing: true,
                });
                Ok(Effect::PlaceOrder { order, photo })
            }
            Intent::OrderProcessed => {
                let WizardState::Confirmed(confirmation) = &mut self.state else {
                    return Err(self.not_available(&intent));
                };
                confirmation.processing = false;
                Ok(Effect::None)
            }
        }
    }

    /// Hands out the review only when `request` is the one currently pending.
    fn claim_response(
        &mut self,
        request: RequestId,
        intent: &'static str,
    ) -> Result<&mut Review, WizardError> {
        let step = self.state.step();
        let WizardState::Reviewing(review) = &mut self.state else {
            return Err(WizardError::NotAvailable { intent, step });
        };
        if review.pending.map(|pending| pending.id) == Some(request) {
            Ok(review)
        } else {
            Err(WizardError::Superseded(request))
        }
    }
}
