use crate::wizard::machine::{
    Confirmation, Enhancement, Intent, Ordering, RequestKind, Review, Step, WizardState,
};
use crate::wizard::order::{
    format_rupiah, BackgroundColor, Costume, Customer, EditChoices, Finish, OrderChange,
    OrderKind,
};

pub const CALLBACK_PREFIX: &str = "pp:";

/// A button press the panel can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Analyze,
    Enhance(Enhancement),
    Proceed,
    Kind(OrderKind),
    Size(String),
    Quantity(i32),
    Finish(Finish),
    Submit,
    Reset,
}

impl Action {
    pub fn callback_data(&self) -> String {
        let body = match self {
            Action::Analyze => "analyze".to_string(),
            Action::Enhance(Enhancement::Background(color)) => format!("bg:{}", color.code()),
            Action::Enhance(Enhancement::Costume(costume)) => {
                format!("costume:{}", costume.code())
            }
            Action::Proceed => "proceed".to_string(),
            Action::Kind(kind) => format!("kind:{}", kind.code()),
            Action::Size(size) => format!("size:{size}"),
            Action::Quantity(delta) => format!("qty:{delta:+}"),
            Action::Finish(finish) => format!("finish:{}", finish.code()),
            Action::Submit => "submit".to_string(),
            Action::Reset => "reset".to_string(),
        };
        format!("{CALLBACK_PREFIX}{body}")
    }

    pub fn parse(data: &str) -> Option<Self> {
        let body = data.strip_prefix(CALLBACK_PREFIX)?;
        let (name, value) = body.split_once(':').unwrap_or((body, ""));
        let action = match (name, value) {
            ("analyze", "") => Action::Analyze,
            ("bg", code) => Action::Enhance(Enhancement::Background(
                BackgroundColor::from_code(code)?,
            )),
            ("costume", code) => Action::Enhance(Enhancement::Costume(Costume::from_code(code)?)),
            ("proceed", "") => Action::Proceed,
            ("kind", code) => Action::Kind(OrderKind::from_code(code)?),
            ("size", size) if !size.is_empty() => Action::Size(size.to_string()),
            ("qty", delta) => Action::Quantity(delta.parse().ok()?),
            ("finish", code) => Action::Finish(Finish::from_code(code)?),
            ("submit", "") => Action::Submit,
            ("reset", "") => Action::Reset,
            _ => return None,
        };
        Some(action)
    }

    pub fn into_intent(self, customer: Customer) -> Intent {
        match self {
            Action::Analyze => Intent::AnalysisRequested,
            Action::Enhance(enhancement) => Intent::EnhancementRequested(enhancement),
            Action::Proceed => Intent::Proceed,
            Action::Kind(kind) => Intent::OrderChanged(OrderChange::Kind(kind)),
            Action::Size(size) => Intent::OrderChanged(OrderChange::Size(size)),
            Action::Quantity(delta) => Intent::OrderChanged(OrderChange::Quantity(delta)),
            Action::Finish(finish) => Intent::OrderChanged(OrderChange::Finish(finish)),
            Action::Submit => Intent::SubmitOrder(customer),
            Action::Reset => Intent::Reset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Plain-text panel content plus its inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl Screen {
    #[cfg(test)]
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.keyboard.iter().flatten().map(|button| &button.action)
    }
}

pub fn stepper(step: Step) -> String {
    let marks = Step::ALL
        .iter()
        .map(|candidate| {
            let mark = if *candidate <= step { "●" } else { "○" };
            format!("{mark} {}", candidate.label())
        })
        .collect::<Vec<_>>()
        .join("  ");
    format!(
        "Step {} of {}: {}\n{}",
        step.number(),
        Step::ALL.len(),
        step.label(),
        marks
    )
}

fn selected(label: &str, is_selected: bool) -> String {
    if is_selected {
        format!("✓ {label}")
    } else {
        label.to_string()
    }
}

fn edits_summary(edits: &EditChoices) -> Option<String> {
    let mut parts = Vec::new();
    if edits.background.is_some() {
        parts.push(format!("Background: {}", edits.background_label()));
    }
    if edits.costume.is_some() {
        parts.push(format!("Costume: {}", edits.costume_label()));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

pub fn render(state: &WizardState) -> Screen {
    let (body, keyboard) = match state {
        WizardState::Uploading => render_upload(),
        WizardState::Reviewing(review) => render_review(review),
        WizardState::Ordering(ordering) => render_ordering(ordering),
        WizardState::Confirmed(confirmation) => render_confirmation(confirmation),
    };
    Screen {
        text: format!("{}\n\n{}", stepper(state.step()), body),
        keyboard,
    }
}

fn render_upload() -> (String, Vec<Vec<Button>>) {
    let text = "AI Photo Print Assistant\n\
Upload, analyze, and perfect your passport photo for printing.\n\n\
Send a photo to begin (PNG, JPG, or WEBP). Sending it as a file keeps full quality."
        .to_string();
    (text, Vec::new())
}

fn loading_text(kind: RequestKind) -> String {
    match kind {
        RequestKind::Analysis => "AI is working... checking passport photo requirements.".to_string(),
        RequestKind::Enhancement(enhancement) => {
            format!("AI is working... applying {}.", enhancement.label().to_lowercase())
        }
    }
}

fn edit_keyboard() -> Vec<Vec<Button>> {
    let backgrounds = BackgroundColor::ALL
        .into_iter()
        .map(|color| {
            Button::new(
                format!("{} background", color.label()),
                Action::Enhance(Enhancement::Background(color)),
            )
        })
        .collect();
    let costumes = Costume::ALL
        .into_iter()
        .map(|costume| {
            Button::new(costume.label(), Action::Enhance(Enhancement::Costume(costume)))
        })
        .collect();
    vec![backgrounds, costumes]
}

fn render_review(review: &Review) -> (String, Vec<Vec<Button>>) {
    if let Some(pending) = review.pending {
        return (loading_text(pending.kind), Vec::new());
    }

    let mut sections = Vec::new();
    let mut keyboard = Vec::new();

    if let Some(summary) = edits_summary(&review.edits) {
        sections.push(format!("Edited photo\n{summary}"));
    }

    if review.analysis.is_some() && review.analysis_stale {
        sections.push("Last check, made before your latest edit:".to_string());
    }
    match &review.analysis {
        Some(analysis) if analysis.is_valid => {
            sections.push("Photo meets requirements!".to_string());
        }
        Some(analysis) => {
            let issues = analysis
                .issues
                .iter()
                .map(|issue| format!("• {issue}"))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Potential issues found\n{issues}"));
        }
        None => {}
    }

    if let Some(error) = &review.error {
        sections.push(error.clone());
    }

    if review.can_proceed() {
        sections.push("Fix the background or outfit with AI, or proceed to order.".to_string());
        keyboard.extend(edit_keyboard());
        if review.analysis_stale {
            keyboard.push(vec![Button::new("Check edited photo", Action::Analyze)]);
        }
        keyboard.push(vec![Button::new("Proceed to order", Action::Proceed)]);
    } else {
        if review.error.is_none() {
            sections.push("Your photo is ready to be checked.".to_string());
        }
        let label = if review.error.is_some() {
            "Try again"
        } else {
            "Analyze photo"
        };
        keyboard.push(vec![Button::new(label, Action::Analyze)]);
    }
    keyboard.push(vec![Button::new("Start over", Action::Reset)]);

    (sections.join("\n\n"), keyboard)
}

fn render_ordering(ordering: &Ordering) -> (String, Vec<Vec<Button>>) {
    let config = &ordering.config;
    let mut lines = vec!["Customize your order".to_string(), String::new()];
    lines.push(format!("Type: {}", config.kind.label()));
    match config.size_option() {
        Ok(option) => lines.push(format!("Size: {} ({})", option.label, option.description)),
        Err(_) => lines.push(format!("Size: {}", config.size)),
    }
    lines.push(format!("Finish: {}", config.finish.label()));
    if let Some(summary) = edits_summary(&config.edits) {
        lines.push(summary);
    }

    if let Ok(quote) = config.quote() {
        lines.push(String::new());
        lines.push(format!(
            "{}: {}",
            quote.price_label(),
            format_rupiah(quote.unit_price)
        ));
        lines.push(format!("Quantity: x {}", quote.quantity_label()));
        lines.push(format!("Total: {}", format_rupiah(quote.total)));
    }

    let kinds = OrderKind::ALL
        .into_iter()
        .map(|kind| Button::new(selected(kind.label(), kind == config.kind), Action::Kind(kind)))
        .collect::<Vec<_>>();
    let sizes = config
        .kind
        .catalog()
        .iter()
        .map(|option| {
            Button::new(
                selected(
                    &format!("{} · {}", option.id, format_rupiah(option.price)),
                    option.id == config.size,
                ),
                Action::Size(option.id.to_string()),
            )
        })
        .collect::<Vec<_>>();
    let finishes = Finish::ALL
        .into_iter()
        .map(|finish| {
            Button::new(
                selected(finish.label(), finish == config.finish),
                Action::Finish(finish),
            )
        })
        .collect::<Vec<_>>();

    let mut keyboard = vec![kinds];
    keyboard.extend(sizes.chunks(3).map(|chunk| chunk.to_vec()));
    keyboard.push(vec![
        Button::new("−1", Action::Quantity(-1)),
        Button::new("+1", Action::Quantity(1)),
    ]);
    keyboard.push(finishes);
    keyboard.push(vec![Button::new("Order now", Action::Submit)]);
    keyboard.push(vec![Button::new("Start over", Action::Reset)]);

    (lines.join("\n"), keyboard)
}

fn render_confirmation(confirmation: &Confirmation) -> (String, Vec<Vec<Button>>) {
    if confirmation.processing {
        return ("Processing your order...".to_string(), Vec::new());
    }
    let order = &confirmation.order;
    let size = order
        .config
        .size_option()
        .map(|option| option.label)
        .unwrap_or(order.config.size);
    let text = format!(
        "Order confirmed!\n\
Thank you for your order. Your photos will be printed and sent soon.\n\n\
{} · {} · {} · {}\nTotal: {}",
        order.config.kind.label(),
        size,
        order.quote.quantity_label(),
        order.config.finish.label(),
        format_rupiah(order.quote.total)
    );
    (text, vec![vec![Button::new("Order again", Action::Reset)]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::machine::{AnalysisResult, Effect, RequestId, Wizard};
    use crate::wizard::upload::tests::sample_png;
    use crate::wizard::upload::{PhotoPayload, UploadedImage};

    fn customer() -> Customer {
        Customer {
            chat_id: 5,
            user_id: Some(5),
            display_name: "Rina".into(),
            username: None,
        }
    }

    fn reviewed(result: AnalysisResult) -> Wizard {
        let mut wizard = Wizard::default();
        let upload = UploadedImage::from_bytes(sample_png(), None, None, 1 << 20).unwrap();
        wizard.apply(Intent::FileSelected(upload)).unwrap();
        let Effect::Analyze { request, .. } = wizard.apply(Intent::AnalysisRequested).unwrap()
        else {
            panic!("expected analysis effect");
        };
        wizard
            .apply(Intent::AnalysisSucceeded { request, result })
            .unwrap();
        wizard
    }

    fn all_screens() -> Vec<Screen> {
        let mut wizard = reviewed(AnalysisResult {
            is_valid: true,
            issues: vec![],
        });
        let mut screens = vec![render(&WizardState::Uploading), render(wizard.state())];
        wizard.apply(Intent::Proceed).unwrap();
        screens.push(render(wizard.state()));
        wizard
            .apply(Intent::OrderChanged(OrderChange::Kind(OrderKind::IdPhoto)))
            .unwrap();
        screens.push(render(wizard.state()));
        wizard.apply(Intent::SubmitOrder(customer())).unwrap();
        screens.push(render(wizard.state()));
        wizard.apply(Intent::OrderProcessed).unwrap();
        screens.push(render(wizard.state()));
        screens
    }

    #[test]
    fn invalid_analysis_lists_every_issue_and_offers_edits_and_proceed() {
        let wizard = reviewed(AnalysisResult {
            is_valid: false,
            issues: vec![
                "Background is not plain".into(),
                "Face is not centered".into(),
            ],
        });
        let screen = render(wizard.state());

        assert!(screen.text.starts_with("Step 2 of 4: Analyze"));
        assert!(screen.text.contains("• Background is not plain"));
        assert!(screen.text.contains("• Face is not centered"));
        let actions = screen.actions().collect::<Vec<_>>();
        assert!(actions.contains(&&Action::Proceed));
        assert!(actions.contains(&&Action::Enhance(Enhancement::Background(
            BackgroundColor::White
        ))));
        assert!(actions.contains(&&Action::Enhance(Enhancement::Costume(Costume::BlackSuit))));
        assert_eq!(wizard.step(), Step::Analyze);
    }

    #[test]
    fn loading_review_shows_no_buttons() {
        let mut wizard = reviewed(AnalysisResult {
            is_valid: true,
            issues: vec![],
        });
        wizard
            .apply(Intent::EnhancementRequested(Enhancement::Background(
                BackgroundColor::Red,
            )))
            .unwrap();
        let screen = render(wizard.state());
        assert!(screen.keyboard.is_empty());
        assert!(screen.text.contains("applying red background"));
    }

    #[test]
    fn failed_analysis_offers_a_retry() {
        let mut wizard = Wizard::default();
        let upload = UploadedImage::from_bytes(sample_png(), None, None, 1 << 20).unwrap();
        wizard.apply(Intent::FileSelected(upload)).unwrap();
        wizard.apply(Intent::AnalysisRequested).unwrap();
        wizard
            .apply(Intent::AnalysisFailed {
                request: RequestId(1),
            })
            .unwrap();

        let screen = render(wizard.state());
        assert!(screen.text.contains("Failed to analyze photo. Please try again."));
        assert_eq!(screen.keyboard[0][0], Button::new("Try again", Action::Analyze));
        assert!(!screen.actions().any(|action| *action == Action::Proceed));
    }

    #[test]
    fn failed_recheck_of_an_edit_keeps_edit_and_order_buttons() {
        let mut wizard = reviewed(AnalysisResult {
            is_valid: false,
            issues: vec!["Background is not plain".into()],
        });
        let Effect::Enhance { request, .. } = wizard
            .apply(Intent::EnhancementRequested(Enhancement::Background(
                BackgroundColor::White,
            )))
            .unwrap()
        else {
            panic!("expected enhancement effect");
        };
        wizard
            .apply(Intent::EnhancementSucceeded {
                request,
                image: PhotoPayload::new(vec![1, 2, 3], "image/png"),
            })
            .unwrap();
        let Effect::Analyze { request, .. } = wizard.apply(Intent::AnalysisRequested).unwrap()
        else {
            panic!("expected analysis effect");
        };
        wizard.apply(Intent::AnalysisFailed { request }).unwrap();

        let screen = render(wizard.state());
        assert!(screen.text.contains("before your latest edit"));
        assert!(screen.text.contains("• Background is not plain"));
        assert!(screen.text.contains("Failed to analyze photo. Please try again."));
        let actions = screen.actions().collect::<Vec<_>>();
        assert!(actions.contains(&&Action::Proceed));
        assert!(actions.contains(&&Action::Analyze));
        assert!(actions.contains(&&Action::Enhance(Enhancement::Costume(Costume::WhiteShirt))));
    }

    #[test]
    fn ordering_screen_marks_selection_and_shows_total() {
        let screens = all_screens();
        let ordering = &screens[2];
        assert!(ordering.text.contains("Size: 4R (10.2x15.2 cm) (Postcard size)"));
        assert!(ordering.text.contains("Total: Rp 3.500"));
        assert!(ordering
            .keyboard
            .iter()
            .flatten()
            .any(|button| button.label == "✓ 4R · Rp 3.500"));

        let id_photo = &screens[3];
        assert!(id_photo.text.contains("Price per pack: Rp 10.000"));
        assert!(id_photo
            .keyboard
            .iter()
            .flatten()
            .any(|button| button.label == "✓ 3x4 · Rp 10.000"));
    }

    #[test]
    fn confirmation_waits_then_offers_a_new_order() {
        let screens = all_screens();
        let processing = &screens[4];
        assert!(processing.text.contains("Processing your order"));
        assert!(processing.keyboard.is_empty());

        let done = &screens[5];
        assert!(done.text.contains("Order confirmed!"));
        assert!(done.text.contains("Total: Rp 10.000"));
        assert_eq!(done.actions().collect::<Vec<_>>(), vec![&Action::Reset]);
    }

    #[test]
    fn every_button_round_trips_within_telegram_limits() {
        for screen in all_screens() {
            for action in screen.actions() {
                let data = action.callback_data();
                assert!(data.len() <= 64, "{data}");
                assert_eq!(Action::parse(&data).as_ref(), Some(action));
            }
        }
    }

    #[test]
    fn rejects_foreign_or_malformed_callback_data() {
        assert_eq!(Action::parse("image_res:abc|2K"), None);
        assert_eq!(Action::parse("pp:bg:green"), None);
        assert_eq!(Action::parse("pp:qty:many"), None);
        assert_eq!(Action::parse("pp:size:"), None);
        assert_eq!(Action::parse("pp:qty:-1"), Some(Action::Quantity(-1)));
    }

    #[test]
    fn stepper_fills_completed_steps() {
        assert_eq!(
            stepper(Step::Customize),
            "Step 3 of 4: Customize\n● Upload  ● Analyze  ● Customize  ○ Confirm"
        );
    }
}
