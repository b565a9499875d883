//! Collapsible section expansion.

use serde::Serialize;

use crate::config::Timings;
use crate::renderer::{Locator, PageDriver, Selector};

/// What happened for one section label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionAttempt {
    pub label: String,
    /// Index into [`section_candidates`] of the shape that was clicked.
    pub selector_candidate_index: Option<usize>,
    pub found: bool,
    pub already_open: bool,
    pub activated: bool,
}

impl ExpansionAttempt {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            selector_candidate_index: None,
            found: false,
            already_open: false,
            activated: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionReport {
    pub attempts: Vec<ExpansionAttempt>,
}

impl ExpansionReport {
    pub fn expanded(&self) -> usize {
        self.attempts.iter().filter(|a| a.activated).count()
    }

    pub fn already_open(&self) -> usize {
        self.attempts.iter().filter(|a| a.already_open).count()
    }

    pub fn not_found(&self) -> usize {
        self.attempts.iter().filter(|a| !a.found).count()
    }
}

/// Selector shapes tried for a section label, in priority order.
pub fn section_candidates(label: &str) -> Vec<Selector> {
    let scope = || Selector::tag("div").with_text(label);
    vec![
        Selector::tag("summary").with_text(label),
        Selector::tag("button").with_text(label),
        Selector::tag("h2").with_text(label),
        Selector::tag("h3").with_text(label),
        Selector::tag("h4").with_text(label),
        Selector::tag("button").within(scope()),
        Selector::tag("h2").within(scope()),
        Selector::tag("h3").within(scope()),
        Selector::tag("span").with_text(label),
    ]
}

/// Expand every labelled section, one label at a time.
///
/// A native `<details open>` is left alone. Any other disclosure is
/// activated unconditionally because its state cannot be observed.
pub async fn expand_sections(
    page: &dyn PageDriver,
    labels: &[String],
    timings: &Timings,
) -> ExpansionReport {
    let mut report = ExpansionReport::default();
    if labels.is_empty() {
        return report;
    }

    tracing::info!(sections = labels.len(), "Expanding sections");
    for label in labels {
        let attempt = expand_one(page, label, timings).await;
        if attempt.already_open {
            tracing::info!(section = %label, "Already open");
        } else if attempt.activated {
            tracing::info!(section = %label, "Expanded");
        } else {
            tracing::info!(section = %label, "Section not found");
        }
        report.attempts.push(attempt);
    }
    report
}

async fn expand_one(page: &dyn PageDriver, label: &str, timings: &Timings) -> ExpansionAttempt {
    let mut attempt = ExpansionAttempt::new(label);

    if native_open(page, label, timings).await {
        attempt.found = true;
        attempt.already_open = true;
        return attempt;
    }

    for (index, selector) in section_candidates(label).into_iter().enumerate() {
        let Ok(matches) = page.query(&Locator::from(selector)).await else {
            continue;
        };
        for el in matches {
            if !matches!(page.is_visible(&el, timings.section_probe).await, Ok(true)) {
                continue;
            }
            match page.click(&el).await {
                Ok(()) => {
                    page.wait(timings.section_settle).await;
                    attempt.found = true;
                    attempt.activated = true;
                    attempt.selector_candidate_index = Some(index);
                    return attempt;
                }
                Err(e) if e.is_stale() => continue,
                Err(e) => tracing::debug!(section = label, "Click failed: {e}"),
            }
        }
    }
    attempt
}

async fn native_open(page: &dyn PageDriver, label: &str, timings: &Timings) -> bool {
    let locator = Locator::from(Selector::tag("details").with_text(label));
    let Some(details) = page.query(&locator).await.ok().and_then(|m| m.into_iter().next()) else {
        return false;
    };
    if !matches!(page.is_visible(&details, timings.section_probe).await, Ok(true)) {
        return false;
    }
    matches!(page.attribute(&details, "open").await, Ok(Some(_)))
}
