mod common;

use common::{Action, FakeElement, FakePage};
use listing_capture::adapter::{botentekoop, SiteAdapter};
use listing_capture::expand::expand_sections;
use listing_capture::renderer::Selector;
use listing_capture::session::{bootstrap, dismiss_cookies};
use listing_capture::show_more::expand_truncated;
use listing_capture::{CaptureError, Timings};

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// `<details>` whose summary toggles the `open` attribute.
fn add_details(page: &FakePage, label: &str, open: bool) -> (usize, usize) {
    let mut details = FakeElement::new("details");
    if open {
        details = details.attr("open", "");
    }
    let details = page.add(details);
    let summary = page.add(FakeElement::new("summary").text(label).child_of(details));
    page.on_click(
        summary,
        vec![
            vec![Action::SetAttr(details, "open".into(), String::new())],
            vec![Action::RemoveAttr(details, "open".into())],
        ],
    );
    (details, summary)
}

#[tokio::test]
async fn test_second_expansion_pass_is_a_no_op() {
    let page = FakePage::new();
    let (first, _) = add_details(&page, "Kenmerken", false);
    let (second, _) = add_details(&page, "Afmetingen", false);
    let timings = Timings::instant();
    let sections = labels(&["Kenmerken", "Afmetingen"]);

    let report = expand_sections(&page, &sections, &timings).await;
    assert_eq!(report.expanded(), 2);
    assert_eq!(report.attempts[0].selector_candidate_index, Some(0));
    assert!(page.attr(first, "open").is_some());
    assert!(page.attr(second, "open").is_some());
    let clicks_after_first = page.clicks();

    let report = expand_sections(&page, &sections, &timings).await;
    assert_eq!(page.clicks(), clicks_after_first);
    assert_eq!(report.already_open(), 2);
    assert_eq!(report.expanded(), 0);
    assert!(page.attr(first, "open").is_some());
}

#[tokio::test]
async fn test_zero_sections_touch_nothing() {
    let page = FakePage::new();
    add_details(&page, "Kenmerken", false);

    let report = expand_sections(&page, &[], &Timings::instant()).await;
    assert!(report.attempts.is_empty());
    assert_eq!(page.queries(), 0);
    assert_eq!(page.clicks(), 0);
}

#[tokio::test]
async fn test_missing_section_is_reported_and_skipped() {
    let page = FakePage::new();
    let heading = page.add(FakeElement::new("h3").text("Voortstuwing"));

    let report = expand_sections(
        &page,
        &labels(&["Beschrijving", "Voortstuwing"]),
        &Timings::instant(),
    )
    .await;
    assert_eq!(report.attempts.len(), 2);
    assert!(!report.attempts[0].found);
    assert_eq!(report.attempts[1].selector_candidate_index, Some(3));
    assert_eq!(page.clicks_on(heading), 1);
    assert_eq!(report.not_found(), 1);
}

#[tokio::test]
async fn test_non_native_disclosure_always_clicked() {
    let page = FakePage::new();
    let wrapper = page.add(FakeElement::new("div").text("Contactinformatie"));
    let toggle = page.add(FakeElement::new("button").child_of(wrapper));
    let timings = Timings::instant();
    let sections = labels(&["Contactinformatie"]);

    expand_sections(&page, &sections, &timings).await;
    expand_sections(&page, &sections, &timings).await;
    assert_eq!(page.clicks_on(toggle), 2);
}

#[tokio::test]
async fn test_hidden_candidates_are_skipped() {
    let page = FakePage::new();
    let hidden = page.add(FakeElement::new("button").text("Kenmerken").hidden());
    let shown = page.add(FakeElement::new("button").text("Kenmerken"));

    let report = expand_sections(&page, &labels(&["Kenmerken"]), &Timings::instant()).await;
    assert!(report.attempts[0].activated);
    assert_eq!(page.clicks_on(hidden), 0);
    assert_eq!(page.clicks_on(shown), 1);
}

#[tokio::test]
async fn test_section_candidate_gone_before_click_falls_through() {
    let page = FakePage::new();
    let gone = page.add(FakeElement::new("button").text("Kenmerken").detached_on_check());
    let next = page.add(FakeElement::new("button").text("Kenmerken"));

    let report = expand_sections(&page, &labels(&["Kenmerken"]), &Timings::instant()).await;
    assert!(report.attempts[0].activated);
    assert_eq!(report.expanded(), 1);
    assert_eq!(page.clicks_on(gone), 0);
    assert_eq!(page.clicks_on(next), 1);
}

#[tokio::test]
async fn test_show_more_requires_keyword() {
    let page = FakePage::new();
    let wrapper = page.add(FakeElement::new("div").class("show-more-less-interaction"));
    let contact = page.add(FakeElement::new("button").text("Contact").child_of(wrapper));
    let more = page.add(
        FakeElement::new("button")
            .text("  Meer weergeven ")
            .child_of(wrapper),
    );
    page.on_click(more, vec![vec![Action::Remove(more)]]);

    let report = expand_truncated(&page, &botentekoop(), &Timings::instant()).await;
    assert_eq!(report.clicked, 1);
    assert_eq!(report.selector_index, Some(0));
    assert_eq!(page.clicks_on(contact), 0);
    assert_eq!(page.clicks_on(more), 1);
    assert!(report.style_injected);
    assert_eq!(page.styles().len(), 1);
}

#[tokio::test]
async fn test_show_more_stops_after_first_productive_candidate() {
    let adapter = SiteAdapter::new("site-a")
        .with_show_more(Selector::tag("button").with_text("Verder lezen"))
        .with_show_more(Selector::tag("a").with_text("Verder lezen"))
        .with_show_more_keyword("verder");
    let page = FakePage::new();
    let button = page.add(FakeElement::new("button").text("Verder lezen"));
    let link = page.add(FakeElement::new("a").text("Verder lezen"));

    let report = expand_truncated(&page, &adapter, &Timings::instant()).await;
    assert_eq!(report.clicked, 1);
    assert_eq!(page.clicks_on(button), 1);
    assert_eq!(page.clicks_on(link), 0);
    assert!(!report.style_injected);
}

#[tokio::test]
async fn test_show_more_skips_button_removed_by_earlier_click() {
    let adapter = SiteAdapter::new("site-a")
        .with_show_more(Selector::tag("button").with_text("Meer"))
        .with_show_more_keyword("meer");
    let page = FakePage::new();
    let first = page.add(FakeElement::new("button").text("Meer"));
    let removed = page.add(FakeElement::new("button").text("Meer"));
    let last = page.add(FakeElement::new("button").text("Meer"));
    page.on_click(first, vec![vec![Action::Remove(removed)]]);

    let report = expand_truncated(&page, &adapter, &Timings::instant()).await;
    assert_eq!(report.clicked, 2);
    assert_eq!(report.selector_index, Some(0));
    assert_eq!(page.clicks_on(first), 1);
    assert_eq!(page.clicks_on(removed), 0);
    assert_eq!(page.clicks_on(last), 1);
}

#[tokio::test]
async fn test_show_more_zero_clicks_is_not_fatal() {
    let page = FakePage::new();
    let report = expand_truncated(&page, &botentekoop(), &Timings::instant()).await;
    assert_eq!(report.clicked, 0);
    assert_eq!(report.selector_index, None);
}

#[tokio::test]
async fn test_cookie_banner_first_visible_candidate() {
    let page = FakePage::new();
    let banner = page.add(FakeElement::new("div").class("cookie-banner"));
    let hidden = page.add(FakeElement::new("button").text("Accept").hidden().child_of(banner));
    let accept = page.add(FakeElement::new("button").text("Akkoord").child_of(banner));
    page.on_click(accept, vec![vec![Action::Hide(banner)]]);

    let clicked = dismiss_cookies(&page, &botentekoop(), &Timings::instant()).await;
    assert_eq!(clicked, Some(2));
    assert_eq!(page.clicks_on(hidden), 0);
    assert_eq!(page.clicks_on(accept), 1);
}

#[tokio::test]
async fn test_cookie_button_gone_before_click_tries_next_candidate() {
    let page = FakePage::new();
    let gone = page.add(FakeElement::new("button").text("Accept").detached_on_check());
    let accept = page.add(FakeElement::new("button").text("Akkoord"));

    let clicked = dismiss_cookies(&page, &botentekoop(), &Timings::instant()).await;
    assert_eq!(clicked, Some(2));
    assert_eq!(page.clicks_on(gone), 0);
    assert_eq!(page.clicks_on(accept), 1);
}

#[tokio::test]
async fn test_bootstrap_without_banner() {
    let mut page = FakePage::new();
    let report = bootstrap(
        &mut page,
        &botentekoop(),
        "https://www.botentekoop.nl/boot/x-1/",
        &Timings::instant(),
    )
    .await
    .unwrap();
    assert_eq!(report.cookie_selector, None);
    assert_eq!(report.navigation.final_url, "https://www.botentekoop.nl/boot/x-1/");
}

#[tokio::test]
async fn test_bootstrap_navigation_failure_is_fatal() {
    let mut page = FakePage::new();
    page.fail_navigation();
    let err = bootstrap(
        &mut page,
        &botentekoop(),
        "https://www.botentekoop.nl/boot/x-1/",
        &Timings::instant(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CaptureError::Navigation { .. }));
}
