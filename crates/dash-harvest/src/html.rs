//! HTML adapter: read widget markup with the `scraper` crate.
//!
//! Everything host-specific lives here: which selectors find the table,
//! how a tooltip payload is attached to a cell, and the positional
//! heuristic that decides which button means "next page".

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use crate::config::PagerMarkers;
use crate::extract::{CellLink, RawCell, RawTable};

/// Table lookup order inside a widget.
const TABLE_SELECTORS: &[&str] = &[
    ".d1-widget__container_table table",
    ".dl-widget__container_table table",
    "table",
];

/// Widget container lookup order when walking up from a title.
const WIDGET_SELECTORS: &[&str] = &[
    r#".d1-widget, .dl-widget, .dashkit-grid-item, [data-qa="dashkit-grid-item"]"#,
    r#"[class*="widget"]"#,
];

/// Attribute carrying a cell's structured tooltip payload.
pub const TOOLTIP_ATTR: &str = "data-tooltip-content";

/// The button chosen as "next page" within a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextControl {
    /// Position among all `button` elements of the widget, in document order.
    pub index: usize,
    pub disabled: bool,
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

fn button_sel() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| sel("button"))
}

fn disabled_class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bdisabled\b").expect("disabled regex is valid"))
}

fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Find the widget's table and describe its body rows.
pub fn parse_widget_table(widget_html: &str) -> Option<RawTable> {
    let fragment = Html::parse_fragment(widget_html);
    let root = fragment.root_element();
    let table = TABLE_SELECTORS
        .iter()
        .find_map(|css| root.select(&sel(css)).next())?;
    Some(table_from_element(&table))
}

/// Describe a `<table>` element: `tbody tr` rows and their `td` cells.
pub fn table_from_element(table: &ElementRef<'_>) -> RawTable {
    let row_sel = sel("tbody tr");
    let cell_sel = sel("td");
    let tooltip_sel = sel(&format!("[{TOOLTIP_ATTR}]"));
    let link_sel = sel("a");

    let rows = table
        .select(&row_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|td| RawCell {
                    tooltip: td
                        .select(&tooltip_sel)
                        .next()
                        .and_then(|el| el.value().attr(TOOLTIP_ATTR))
                        .map(str::to_string),
                    link: td.select(&link_sel).next().map(|a| CellLink {
                        text: text_of(&a),
                        href: a.value().attr("href").unwrap_or_default().to_string(),
                    }),
                    text: text_of(&td),
                })
                .collect()
        })
        .collect();

    let body_text = table
        .select(&sel("tbody"))
        .next()
        .map(|tbody| text_of(&tbody))
        .unwrap_or_else(|| text_of(table));

    RawTable { rows, body_text }
}

/// Whether a button is disabled: `disabled` attribute, `aria-disabled="true"`,
/// or a `disabled` class token.
pub fn is_disabled(button: &ElementRef<'_>) -> bool {
    let el = button.value();
    if el.attr("disabled").is_some() {
        return true;
    }
    if el.attr("aria-disabled") == Some("true") {
        return true;
    }
    el.attr("class")
        .map(|class| disabled_class_re().is_match(class))
        .unwrap_or(false)
}

/// Locate the widget's "next page" button.
///
/// Starts from the first `div`/`span`/`p` whose text contains a range label,
/// climbs to the nearest ancestor holding buttons and takes the last one.
/// If that is missing or disabled, the first button whose `aria-label`
/// contains a next label is tried. An enabled candidate wins over a disabled one.
pub fn find_next_control(widget_html: &str, markers: &PagerMarkers) -> Option<NextControl> {
    let fragment = Html::parse_fragment(widget_html);
    let root = fragment.root_element();
    let buttons: Vec<ElementRef<'_>> = root.select(button_sel()).collect();
    if buttons.is_empty() {
        return None;
    }

    let primary = pager_last_button(&root, markers);
    if let Some(btn) = primary {
        if !is_disabled(&btn) {
            return control_for(&buttons, &btn);
        }
    }

    let fallback = markers.next_labels.iter().find_map(|marker| {
        buttons.iter().copied().find(|b| {
            b.value()
                .attr("aria-label")
                .map(|label| label.contains(marker.as_str()))
                .unwrap_or(false)
        })
    });
    if let Some(btn) = fallback {
        if !is_disabled(&btn) {
            return control_for(&buttons, &btn);
        }
    }

    primary
        .or(fallback)
        .and_then(|btn| control_for(&buttons, &btn))
}

fn pager_last_button<'a>(root: &ElementRef<'a>, markers: &PagerMarkers) -> Option<ElementRef<'a>> {
    let label = root.select(&sel("div, span, p")).find(|el| {
        let text = text_of(el);
        markers
            .range_labels
            .iter()
            .any(|marker| text.contains(marker.as_str()))
    })?;

    let mut pager = label.parent().and_then(ElementRef::wrap);
    while let Some(candidate) = pager {
        if candidate.id() == root.id() || candidate.select(button_sel()).next().is_some() {
            break;
        }
        pager = candidate.parent().and_then(ElementRef::wrap);
    }

    pager?.select(button_sel()).last()
}

fn control_for(buttons: &[ElementRef<'_>], chosen: &ElementRef<'_>) -> Option<NextControl> {
    buttons
        .iter()
        .position(|b| b.id() == chosen.id())
        .map(|index| NextControl {
            index,
            disabled: is_disabled(chosen),
        })
}

/// Outer HTML of every widget whose title text equals `title`.
///
/// A title element is any element whose own text, whitespace-normalized,
/// equals `title`. Its widget is the closest ancestor matching a widget
/// container selector, or its parent element.
pub fn find_widgets_by_title(document_html: &str, title: &str) -> Vec<String> {
    let document = Html::parse_document(document_html);
    let all = sel("*");
    let widget_sels: Vec<Selector> = WIDGET_SELECTORS.iter().map(|css| sel(css)).collect();
    let wanted = normalize_ws(title);

    let mut widgets: Vec<ElementRef<'_>> = Vec::new();
    for el in document.select(&all) {
        if normalize_ws(&own_text(&el)) != wanted {
            continue;
        }
        let widget = widget_sels
            .iter()
            .find_map(|s| closest(&el, s))
            .or_else(|| el.parent().and_then(ElementRef::wrap));
        if let Some(widget) = widget {
            if !widgets.iter().any(|w| w.id() == widget.id()) {
                widgets.push(widget);
            }
        }
    }

    widgets.iter().map(|w| w.html()).collect()
}

fn own_text(el: &ElementRef<'_>) -> String {
    el.children()
        .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
        .collect()
}

fn closest<'a>(el: &ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    if selector.matches(el) {
        return Some(*el);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| selector.matches(ancestor))
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_rows;

    fn pager(buttons: &str) -> String {
        format!(
            r#"<div class="dl-widget">
                 <div class="dl-widget__container_table"><table><tbody><tr><td>x</td></tr></tbody></table></div>
                 <div class="pager">
                   <div class="range"><span>Строки: 1-10 из 95</span></div>
                   <div class="buttons">{buttons}</div>
                 </div>
               </div>"#
        )
    }

    #[test]
    fn test_parse_table_rows_and_cells() {
        let html = r#"
            <div class="dl-widget">
              <table>
                <thead><tr><th>Name</th><th>Id</th></tr></thead>
                <tbody>
                  <tr><td> A </td><td><span data-tooltip-content='{"content":"node_domain_1"}'>1</span></td></tr>
                  <tr></tr>
                  <tr><td><a href="/d/2">Open</a></td><td>2</td></tr>
                </tbody>
              </table>
            </div>"#;
        let table = parse_widget_table(html).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert!(table.rows[1].is_empty());

        let rows = extract_rows(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to_line(), "A\tnode_domain_1");
        assert_eq!(rows[1].to_line(), "Open\t2");
        assert!(!table.body_text.contains("Name"));
    }

    #[test]
    fn test_header_row_inside_tbody_is_skipped() {
        let html = r#"
            <table><tbody>
              <tr><th>H</th><th>Id</th></tr>
              <tr><td>a</td><td>1</td></tr>
            </tbody></table>"#;
        let table = parse_widget_table(html).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows[0].is_empty());

        let rows = extract_rows(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_line(), "a\t1");
    }

    #[test]
    fn test_prefers_container_table() {
        let html = r#"
            <div>
              <table><tbody><tr><td>legend</td></tr></tbody></table>
              <div class="dl-widget__container_table">
                <table><tbody><tr><td>data</td></tr></tbody></table>
              </div>
            </div>"#;
        let rows = extract_rows(&parse_widget_table(html).unwrap());
        assert_eq!(rows[0].fields(), ["data"]);
    }

    #[test]
    fn test_missing_table() {
        assert!(parse_widget_table("<div>no table here</div>").is_none());
    }

    #[test]
    fn test_tbody_inserted_for_bare_rows() {
        let rows = extract_rows(&parse_widget_table("<table><tr><td>a</td></tr></table>").unwrap());
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_next_is_last_pager_button() {
        let html = pager("<button>‹</button><button>1</button><button>2</button><button>›</button>");
        let control = find_next_control(&html, &PagerMarkers::default()).unwrap();
        assert_eq!(control, NextControl { index: 3, disabled: false });
    }

    #[test]
    fn test_disabled_markers() {
        let markers = PagerMarkers::default();
        for last in [
            "<button disabled>›</button>",
            r#"<button aria-disabled="true">›</button>"#,
            r#"<button class="btn btn_disabled disabled">›</button>"#,
            r#"<button class="pager-btn--disabled">›</button>"#,
        ] {
            let html = pager(&format!("<button>‹</button>{last}"));
            let control = find_next_control(&html, &markers).unwrap();
            assert!(control.disabled, "expected disabled for {last}");
            assert_eq!(control.index, 1);
        }
    }

    #[test]
    fn test_class_substring_is_not_disabled() {
        let html = pager(r#"<button class="notdisabledish">›</button>"#);
        let control = find_next_control(&html, &PagerMarkers::default()).unwrap();
        assert!(!control.disabled);
    }

    #[test]
    fn test_aria_label_fallback_without_range_label() {
        let html = r#"<div>
            <button aria-label="Previous page">‹</button>
            <button aria-label="Next page">›</button>
            <button>Export</button>
        </div>"#;
        let control = find_next_control(html, &PagerMarkers::default()).unwrap();
        assert_eq!(control, NextControl { index: 1, disabled: false });
    }

    #[test]
    fn test_fallback_used_when_last_button_disabled() {
        let html = pager(
            r#"<button aria-label="Следующая страница">›</button><button disabled>»</button>"#,
        );
        let control = find_next_control(&html, &PagerMarkers::default()).unwrap();
        assert_eq!(control, NextControl { index: 0, disabled: false });
    }

    #[test]
    fn test_no_buttons_no_control() {
        let html = r#"<div><span>Rows: 1-3</span><table></table></div>"#;
        assert!(find_next_control(html, &PagerMarkers::default()).is_none());
    }

    #[test]
    fn test_find_widgets_by_title() {
        let doc = r#"<html><body>
            <div class="dl-widget" id="w1">
              <div class="dl-widget__header"><span>  Все   звонки </span></div>
              <table><tbody><tr><td>1</td></tr></tbody></table>
            </div>
            <div class="dl-widget" id="w2">
              <div class="dl-widget__header"><span>Другое</span></div>
            </div>
        </body></html>"#;
        let widgets = find_widgets_by_title(doc, "Все звонки");
        assert_eq!(widgets.len(), 1);
        assert!(widgets[0].contains(r#"id="w1""#));
        assert!(find_widgets_by_title(doc, "Нет такого").is_empty());
    }
}
