//! Live dashboard widgets backed by a browser context.
//!
//! Widgets are found by title and tagged with a `data-dash-harvest-id`
//! attribute so later scripts can address them. Table and pager parsing
//! reuse the HTML adapter on the widget's `outerHTML`; only clicking and
//! change observation run in the page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use dash_harvest::html::{find_next_control, parse_widget_table};
use dash_harvest::{
    BusyFlag, ChangeOutcome, HarvestConfig, HarvestError, HarvestResult, PageControl,
    PagerMarkers, RawTable, Widget,
};

use crate::renderer::{sanitize_js_string, RenderContext};

const WIDGET_ATTR: &str = "data-dash-harvest-id";

/// Slack on top of the in-page timer before the Rust side gives up waiting.
const CHANGE_WAIT_SLACK: Duration = Duration::from_secs(2);

/// Tags every widget whose title matches and reports `{id, title}` for each.
const LOCATE_WIDGETS_JS: &str = r#"(() => {
  const wanted = __TITLES__;
  const attr = '__ATTR__';
  const norm = s => (s || '').replace(/\s+/g, ' ').trim();
  const ownText = el => Array.from(el.childNodes)
    .filter(n => n.nodeType === Node.TEXT_NODE)
    .map(n => n.textContent)
    .join('');
  window.__dashHarvestNextId = window.__dashHarvestNextId || 1;
  const found = [];
  for (const el of document.querySelectorAll('body *')) {
    const title = norm(ownText(el));
    if (!wanted.includes(title)) continue;
    const widget =
      el.closest('.d1-widget, .dl-widget, .dashkit-grid-item, [data-qa="dashkit-grid-item"]') ||
      el.closest('[class*="widget"]') ||
      el.parentElement;
    if (!widget) continue;
    if (!widget.hasAttribute(attr)) {
      widget.setAttribute(attr, String(window.__dashHarvestNextId++));
    }
    const id = Number(widget.getAttribute(attr));
    if (!found.some(f => f.id === id)) found.push({ id, title });
  }
  return found;
})()"#;

const WIDGET_HTML_JS: &str = r#"(() => {
  const w = document.querySelector('[__ATTR__="__ID__"]');
  return w ? w.outerHTML : null;
})()"#;

/// In-page body-text signature of a widget's table, shared by the click and wait scripts.
const SIGNATURE_FN_JS: &str = r#"(w, max) => {
    const table =
      w.querySelector('.d1-widget__container_table table') ||
      w.querySelector('.dl-widget__container_table table') ||
      w.querySelector('table');
    if (!table) return '';
    const body = table.querySelector('tbody') || table;
    return Array.from(body.textContent || '').slice(0, max).join('');
  }"#;

/// Records the live pre-click signature on the widget, then clicks.
const CLICK_BUTTON_JS: &str = r#"(() => {
  const w = document.querySelector('[__ATTR__="__ID__"]');
  if (!w) return false;
  const b = w.querySelectorAll('button')[__INDEX__];
  if (!b) return false;
  w.__dashHarvestPrev = (__SIG__)(w, __MAX__);
  b.click();
  return true;
})()"#;

/// Resolves 'changed' once the table body prefix differs from the signature
/// recorded at click time (or the caller's signature when none was), 'timeout'
/// when the timer fires first, 'missing' if the widget is gone.
const AWAIT_CHANGE_JS: &str = r#"new Promise(resolve => {
  const w = document.querySelector('[__ATTR__="__ID__"]');
  if (!w) { resolve('missing'); return; }
  const recorded = w.__dashHarvestPrev;
  delete w.__dashHarvestPrev;
  const prev = typeof recorded === 'string' ? recorded : '__PREV__';
  const sig = () => (__SIG__)(w, __MAX__);
  const now = sig();
  if (now && now !== prev) { resolve('changed'); return; }
  let done = false;
  let timer = null;
  const observer = new MutationObserver(() => {
    const s = sig();
    if (s && s !== prev) finish('changed');
  });
  const finish = result => {
    if (done) return;
    done = true;
    clearTimeout(timer);
    observer.disconnect();
    resolve(result);
  };
  observer.observe(w, { childList: true, subtree: true, characterData: true });
  timer = setTimeout(() => finish('timeout'), __TIMEOUT__);
})"#;

#[derive(Debug, Deserialize)]
struct LocatedWidget {
    id: u32,
    title: String,
}

fn widget_script(template: &str, id: u32, signature_chars: usize) -> String {
    template
        .replace("__SIG__", SIGNATURE_FN_JS)
        .replace("__ATTR__", WIDGET_ATTR)
        .replace("__ID__", &id.to_string())
        .replace("__MAX__", &signature_chars.to_string())
}

fn widget_error(e: anyhow::Error) -> HarvestError {
    HarvestError::Widget(format!("{e:#}"))
}

/// A dashboard widget on a live page.
pub struct DashboardWidget {
    ctx: Arc<dyn RenderContext>,
    id: u32,
    title: String,
    markers: PagerMarkers,
    signature_chars: usize,
    busy: BusyFlag,
}

impl DashboardWidget {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Export guard shared by every run against this widget.
    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    fn script(&self, template: &str) -> String {
        widget_script(template, self.id, self.signature_chars)
    }

    fn await_change_script(&self, previous: &str, timeout: Duration) -> String {
        // Previous text last: it may contain placeholder lookalikes.
        self.script(AWAIT_CHANGE_JS)
            .replace("__TIMEOUT__", &timeout.as_millis().to_string())
            .replace("__PREV__", &sanitize_js_string(previous))
    }

    /// Current `outerHTML` of the widget, or `None` once it left the page.
    pub async fn outer_html(&self) -> Result<Option<String>> {
        let value = self
            .ctx
            .execute_js(&self.script(WIDGET_HTML_JS))
            .await
            .with_context(|| format!("failed to read widget {} markup", self.id))?;
        Ok(value.as_str().map(str::to_string))
    }
}

/// Find and tag every widget whose title is one of `titles`.
pub async fn locate_widgets(
    ctx: &Arc<dyn RenderContext>,
    titles: &[String],
    config: &HarvestConfig,
) -> Result<Vec<DashboardWidget>> {
    let list = titles
        .iter()
        .map(|t| {
            let normalized = t.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("'{}'", sanitize_js_string(&normalized))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let script = LOCATE_WIDGETS_JS
        .replace("__TITLES__", &format!("[{list}]"))
        .replace("__ATTR__", WIDGET_ATTR);

    let value = ctx
        .execute_js(&script)
        .await
        .context("failed to locate widgets")?;
    let located: Vec<LocatedWidget> = match value {
        serde_json::Value::Null => Vec::new(),
        other => serde_json::from_value(other).context("unexpected widget list")?,
    };

    Ok(located
        .into_iter()
        .map(|w| DashboardWidget {
            ctx: Arc::clone(ctx),
            id: w.id,
            title: w.title,
            markers: config.markers.clone(),
            signature_chars: config.signature_chars,
            busy: BusyFlag::new(),
        })
        .collect())
}

/// Poll [`locate_widgets`] until at least one widget shows up or `wait` elapses.
pub async fn wait_for_widgets(
    ctx: &Arc<dyn RenderContext>,
    titles: &[String],
    config: &HarvestConfig,
    wait: Duration,
) -> Result<Vec<DashboardWidget>> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let widgets = locate_widgets(ctx, titles, config).await?;
        if !widgets.is_empty() || tokio::time::Instant::now() >= deadline {
            return Ok(widgets);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

#[async_trait]
impl Widget for DashboardWidget {
    async fn table(&self) -> HarvestResult<Option<RawTable>> {
        let html = self.outer_html().await.map_err(widget_error)?;
        Ok(html.as_deref().and_then(parse_widget_table))
    }

    async fn next_control(&self) -> HarvestResult<Option<Box<dyn PageControl>>> {
        let Some(html) = self.outer_html().await.map_err(widget_error)? else {
            return Ok(None);
        };
        Ok(find_next_control(&html, &self.markers).map(|found| {
            Box::new(DashboardButton {
                ctx: Arc::clone(&self.ctx),
                widget_id: self.id,
                signature_chars: self.signature_chars,
                index: found.index,
                disabled: found.disabled,
            }) as Box<dyn PageControl>
        }))
    }

    async fn await_change(&self, previous: &str, timeout: Duration) -> HarvestResult<ChangeOutcome> {
        let script = self.await_change_script(previous, timeout);

        let waited =
            tokio::time::timeout(timeout + CHANGE_WAIT_SLACK, self.ctx.execute_js(&script)).await;
        let value = match waited {
            Ok(result) => result
                .context("failed to observe table changes")
                .map_err(widget_error)?,
            Err(_) => return Ok(ChangeOutcome::TimedOut),
        };

        Ok(match value.as_str() {
            Some("changed") => ChangeOutcome::Changed,
            _ => ChangeOutcome::TimedOut,
        })
    }
}

/// The pager button chosen as "next", addressed by position inside its widget.
struct DashboardButton {
    ctx: Arc<dyn RenderContext>,
    widget_id: u32,
    signature_chars: usize,
    index: usize,
    disabled: bool,
}

#[async_trait]
impl PageControl for DashboardButton {
    fn is_disabled(&self) -> bool {
        self.disabled
    }

    async fn trigger(&self) -> HarvestResult<()> {
        let script = widget_script(CLICK_BUTTON_JS, self.widget_id, self.signature_chars)
            .replace("__INDEX__", &self.index.to_string());
        let clicked = self
            .ctx
            .execute_js(&script)
            .await
            .context("failed to click next page")
            .map_err(widget_error)?;
        if clicked.as_bool() != Some(true) {
            return Err(HarvestError::Widget(format!(
                "next button {} of widget {} vanished before it could be clicked",
                self.index, self.widget_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NavigationResult;
    use dash_harvest::{export_widget, MemorySink, PaginationDriver};
    use std::sync::Mutex;

    /// Answers the adapter's scripts from a list of widget snapshots.
    struct FakePage {
        pages: Vec<String>,
        current: Mutex<usize>,
        scripts: Mutex<Vec<String>>,
        click_lands: bool,
    }

    impl FakePage {
        fn new(pages: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                current: Mutex::new(0),
                scripts: Mutex::new(Vec::new()),
                click_lands: true,
            })
        }

        /// A page whose next button is gone by the time it is clicked.
        fn with_lost_clicks(pages: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                current: Mutex::new(0),
                scripts: Mutex::new(Vec::new()),
                click_lands: false,
            })
        }

        fn scripts_containing(&self, needle: &str) -> Vec<String> {
            self.scripts
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.contains(needle))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl RenderContext for FakePage {
        async fn navigate(&self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 0,
            })
        }

        async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
            self.scripts.lock().unwrap().push(script.to_string());
            let mut current = self.current.lock().unwrap();
            if script.contains("window.__dashHarvestNextId") {
                return Ok(serde_json::json!([{ "id": 1, "title": "Все звонки" }]));
            }
            if script.contains("outerHTML") {
                return Ok(self
                    .pages
                    .get(*current)
                    .map(|p| serde_json::Value::String(p.clone()))
                    .unwrap_or(serde_json::Value::Null));
            }
            if script.contains("b.click()") {
                if !self.click_lands {
                    return Ok(serde_json::Value::Bool(false));
                }
                *current += 1;
                return Ok(serde_json::Value::Bool(true));
            }
            if script.contains("MutationObserver") {
                return Ok(serde_json::Value::String("changed".to_string()));
            }
            anyhow::bail!("unexpected script")
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn widget_page(rows: &str, next: &str) -> String {
        format!(
            r#"<div class="dl-widget" data-dash-harvest-id="1">
                 <div class="dl-widget__header"><span>Все звонки</span></div>
                 <div class="dl-widget__container_table"><table><tbody>{rows}</tbody></table></div>
                 <div class="pager"><span>Строки: 1-2 из 3</span><button>‹</button>{next}</div>
               </div>"#
        )
    }

    fn two_pages() -> Vec<String> {
        vec![
            widget_page(
                "<tr><td>A</td><td>1</td></tr><tr><td>B</td><td>2</td></tr>",
                "<button>›</button>",
            ),
            widget_page("<tr><td>C</td><td>3</td></tr>", "<button disabled>›</button>"),
        ]
    }

    fn widget_on(ctx: Arc<dyn RenderContext>, id: u32) -> DashboardWidget {
        DashboardWidget {
            ctx,
            id,
            title: "Все звонки".to_string(),
            markers: PagerMarkers::default(),
            signature_chars: 300,
            busy: BusyFlag::new(),
        }
    }

    #[tokio::test]
    async fn test_dashboard_widget_walks_pages() {
        let fake = FakePage::new(two_pages());
        let ctx: Arc<dyn RenderContext> = fake.clone();
        let config = HarvestConfig::default();

        let widgets = locate_widgets(&ctx, &["Все  звонки".to_string()], &config)
            .await
            .unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].title(), "Все звонки");

        let report = PaginationDriver::new(&config)
            .collect_all(&widgets[0])
            .await
            .unwrap();
        assert_eq!(report.to_tsv(), "A\t1\nB\t2\nC\t3");
        assert_eq!(report.timed_out_transitions, 0);

        let clicks = fake.scripts_containing("b.click()");
        assert_eq!(clicks.len(), 1);
        assert!(clicks[0].contains("querySelectorAll('button')[1]"));
        assert!(clicks[0].contains(r#"[data-dash-harvest-id="1"]"#));
    }

    #[tokio::test]
    async fn test_vanished_widget_is_missing_table() {
        let fake = FakePage::new(Vec::new());
        let widget = widget_on(fake, 7);
        let result = PaginationDriver::default().collect_all(&widget).await;
        assert!(matches!(result, Err(HarvestError::MissingTable)));
    }

    #[tokio::test]
    async fn test_lost_click_fails_instead_of_rereading_page() {
        let fake = FakePage::with_lost_clicks(two_pages());
        let widget = widget_on(fake.clone(), 1);

        let result = PaginationDriver::default().collect_all(&widget).await;
        match result {
            Err(HarvestError::Widget(msg)) => assert!(msg.contains("vanished")),
            other => panic!("expected widget error, got {other:?}"),
        }
        // No wait was started for a click that never happened.
        assert!(fake.scripts_containing("MutationObserver").is_empty());
    }

    #[tokio::test]
    async fn test_click_records_live_signature_before_clicking() {
        // Parsed body text drops the status div and turns CR into LF, so a
        // Rust-side signature would never match the live DOM.
        let first = widget_page(
            "<div>Loading</div><tr><td>a\rb</td></tr>",
            "<button>›</button>",
        );
        let fake = FakePage::new(vec![first, two_pages().remove(1)]);
        let widget = widget_on(fake.clone(), 1);

        let report = PaginationDriver::default().collect_all(&widget).await.unwrap();
        assert_eq!(report.pages_visited, 2);

        let click = &fake.scripts_containing("b.click()")[0];
        let recorded = click.find("w.__dashHarvestPrev =").unwrap();
        assert!(recorded < click.find("b.click()").unwrap());
        assert!(click.contains("body.textContent"));
        assert!(click.contains("slice(0, max)"));
        assert!(click.contains("(w, 300)"));

        let wait = &fake.scripts_containing("MutationObserver")[0];
        assert!(wait.contains("const recorded = w.__dashHarvestPrev;"));
        assert!(wait.contains("typeof recorded === 'string' ? recorded :"));
    }

    #[test]
    fn test_await_script_escapes_previous_signature() {
        let fake = FakePage::new(Vec::new());
        let widget = widget_on(fake, 3);
        let script = widget.await_change_script(
            "it's\n</tbody> __MAX__ __TIMEOUT__",
            Duration::from_secs(8),
        );
        assert!(script.contains(r"'it\'s\n\x3c/tbody\x3e __MAX__ __TIMEOUT__';"));
        assert!(script.contains("setTimeout(() => finish('timeout'), 8000)"));
        assert!(script.contains(r#"[data-dash-harvest-id="3"]"#));
        assert!(!script.contains("__SIG__"));
    }

    #[tokio::test]
    async fn test_widget_busy_flag_rejects_overlapping_export() {
        let fake = FakePage::new(two_pages());
        let widget = widget_on(fake, 1);
        let sink = MemorySink::new();
        let config = HarvestConfig::default();

        let held = widget.busy().acquire().unwrap();
        let overlapping = export_widget(&widget, &sink, &config, widget.busy()).await;
        assert!(matches!(overlapping, Err(HarvestError::Busy)));
        drop(held);

        let summary = export_widget(&widget, &sink, &config, widget.busy())
            .await
            .unwrap();
        assert_eq!(summary.rows, 3);
        assert!(!widget.busy().is_busy());
    }
}
