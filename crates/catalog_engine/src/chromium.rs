use std::time::Duration;

use catalog_core::{normalize_origin, RawRow};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use futures_util::StreamExt;
use harvest_logging::{harvest_debug, harvest_warn};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::driver::{DriverError, PageDriver, ScrollOutcome};
use crate::rows::parse_table_rows;
use crate::session::{SessionBlob, StoredCookie};

/// Launch options for the Chromium collaborator.
#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    pub headless: bool,
}

impl Default for ChromiumSettings {
    fn default() -> Self {
        Self { headless: true }
    }
}

/// Production [`PageDriver`] backed by a Chromium instance over CDP.
///
/// The browser is owned by the driver for the duration of the run; `close`
/// shuts it down, and dropping the driver stops the event pump either way.
pub struct ChromiumDriver {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

impl ChromiumDriver {
    pub async fn launch(settings: &ChromiumSettings) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;

        Ok(Self {
            browser,
            handler_task,
            page,
        })
    }

    /// Shuts the browser down. Called on every exit path of a run.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            harvest_warn!("Browser close failed: {err}");
        }
        self.handler_task.abort();
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T, DriverError> {
        let result = self.page.evaluate(js).await.map_err(browser_err)?;
        result
            .into_value::<T>()
            .map_err(|e| DriverError::Browser(e.to_string()))
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

fn browser_err(err: impl std::fmt::Display) -> DriverError {
    DriverError::Browser(err.to_string())
}

/// Quotes a string as a JS literal so selectors survive embedding.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Resolves the element's true scrollable ancestor: virtualized tables scroll
/// an inner container, not the page and not the `<table>` itself. Walks up
/// for `overflow-y: auto|scroll` with scrollable height, then falls back to
/// searching descendants.
const GET_SCROLLER_JS: &str = r#"
    const getScroller = (el) => {
        let node = el;
        while (node && node !== document.body) {
            const s = getComputedStyle(node);
            const oy = s.overflowY;
            if ((oy === 'auto' || oy === 'scroll') && node.scrollHeight > node.clientHeight + 1) {
                return node;
            }
            node = node.parentElement;
        }
        for (const d of el.querySelectorAll('div')) {
            const s2 = getComputedStyle(d);
            const oy2 = s2.overflowY;
            if ((oy2 === 'auto' || oy2 === 'scroll') && d.scrollHeight > d.clientHeight + 1) {
                return d;
            }
        }
        return null;
    };
"#;

#[derive(Debug, serde::Deserialize)]
struct ScrollProbe {
    ok: bool,
    #[serde(default)]
    before: f64,
    #[serde(default)]
    after: f64,
    #[serde(default)]
    max: f64,
}

#[async_trait::async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.exists(selector).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        let js = format!(
            "document.querySelector({sel}) !== null",
            sel = js_string(selector)
        );
        self.eval(js).await
    }

    async fn read_text(&self, selector: &str) -> Result<String, DriverError> {
        let js = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.innerText : null; }})()",
            sel = js_string(selector)
        );
        let text: Option<String> = self.eval(js).await?;
        text.ok_or_else(|| DriverError::NotFound {
            selector: selector.to_string(),
        })
    }

    async fn page_text(&self) -> Result<String, DriverError> {
        self.eval("document.body ? document.body.innerText : ''".to_string())
            .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector),
            val = js_string(value)
        );
        let filled: bool = self.eval(js).await?;
        if filled {
            Ok(())
        } else {
            Err(DriverError::NotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let js = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()",
            sel = js_string(selector)
        );
        let clicked: bool = self.eval(js).await?;
        if clicked {
            Ok(())
        } else {
            Err(DriverError::NotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn click_text(&self, labels: &[String]) -> Result<bool, DriverError> {
        if labels.is_empty() {
            return Ok(false);
        }
        let js = format!(
            r#"((labels) => {{
                const lower = labels.map(l => l.toLowerCase());
                const candidates = document.querySelectorAll('button, [role=button], a');
                for (const el of candidates) {{
                    if (el.offsetParent === null || el.disabled) continue;
                    const text = (el.innerText || '').trim().toLowerCase();
                    if (!text) continue;
                    if (lower.some(l => text === l || text.includes(l))) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})({labels})"#,
            labels = serde_json::to_string(labels)
                .unwrap_or_else(|_| "[]".to_string())
        );
        self.eval(js).await
    }

    async fn click_any_option(&self, excluded: &[String]) -> Result<bool, DriverError> {
        let js = format!(
            r#"((excluded) => {{
                const lower = excluded.map(w => w.toLowerCase());
                for (const el of document.querySelectorAll('button, [role=button]')) {{
                    if (el.offsetParent === null || el.disabled) continue;
                    const text = (el.innerText || '').trim().toLowerCase();
                    if (!text) continue;
                    if (lower.some(w => text.includes(w))) continue;
                    el.click();
                    return true;
                }}
                return false;
            }})({excluded})"#,
            excluded = serde_json::to_string(excluded)
                .unwrap_or_else(|_| "[]".to_string())
        );
        self.eval(js).await
    }

    async fn visible_rows(&self, table: &str) -> Result<Vec<RawRow>, DriverError> {
        let js = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.outerHTML : null; }})()",
            sel = js_string(table)
        );
        let html: Option<String> = self.eval(js).await?;
        let html = html.ok_or_else(|| DriverError::NotFound {
            selector: table.to_string(),
        })?;
        Ok(parse_table_rows(&html))
    }

    async fn focus(&self, selector: &str) -> Result<(), DriverError> {
        // Best effort; a missing element is not worth failing a pass over.
        let js = format!(
            "(() => {{ const el = document.querySelector({sel}); if (el) el.click(); return true; }})()",
            sel = js_string(selector)
        );
        let _: bool = self.eval(js).await?;
        Ok(())
    }

    async fn reset_scroll(&self, table: &str) -> Result<(), DriverError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                {scroller}
                const target = getScroller(el);
                if (!target) return false;
                target.scrollTop = 0;
                return true;
            }})()"#,
            sel = js_string(table),
            scroller = GET_SCROLLER_JS
        );
        let ok: bool = self.eval(js).await?;
        if ok {
            Ok(())
        } else {
            Err(DriverError::NotFound {
                selector: table.to_string(),
            })
        }
    }

    async fn scroll_table(&self, table: &str, fraction: f64) -> Result<ScrollOutcome, DriverError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return {{ ok: false }};
                {scroller}
                const target = getScroller(el);
                if (!target) return {{ ok: false }};
                const before = target.scrollTop;
                const max = target.scrollHeight - target.clientHeight;
                const next = Math.min(before + target.clientHeight * {fraction}, max);
                target.scrollTop = next;
                return {{ ok: true, before: before, after: target.scrollTop, max: max }};
            }})()"#,
            sel = js_string(table),
            scroller = GET_SCROLLER_JS,
            fraction = fraction
        );
        let probe: ScrollProbe = self.eval(js).await?;
        if !probe.ok {
            return Err(DriverError::NotFound {
                selector: table.to_string(),
            });
        }
        Ok(ScrollOutcome {
            before: probe.before,
            after: probe.after,
            max: probe.max,
        })
    }

    async fn capture_session(&self) -> Result<SessionBlob, DriverError> {
        let cookies = self.page.get_cookies().await.map_err(browser_err)?;
        let jar = cookies
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        let local_storage: Vec<(String, String)> = self
            .eval("Object.entries(window.localStorage)".to_string())
            .await
            .unwrap_or_default();

        let origin = self
            .page
            .url()
            .await
            .map_err(browser_err)?
            .and_then(|u| normalize_origin(&u))
            .unwrap_or_default();

        Ok(SessionBlob {
            origin,
            captured_utc: chrono::Utc::now().to_rfc3339(),
            cookies: jar,
            local_storage,
        })
    }

    async fn apply_session(&self, blob: &SessionBlob) -> Result<(), DriverError> {
        // Local storage is origin-scoped, so land on the origin first.
        if !blob.origin.is_empty() {
            self.page.goto(blob.origin.as_str()).await.map_err(browser_err)?;
        }

        let mut cookies = Vec::with_capacity(blob.cookies.len());
        for c in &blob.cookies {
            let mut cookie = CookieParam::new(c.name.clone(), c.value.clone());
            cookie.domain = Some(c.domain.clone());
            cookie.path = Some(c.path.clone());
            cookie.secure = Some(c.secure);
            cookie.http_only = Some(c.http_only);
            cookies.push(cookie);
        }
        if !cookies.is_empty() {
            self.page.set_cookies(cookies).await.map_err(browser_err)?;
        }

        for (key, value) in &blob.local_storage {
            let js = format!(
                "window.localStorage.setItem({k}, {v}); true",
                k = js_string(key),
                v = js_string(value)
            );
            if let Err(err) = self.eval::<bool>(js).await {
                harvest_debug!("Restoring local storage key failed: {err}");
            }
        }

        Ok(())
    }
}
