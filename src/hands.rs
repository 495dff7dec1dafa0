//! Browser boundary: a Chrome session plus the small set of operations the
//! executor may perform, addressed by absolute structural paths.

use std::ffi::OsStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::json;
use tracing::info;

use crate::types::BROWSER_OP_TIMEOUT;

/// Persistent browser session. Created once, torn down when the run's scope
/// drops it.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(headless: bool) -> Result<Self> {
        info!("launching Chrome (headless: {headless})");
        let options = LaunchOptions {
            headless,
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
            ],
            idle_browser_timeout: std::time::Duration::from_secs(300),
            ..Default::default()
        };
        let browser = Browser::new(options).context("browser launch failed")?;

        let tab = browser.new_tab()?;
        tab.set_default_timeout(BROWSER_OP_TIMEOUT);
        tab.navigate_to("about:blank")?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

pub fn current_url(tab: &Arc<Tab>) -> String {
    tab.get_url()
}

pub fn content(tab: &Arc<Tab>) -> Result<String> {
    Ok(tab.get_content()?)
}

pub fn navigate(tab: &Arc<Tab>, url: &str) -> Result<()> {
    let url = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    tab.navigate_to(&url)?;
    tab.wait_until_navigated()?;
    Ok(())
}

pub fn click(tab: &Arc<Tab>, xpath: &str) -> Result<()> {
    tab.wait_for_xpath(xpath)?.click()?;
    Ok(())
}

/// Click to focus, clear any existing value, then type.
pub fn fill(tab: &Arc<Tab>, xpath: &str, text: &str) -> Result<()> {
    let element = tab.wait_for_xpath(xpath)?;
    element.click()?;
    element.call_js_fn("function() { this.value = ''; }", vec![], false)?;
    tab.type_str(text)?;
    Ok(())
}

/// Select every option whose value is in `values` and fire a bubbling
/// change event so the page reacts.
pub fn select_options(tab: &Arc<Tab>, xpath: &str, values: &[String]) -> Result<()> {
    let element = tab.wait_for_xpath(xpath)?;
    element.call_js_fn(
        r#"function(values) {
            for (const option of this.options) {
                option.selected = values.includes(option.value);
            }
            this.dispatchEvent(new Event('change', { bubbles: true }));
        }"#,
        vec![json!(values)],
        false,
    )?;
    Ok(())
}
