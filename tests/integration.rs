//! End-to-end flow: scripted driver, page, actions, logger, export.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use browserve::events::handler;
use browserve::page::{ClickOptions, HoverOptions, PageResponse};
use browserve::{
    Action, ActionExt, ActionMetrics, BrowserDriver, BrowserLogger, ClickAction, ComposedAction,
    ConditionalAction, ElementState, Error, FillAction, HandlerRegistry, Locator, LogFormat,
    LoggingConfig, NavigationAction, Page, Result, WaitAction, WaitUntil,
};
use parking_lot::Mutex;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Scripted driver
// ============================================================================

#[derive(Default)]
struct Site {
    url: String,
    /// selector -> (text, value)
    elements: HashMap<String, (String, String)>,
}

/// In-memory login site: submitting the form lands on a dashboard.
#[derive(Clone)]
struct ScriptedDriver {
    site: Arc<Mutex<Site>>,
}

impl ScriptedDriver {
    fn new() -> Self {
        let mut site = Site {
            url: "https://app.example.com".to_string(),
            ..Site::default()
        };
        for selector in ["#user", "#pass"] {
            site.elements
                .insert(selector.to_string(), (String::new(), String::new()));
        }
        site.elements
            .insert("#submit".to_string(), ("Sign in".to_string(), String::new()));

        Self {
            site: Arc::new(Mutex::new(site)),
        }
    }

    fn missing(selector: &str) -> Error {
        Error::driver(format!("No element matches selector '{selector}'"))
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn click(&self, selector: &str, _options: &ClickOptions, _timeout: Duration) -> Result<()> {
        let mut site = self.site.lock();
        if !site.elements.contains_key(selector) {
            return Err(Self::missing(selector));
        }
        if selector == "#submit" {
            site.url = "https://app.example.com/dashboard".to_string();
            site.elements.insert(
                "#welcome".to_string(),
                ("Welcome back, ada".to_string(), String::new()),
            );
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> Result<()> {
        let mut site = self.site.lock();
        let element = site
            .elements
            .get_mut(selector)
            .ok_or_else(|| Self::missing(selector))?;
        element.1 = value.to_string();
        Ok(())
    }

    async fn goto(
        &self,
        url: &str,
        _wait_until: WaitUntil,
        _timeout: Duration,
    ) -> Result<Option<PageResponse>> {
        self.site.lock().url = url.to_string();
        Ok(Some(PageResponse { status: 200 }))
    }

    async fn hover(&self, selector: &str, _options: &HoverOptions, _timeout: Duration) -> Result<()> {
        if self.site.lock().elements.contains_key(selector) {
            Ok(())
        } else {
            Err(Self::missing(selector))
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout: Duration,
    ) -> Result<()> {
        let present = self.site.lock().elements.contains_key(selector);
        let reached = match state {
            ElementState::Visible | ElementState::Attached => present,
            ElementState::Hidden | ElementState::Detached => !present,
        };
        if reached {
            Ok(())
        } else {
            Err(Error::driver(format!(
                "Timeout {}ms exceeded waiting for '{selector}'",
                timeout.as_millis()
            )))
        }
    }

    fn locator(&self, selector: &str) -> Box<dyn Locator> {
        Box::new(ScriptedLocator {
            site: Arc::clone(&self.site),
            selector: selector.to_string(),
        })
    }

    async fn reload(&self) -> Result<Option<PageResponse>> {
        Ok(Some(PageResponse { status: 200 }))
    }

    async fn go_back(&self) -> Result<Option<PageResponse>> {
        Ok(None)
    }

    async fn go_forward(&self) -> Result<Option<PageResponse>> {
        Ok(None)
    }

    async fn mouse_wheel(&self, _delta_x: i64, _delta_y: i64) -> Result<()> {
        Ok(())
    }

    fn url(&self) -> String {
        self.site.lock().url.clone()
    }
}

struct ScriptedLocator {
    site: Arc<Mutex<Site>>,
    selector: String,
}

impl ScriptedLocator {
    fn element(&self) -> Result<(String, String)> {
        self.site
            .lock()
            .elements
            .get(&self.selector)
            .cloned()
            .ok_or_else(|| ScriptedDriver::missing(&self.selector))
    }
}

#[async_trait]
impl Locator for ScriptedLocator {
    async fn is_visible(&self) -> Result<bool> {
        Ok(self.element().is_ok())
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.element().map(|_| true)
    }

    async fn text_content(&self) -> Result<Option<String>> {
        self.element().map(|(text, _)| Some(text))
    }

    async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        let (_, value) = self.element()?;
        Ok((name == "value").then_some(value))
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value> {
        let tag = if self.selector == "#submit" { "button" } else { "input" };
        self.element().map(|_| Value::String(tag.to_string()))
    }

    async fn scroll_into_view_if_needed(&self) -> Result<()> {
        self.element().map(|_| ())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scripted_page(session_id: &str) -> Result<Page> {
    Page::builder()
        .url("https://app.example.com")
        .session_id(session_id)
        .driver(Arc::new(ScriptedDriver::new()))
        .build()
}

fn login_flow() -> Result<ComposedAction> {
    ComposedAction::new(vec![
        Arc::new(NavigationAction::new("https://app.example.com/login")?),
        Arc::new(FillAction::new("#user", "ada")?),
        Arc::new(FillAction::new("#pass", "hunter2")?),
        Arc::new(ClickAction::new("#submit")?.with_retry(2)?),
        Arc::new(
            NavigationAction::new("https://app.example.com/dashboard")?
                .with_expected_url_pattern(r"/dashboard$")?,
        ),
    ])
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_login_flow_is_logged_and_exported() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let page = scripted_page("session-login")?;
    let logger = BrowserLogger::new(
        LoggingConfig::default()
            .with_output_path(dir.path().join("logs/session.jsonl"))
            .with_buffer_size(10),
    )?;
    logger.start_logging(&page).await?;

    let result = login_flow()?.execute_with_hooks(&page).await;
    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.data().and_then(|d| d.get("completed_steps")), Some(&Value::from(5)));

    let welcome = WaitAction::for_element("#welcome")?
        .with_condition_text("Welcome back")
        .execute_with_hooks(&page)
        .await;
    assert!(welcome.is_success(), "{}", welcome.summary());
    assert_eq!(page.current_url(), "https://app.example.com/dashboard");

    logger.stop_logging(&page).await?;

    // navigate, clear+fill twice, click, navigate
    let lines: Vec<Value> = fs::read_to_string(logger.output_path())?
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0]["event_type"], "navigation");
    assert_eq!(lines[0]["to_url"], "https://app.example.com/login");
    assert_eq!(lines[1]["action"], "clear");
    assert_eq!(lines[2]["value"], "ada");
    assert_eq!(lines[5]["action"], "click");
    assert_eq!(lines[5]["element_tag"], "button");

    let export_path = dir.path().join("export/session.csv");
    logger.export_logs(&export_path, LogFormat::Csv).await?;

    let mut reader = csv::Reader::from_path(&export_path)?;
    let headers = reader.headers()?.clone();
    assert!(headers.iter().any(|h| h == "event_type"));
    let session_column = headers
        .iter()
        .position(|h| h == "session_id")
        .ok_or_else(|| anyhow::anyhow!("session_id column missing"))?;
    let mut rows = 0;
    for record in reader.records() {
        assert_eq!(&record?[session_column], "session-login");
        rows += 1;
    }
    assert_eq!(rows, 7);

    Ok(())
}

#[tokio::test]
async fn test_failed_step_stops_sequence() -> anyhow::Result<()> {
    init_tracing();
    let page = scripted_page("session-fail")?;
    let clicks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&clicks);
    page.on("interaction", move |_| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let flow = ComposedAction::new(vec![
        Arc::new(FillAction::new("#user", "ada")?.with_clear_first(false)),
        Arc::new(ClickAction::new("#missing")?),
        Arc::new(ClickAction::new("#submit")?),
    ])?;
    let result = flow.execute_with_hooks(&page).await;

    assert!(!result.is_success());
    assert_eq!(result.metadata()["completed_steps"], 1);
    assert_eq!(result.metadata()["failed_step"], 2);
    assert_eq!(result.metadata()["total_steps"], 3);
    assert_eq!(clicks.load(Ordering::SeqCst), 1);
    assert_eq!(page.current_url(), "https://app.example.com");
    Ok(())
}

#[tokio::test]
async fn test_conditional_branch_and_metrics() -> anyhow::Result<()> {
    init_tracing();
    let page = scripted_page("session-branch")?;
    let mut metrics = ActionMetrics::new();

    let already_in = ConditionalAction::new(
        Arc::new(WaitAction::for_element("#welcome")?.with_timeout(Duration::from_secs(1))?),
        Arc::new(NavigationAction::new("https://app.example.com/home")?),
    )
    .with_else(Arc::new(login_flow()?));

    let result = already_in.execute_with_hooks(&page).await;
    metrics.record(&result);
    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.metadata()["condition_result"], false);
    assert_eq!(page.current_url(), "https://app.example.com/dashboard");

    let second = already_in.execute_with_hooks(&page).await;
    metrics.record(&second);
    assert_eq!(second.metadata()["condition_result"], true);
    assert_eq!(page.current_url(), "https://app.example.com/home");

    assert_eq!(metrics.total_actions, 2);
    assert!((metrics.success_rate() - 100.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn test_registry_handlers_reach_new_pages() -> anyhow::Result<()> {
    init_tracing();
    let registry = HandlerRegistry::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    registry.register_global_handler(
        "navigation",
        handler(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    );

    let page = Page::builder()
        .url("https://app.example.com")
        .driver(Arc::new(ScriptedDriver::new()))
        .registry(&registry)
        .build()?;
    page.navigate("https://app.example.com/about", WaitUntil::Load, None)
        .await?;
    page.reload().await?;

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert!(!page.session_id().is_empty());
    Ok(())
}
