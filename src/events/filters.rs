//! Composable event filters.
//!
//! An [`EventFilter`] is a conjunction of optional criteria. Criteria that
//! are not configured do not constrain the event.
//!
//! | Criterion | Matches when |
//! |-----------|--------------|
//! | event types | `event_type` is in the set |
//! | domains | any entry is a substring of the page host (with port), case-insensitive |
//! | selectors | any pattern matches the event's selector |
//! | predicate | the function returns `true` |
//!
//! Selector patterns wrapped in `/…/` are regular expressions, compiled when
//! the filter is built. Anything else, including a pattern that fails to
//! compile, matches as a literal substring. Events without a selector never
//! match selector criteria.
//!
//! Exclude mode inverts the final verdict.
//!
//! # Example
//!
//! ```
//! use browserve::events::{EventFilter, FilterChain, FilterOp, domain_filter, event_type_filter};
//!
//! let interactions = event_type_filter(["interaction"]);
//! let example = domain_filter(["example.com"]);
//!
//! let mut chain = FilterChain::new();
//! chain.add_filter(interactions, FilterOp::And);
//! chain.add_filter(example, FilterOp::And);
//! assert_eq!(chain.len(), 2);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashSet;
use tracing::warn;
use url::Url;

use super::model::{Event, HttpMethod, INTERACTION, InteractionAction, NETWORK_REQUEST};

// ============================================================================
// Types
// ============================================================================

/// Arbitrary filter predicate.
pub type FilterPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

string_enum! {
    /// How a filter combines with the running verdict.
    pub enum FilterOp ("operation") {
        /// Both must accept.
        And => "and",
        /// Either may accept.
        Or => "or",
    }
}

impl FilterOp {
    #[inline]
    fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

// ============================================================================
// EventFilter
// ============================================================================

/// Predicate over events.
///
/// Cheap to clone; clones share identity (see [`EventFilter::ptr_eq`]).
#[derive(Clone)]
pub struct EventFilter {
    inner: Arc<FilterInner>,
}

struct FilterInner {
    event_types: FxHashSet<String>,
    domains: Vec<String>,
    selectors: Vec<SelectorPattern>,
    predicate: Option<FilterPredicate>,
    exclude_mode: bool,
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<&String> = self.inner.event_types.iter().collect();
        event_types.sort_unstable();
        f.debug_struct("EventFilter")
            .field("event_types", &event_types)
            .field("domains", &self.inner.domains)
            .field(
                "selectors",
                &self.inner.selectors.iter().map(SelectorPattern::as_str).collect::<Vec<_>>(),
            )
            .field("predicate", &self.inner.predicate.is_some())
            .field("exclude_mode", &self.inner.exclude_mode)
            .finish()
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        EventFilterBuilder::default().build()
    }
}

impl EventFilter {
    /// Creates a filter that accepts every event.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building a filter.
    #[inline]
    #[must_use]
    pub fn builder() -> EventFilterBuilder {
        EventFilterBuilder::default()
    }

    /// Creates a filter backed only by a predicate.
    #[must_use]
    pub fn from_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self::builder().predicate(predicate).build()
    }

    /// Returns `true` if the event passes this filter.
    #[must_use]
    pub fn should_process(&self, event: &Event) -> bool {
        let matches = self.matches_criteria(event);
        matches != self.inner.exclude_mode
    }

    /// Returns `true` if this filter inverts its verdict.
    #[inline]
    #[must_use]
    pub fn is_exclusion(&self) -> bool {
        self.inner.exclude_mode
    }

    /// Returns `true` if both handles refer to the same filter.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Combines two filters into a new one.
    ///
    /// Both inputs stay independently usable.
    #[must_use]
    pub fn combine_with(&self, other: &Self, op: FilterOp) -> Self {
        let left = self.clone();
        let right = other.clone();
        Self::from_predicate(move |event| {
            op.apply(left.should_process(event), right.should_process(event))
        })
    }

    fn matches_criteria(&self, event: &Event) -> bool {
        let inner = &self.inner;

        if !inner.event_types.is_empty() && !inner.event_types.contains(event.event_type()) {
            return false;
        }

        if !inner.domains.is_empty() && !self.matches_domain(event) {
            return false;
        }

        if !inner.selectors.is_empty() && !self.matches_selector(event) {
            return false;
        }

        if let Some(predicate) = &inner.predicate
            && !predicate(event)
        {
            return false;
        }

        true
    }

    fn matches_domain(&self, event: &Event) -> bool {
        let Some(host) = page_host(event.page_url()) else {
            return false;
        };
        self.inner.domains.iter().any(|domain| host.contains(domain.as_str()))
    }

    fn matches_selector(&self, event: &Event) -> bool {
        match event.selector() {
            Some(selector) if !selector.is_empty() => self
                .inner
                .selectors
                .iter()
                .any(|pattern| pattern.is_match(selector)),
            _ => false,
        }
    }
}

impl BitAnd for EventFilter {
    type Output = EventFilter;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.combine_with(&rhs, FilterOp::And)
    }
}

impl BitOr for EventFilter {
    type Output = EventFilter;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.combine_with(&rhs, FilterOp::Or)
    }
}

/// Returns the lowercased `host[:port]` of a URL, or `None` if it does not
/// parse.
fn page_host(page_url: &str) -> Option<String> {
    let parsed = Url::parse(page_url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Compiled selector criterion.
enum SelectorPattern {
    Regex(Regex),
    Literal(String),
}

impl SelectorPattern {
    fn compile(selector: &str) -> Self {
        let Some(pattern) = selector
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        else {
            return Self::Literal(selector.to_string());
        };

        match Regex::new(pattern) {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                warn!(selector, error = %e, "Invalid selector regex, matching literally");
                Self::Literal(selector.to_string())
            }
        }
    }

    #[inline]
    fn is_match(&self, selector: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(selector),
            Self::Literal(literal) => selector.contains(literal.as_str()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Regex(regex) => regex.as_str(),
            Self::Literal(literal) => literal,
        }
    }
}

// ============================================================================
// EventFilterBuilder
// ============================================================================

/// Builder for [`EventFilter`].
#[derive(Default)]
pub struct EventFilterBuilder {
    event_types: Vec<String>,
    domains: Vec<String>,
    selectors: Vec<String>,
    predicate: Option<FilterPredicate>,
    exclude_mode: bool,
}

impl EventFilterBuilder {
    /// Restricts to the given event types.
    #[must_use]
    pub fn event_types(mut self, event_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.event_types.extend(event_types.into_iter().map(Into::into));
        self
    }

    /// Restricts to pages whose host contains one of `domains`.
    #[must_use]
    pub fn domains(mut self, domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.domains.extend(domains.into_iter().map(Into::into));
        self
    }

    /// Restricts to events whose selector matches one of `selectors`.
    #[must_use]
    pub fn selectors(mut self, selectors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.selectors.extend(selectors.into_iter().map(Into::into));
        self
    }

    /// Adds an arbitrary predicate.
    #[must_use]
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Inverts the verdict.
    #[inline]
    #[must_use]
    pub fn exclude(mut self) -> Self {
        self.exclude_mode = true;
        self
    }

    /// Builds the filter, compiling selector patterns.
    #[must_use]
    pub fn build(self) -> EventFilter {
        EventFilter {
            inner: Arc::new(FilterInner {
                event_types: self.event_types.into_iter().collect(),
                domains: self.domains.iter().map(|d| d.to_lowercase()).collect(),
                selectors: self.selectors.iter().map(|s| SelectorPattern::compile(s)).collect(),
                predicate: self.predicate,
                exclude_mode: self.exclude_mode,
            }),
        }
    }
}

// ============================================================================
// FilterChain
// ============================================================================

/// Left-to-right sequence of filters.
///
/// The verdict starts as the first filter's result; each later filter is
/// combined with the running verdict using its own operation. Every filter
/// is evaluated. An empty chain accepts everything.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<(EventFilter, FilterOp)>,
}

impl FilterChain {
    /// Creates an empty chain.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain starting with `filter`.
    #[must_use]
    pub fn with_filter(filter: EventFilter) -> Self {
        Self {
            filters: vec![(filter, FilterOp::And)],
        }
    }

    /// Appends a filter.
    pub fn add_filter(&mut self, filter: EventFilter, op: FilterOp) -> &mut Self {
        self.filters.push((filter, op));
        self
    }

    /// Evaluates the chain.
    #[must_use]
    pub fn should_process(&self, event: &Event) -> bool {
        let Some(((first, _), rest)) = self.filters.split_first() else {
            return true;
        };

        rest.iter().fold(first.should_process(event), |verdict, (filter, op)| {
            op.apply(verdict, filter.should_process(event))
        })
    }

    /// Returns the number of filters.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if the chain has no filters.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

// ============================================================================
// Helper Constructors
// ============================================================================

/// Accepts events from pages whose host contains one of `domains`.
#[must_use]
pub fn domain_filter(domains: impl IntoIterator<Item = impl Into<String>>) -> EventFilter {
    EventFilter::builder().domains(domains).build()
}

/// Accepts interaction events with one of `actions`.
#[must_use]
pub fn action_filter(actions: impl IntoIterator<Item = InteractionAction>) -> EventFilter {
    let actions: Vec<InteractionAction> = actions.into_iter().collect();
    EventFilter::builder()
        .event_types([INTERACTION])
        .predicate(move |event| match event {
            Event::Interaction(interaction) => actions.contains(&interaction.action()),
            _ => false,
        })
        .build()
}

/// Accepts events whose selector matches one of `selectors`.
#[must_use]
pub fn selector_filter(selectors: impl IntoIterator<Item = impl Into<String>>) -> EventFilter {
    EventFilter::builder().selectors(selectors).build()
}

/// Accepts events of the given types.
#[must_use]
pub fn event_type_filter(event_types: impl IntoIterator<Item = impl Into<String>>) -> EventFilter {
    EventFilter::builder().event_types(event_types).build()
}

/// Rejects events matching every configured criterion.
///
/// Empty lists leave that criterion unconstrained.
#[must_use]
pub fn exclusion_filter(event_types: &[&str], domains: &[&str], selectors: &[&str]) -> EventFilter {
    EventFilter::builder()
        .event_types(event_types.iter().copied())
        .domains(domains.iter().copied())
        .selectors(selectors.iter().copied())
        .exclude()
        .build()
}

/// Accepts network events by method, status, and minimum response size.
///
/// Empty lists and `None` leave that criterion unconstrained. Events lacking
/// a status or size are not rejected by that criterion.
#[must_use]
pub fn network_filter(
    methods: &[HttpMethod],
    status_codes: &[u16],
    min_size: Option<u64>,
) -> EventFilter {
    let methods = methods.to_vec();
    let status_codes = status_codes.to_vec();

    EventFilter::builder()
        .event_types([NETWORK_REQUEST])
        .predicate(move |event| {
            let Event::Network(request) = event else {
                return false;
            };

            if !methods.is_empty() && !methods.contains(&request.method()) {
                return false;
            }

            if !status_codes.is_empty()
                && let Some(status) = request.status_code()
                && !status_codes.contains(&status)
            {
                return false;
            }

            if let (Some(min), Some(size)) = (min_size, request.response_size())
                && size < min
            {
                return false;
            }

            true
        })
        .build()
}

/// Accepts events with `start <= timestamp < end`.
#[must_use]
pub fn time_range_filter(start: f64, end: f64) -> EventFilter {
    EventFilter::from_predicate(move |event| {
        let timestamp = event.timestamp();
        start <= timestamp && timestamp < end
    })
}

// ============================================================================
// Tests
// ============================================================================
