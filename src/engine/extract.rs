use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::Selectors;

pub const MISSING_SENTINEL: &str = "N/A";
pub const ERROR_SENTINEL: &str = "Error";

/// Outcome of extracting a single field from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    Missing,
    Failed(String),
}

impl FieldValue {
    pub fn found(&self) -> Option<&str> {
        match self {
            FieldValue::Found(v) => Some(v),
            _ => None,
        }
    }

    /// Human-readable form, collapsing non-values to the short sentinels.
    pub fn as_display(&self) -> &str {
        match self {
            FieldValue::Found(v) => v,
            FieldValue::Missing => MISSING_SENTINEL,
            FieldValue::Failed(_) => ERROR_SENTINEL,
        }
    }
}

/// Identifier → extracted value, one entry per selector.
pub type FieldValues = BTreeMap<String, FieldValue>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// The parts of a matched node that extraction looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub text: String,
    pub value: Option<String>,
    pub content: Option<String>,
}

impl NodeSnapshot {
    /// Text content, then form value, then the `content` attribute; first non-blank wins.
    pub fn extract(&self) -> FieldValue {
        [
            Some(self.text.as_str()),
            self.value.as_deref(),
            self.content.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(|v| FieldValue::Found(v.to_string()))
        .unwrap_or(FieldValue::Missing)
    }
}

/// A queryable page. Only the first match of a selector is ever used.
pub trait Document {
    fn query_selector(&self, selector: &str) -> Result<Option<NodeSnapshot>, SelectorError>;
}

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }
}

impl Document for HtmlDocument {
    fn query_selector(&self, selector: &str) -> Result<Option<NodeSnapshot>, SelectorError> {
        let parsed = Selector::parse(selector).map_err(|e| SelectorError {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.html.select(&parsed).next().map(snapshot))
    }
}

fn snapshot(el: ElementRef<'_>) -> NodeSnapshot {
    NodeSnapshot {
        text: el.text().collect(),
        value: form_value(el),
        content: el.value().attr("content").map(str::to_string),
    }
}

fn form_value(el: ElementRef<'_>) -> Option<String> {
    match el.value().name() {
        "input" | "button" | "option" | "data" | "param" => {
            el.value().attr("value").map(str::to_string)
        }
        "textarea" => Some(el.text().collect()),
        "select" => {
            let options = Selector::parse("option").ok()?;
            let chosen = el
                .select(&options)
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| el.select(&options).next())?;
            Some(
                chosen
                    .value()
                    .attr("value")
                    .map(str::to_string)
                    .unwrap_or_else(|| chosen.text().collect()),
            )
        }
        _ => None,
    }
}

/// Extracts every selector independently; a bad selector only affects its own field.
pub fn scrape<D: Document + ?Sized>(selectors: &Selectors, doc: &D) -> FieldValues {
    selectors
        .iter()
        .map(|(key, selector)| {
            let value = match doc.query_selector(selector) {
                Ok(Some(node)) => node.extract(),
                Ok(None) => FieldValue::Missing,
                Err(e) => {
                    warn!(field = %key, "{}", e);
                    FieldValue::Failed(e.to_string())
                }
            };
            debug!(field = %key, selector = %selector, value = value.as_display(), "extracted");
            (key.clone(), value)
        })
        .collect()
}

// ── Tests ──
