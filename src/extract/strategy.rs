use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// A fetched page parsed once and shared by all strategies.
pub struct Document<'a> {
    raw: &'a str,
    html: Html,
    text: String,
}

impl<'a> Document<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let html = Html::parse_document(raw);
        let text = visible_text(&html);
        Self { raw, html, text }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Text nodes outside `<script>`/`<style>`, joined by single spaces.
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn visible_text(html: &Html) -> String {
    let mut parts = Vec::new();
    for node in html.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"));
        let trimmed = text.trim();
        if !hidden && !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

/// A named way of locating the rate text in a document.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub find: fn(&Document<'_>) -> Option<String>,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Strategy").field(&self.name).finish()
    }
}

/// Strategies in the order they are tried: most specific markup first.
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy {
            name: "fx-to element",
            find: fx_to_element,
        },
        Strategy {
            name: "conversion sentence",
            find: conversion_sentence,
        },
        Strategy {
            name: "embedded json",
            find: embedded_json,
        },
        Strategy {
            name: "ars amount",
            find: ars_amount,
        },
    ]
}

static CONVERSION_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.,])1(?:[.,]0+)?\s*EUR\s*=\s*(\d[\d.,\s]*?)\s*ARS\b")
        .expect("conversion sentence regex is valid")
});

static EMBEDDED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(?:exchange_?rate|fx_?rate|conversion_?rate)"\s*:\s*"?(\d[\d.,]*)"#)
        .expect("embedded json regex is valid")
});

static ARS_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^\d.,\s])\s*(\d{1,3}(?:[ \x{00A0}\x{202F}]\d{3})+\b(?:[.,]\d+)?|\d(?:[\d.,]*\d)?)\s*ARS\b",
    )
    .expect("ars amount regex is valid")
});

/// Text of the converter's "to" amount element.
fn fx_to_element(doc: &Document<'_>) -> Option<String> {
    let selector = Selector::parse(".fx-to").ok()?;
    doc.html()
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .find(|text| !text.is_empty())
}

/// `1 EUR = 1.688,55 ARS` anywhere in the visible text.
fn conversion_sentence(doc: &Document<'_>) -> Option<String> {
    capture(&CONVERSION_SENTENCE, doc.text())
}

/// Rate field of a JSON blob inlined in the markup, e.g. `"exchangeRate": 1688.559`.
fn embedded_json(doc: &Document<'_>) -> Option<String> {
    capture(&EMBEDDED_JSON, doc.raw())
}

/// Last resort: the first whole number directly followed by `ARS`.
fn ars_amount(doc: &Document<'_>) -> Option<String> {
    capture(&ARS_AMOUNT, doc.text())
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|s| !s.is_empty())
}
