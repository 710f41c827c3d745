use crate::models::Record;
use crate::scrapers::clean::{
    clean_address, clean_phone, clean_website, collapse_whitespace, detect_services, find_email,
};
use crate::scrapers::types::ExtractError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use tracing::debug;

/// Record field a rule chain fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Address,
    Phone,
    Website,
    Email,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::Address => "address",
            Field::Phone => "phone",
            Field::Website => "website",
            Field::Email => "email",
        };
        f.write_str(name)
    }
}

/// Where a rule looks
#[derive(Debug, Clone)]
pub enum Scope {
    /// First element matching the CSS selector
    Element(String),
    /// Text of the whole document body
    Document,
}

/// How a rule reads a raw value out of its scope
#[derive(Debug, Clone)]
pub enum Strategy {
    Text,
    Attribute(String),
    Pattern { regex: Regex, attribute: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub scope: Scope,
    pub strategy: Strategy,
}

impl ExtractionRule {
    pub fn text(selector: &str) -> Self {
        Self {
            scope: Scope::Element(selector.to_string()),
            strategy: Strategy::Text,
        }
    }

    pub fn attribute(selector: &str, attribute: &str) -> Self {
        Self {
            scope: Scope::Element(selector.to_string()),
            strategy: Strategy::Attribute(attribute.to_string()),
        }
    }

    /// Regex match against the element's text
    pub fn pattern(selector: &str, regex: &Regex) -> Self {
        Self {
            scope: Scope::Element(selector.to_string()),
            strategy: Strategy::Pattern {
                regex: regex.clone(),
                attribute: None,
            },
        }
    }

    /// Regex match against one attribute of the element
    pub fn attribute_pattern(selector: &str, attribute: &str, regex: &Regex) -> Self {
        Self {
            scope: Scope::Element(selector.to_string()),
            strategy: Strategy::Pattern {
                regex: regex.clone(),
                attribute: Some(attribute.to_string()),
            },
        }
    }

    /// Regex match against the document text
    pub fn document_pattern(regex: &Regex) -> Self {
        Self {
            scope: Scope::Document,
            strategy: Strategy::Pattern {
                regex: regex.clone(),
                attribute: None,
            },
        }
    }

    /// Raw value this rule reads, `None` when its target is absent.
    pub fn raw_value(&self, document: &Html) -> Result<Option<String>, ExtractError> {
        let haystack = match &self.scope {
            Scope::Element(selector) => {
                let selector = parse_selector(selector)?;
                let Some(element) = document.select(&selector).next() else {
                    return Ok(None);
                };
                match &self.strategy {
                    Strategy::Text | Strategy::Pattern { attribute: None, .. } => element_text(&element),
                    Strategy::Attribute(name) | Strategy::Pattern { attribute: Some(name), .. } => {
                        match element.value().attr(name) {
                            Some(value) => value.to_string(),
                            None => return Ok(None),
                        }
                    }
                }
            }
            Scope::Document => document_text(document),
        };

        let value = match &self.strategy {
            Strategy::Pattern { regex, .. } => regex.find(&haystack).map(|m| m.as_str().to_string()),
            Strategy::Text | Strategy::Attribute(_) => Some(haystack),
        };
        Ok(value.filter(|v| !v.trim().is_empty()))
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Text of `<body>`, or of the whole tree when the document has none.
pub fn document_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());
    root.text().collect::<Vec<_>>().join(" ")
}

/// Normalisation step attached to a field
#[derive(Debug, Clone)]
pub enum Cleaner {
    Text,
    Address { bullets: String },
    Phone,
    Website { own_domain: String },
    Email,
}

impl Cleaner {
    pub fn apply(&self, raw: &str) -> Option<String> {
        let cleaned = match self {
            Cleaner::Text => collapse_whitespace(raw),
            Cleaner::Address { bullets } => clean_address(raw, bullets),
            Cleaner::Phone => clean_phone(raw)?,
            Cleaner::Website { own_domain } => clean_website(raw, own_domain)?,
            Cleaner::Email => find_email(raw)?,
        };
        (!cleaned.is_empty()).then_some(cleaned)
    }
}

/// Ordered fallback rules for one field
#[derive(Debug, Clone)]
pub struct RuleChain {
    pub field: Field,
    pub rules: Vec<ExtractionRule>,
    pub cleaner: Cleaner,
}

impl RuleChain {
    pub fn new(field: Field, cleaner: Cleaner, rules: Vec<ExtractionRule>) -> Self {
        Self { field, rules, cleaner }
    }

    /// First non-empty cleaned value along the chain
    pub fn extract(&self, document: &Html) -> Result<Option<String>, ExtractError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(raw) = rule.raw_value(document)? {
                if let Some(value) = self.cleaner.apply(&raw) {
                    debug!("{} resolved by rule #{}", self.field, index);
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }
}

/// Everything needed to turn a detail document into a record
#[derive(Debug, Clone)]
pub struct RecordRules {
    pub name: RuleChain,
    pub address: RuleChain,
    pub phone: RuleChain,
    pub website: RuleChain,
    pub email: RuleChain,
    pub services: Vec<String>,
}

impl RecordRules {
    pub fn extract(&self, document: &Html) -> Result<Record, ExtractError> {
        Ok(Record {
            name: self.name.extract(document)?.unwrap_or_default(),
            address: self.address.extract(document)?,
            phone: self.phone.extract(document)?,
            website: self.website.extract(document)?,
            email: self.email.extract(document)?,
            services: detect_services(&document_text(document), &self.services),
        })
    }
}
