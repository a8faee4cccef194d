//! Summary statistics over cleaned contacts.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::clean::CleanedPerson;

static TITLE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

const STOPWORDS: &[&str] = &[
    "and", "of", "in", "on", "at", "to", "for", "with", "a", "an", "the", "de", "en", "y", "el",
    "la", "los", "las",
];

/// Regions reported under a province name.
const REGION_ALIASES: &[(&str, &str)] = &[
    ("Community of Madrid", "Madrid"),
    ("Catalonia", "Barcelona"),
];

/// Contact fields whose presence is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Email,
    Phone,
    Website,
}

impl ContactField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::Website => "website",
        }
    }

    fn value<'a>(&self, person: &'a CleanedPerson) -> &'a str {
        match self {
            ContactField::Email => &person.record.email,
            ContactField::Phone => &person.record.phone,
            ContactField::Website => &person.record.website,
        }
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10_000.0).round() / 100.0
}

fn distribution<'a>(
    persons: &'a [CleanedPerson],
    key: impl Fn(&'a CleanedPerson) -> Option<&'a str>,
) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in persons.iter().filter_map(key).filter(|v| !v.is_empty()) {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(k, n)| (k, percent(n, persons.len())))
        .collect()
}

/// Percent of all persons per region, with province aliases applied.
///
/// Persons without a region count in the denominator only.
pub fn region_distribution(persons: &[CleanedPerson]) -> BTreeMap<String, f64> {
    distribution(persons, |p| {
        p.cleaned_location.region.as_deref().map(|region| {
            REGION_ALIASES
                .iter()
                .find(|(alias, _)| *alias == region)
                .map(|(_, province)| *province)
                .unwrap_or(region)
        })
    })
}

/// Percent of all persons per country.
pub fn country_distribution(persons: &[CleanedPerson]) -> BTreeMap<String, f64> {
    distribution(persons, |p| p.cleaned_location.country.as_deref())
}

/// Percent of persons with a non-empty `field`; 0 for no persons.
pub fn completion_percentage(persons: &[CleanedPerson], field: ContactField) -> f64 {
    let filled = persons
        .iter()
        .filter(|p| !field.value(p).trim().is_empty())
        .count();
    percent(filled, persons.len())
}

/// The `n` most frequent lowercase title words, stopwords excluded.
///
/// Ties are broken alphabetically.
pub fn top_title_keywords(persons: &[CleanedPerson], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for title in persons.iter().flat_map(|p| p.cleaned_title.iter()) {
        let lowered = title.to_lowercase();
        for word in TITLE_WORD_RE.find_iter(&lowered).map(|m| m.as_str()) {
            if !STOPWORDS.contains(&word) {
                *counts.entry(word.to_string()).or_default() += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub email: f64,
    pub phone: f64,
    pub website: f64,
}

/// Everything `analyze` prints, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub total_persons: usize,
    pub regions: BTreeMap<String, f64>,
    pub countries: BTreeMap<String, f64>,
    pub completion: Completion,
    pub top_keywords: Vec<KeywordCount>,
}

impl AnalyticsReport {
    pub fn build(persons: &[CleanedPerson], top_n: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            total_persons: persons.len(),
            regions: region_distribution(persons),
            countries: country_distribution(persons),
            completion: Completion {
                email: completion_percentage(persons, ContactField::Email),
                phone: completion_percentage(persons, ContactField::Phone),
                website: completion_percentage(persons, ContactField::Website),
            },
            top_keywords: top_title_keywords(persons, top_n)
                .into_iter()
                .map(|(keyword, count)| KeywordCount { keyword, count })
                .collect(),
        }
    }
}
