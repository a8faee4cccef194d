//! Post-processing of harvested contacts: location parsing, geocoding, and
//! title normalization.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::PersonRecord;
use crate::store::write_json_atomic;
use crate::traits::{Coordinates, Geocoder};

static SYMBOLS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{10000}-\x{10FFFF}]|[*#@&<>\\/]").expect("valid symbol regex")
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9]+\b").expect("valid word regex"));

const SYNONYMS_ES: &[(&str, &[&str])] = &[
    ("Estudiante", &["Alumno", "Aprendiz"]),
    ("Universidad", &["Uni", "Facultad"]),
    ("Ingeniero", &["Engineer", "Eng."]),
    ("Desarrollador", &["Developer", "Dev"]),
];

const SYNONYMS_EN: &[(&str, &[&str])] = &[
    ("Student", &["Learner", "Pupil"]),
    ("University", &["College", "Faculty"]),
    ("Engineer", &["Ingeniero", "Eng."]),
    ("Developer", &["Desarrollador", "Dev"]),
];

static SYNONYM_RULES_ES: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| compile_synonyms(SYNONYMS_ES));
static SYNONYM_RULES_EN: LazyLock<Vec<(Regex, &'static str)>> =
    LazyLock::new(|| compile_synonyms(SYNONYMS_EN));

fn compile_synonyms(table: &[(&'static str, &[&str])]) -> Vec<(Regex, &'static str)> {
    table
        .iter()
        .flat_map(|(canonical, variants)| {
            variants.iter().map(move |variant| {
                let tail = if variant.ends_with(|c: char| c.is_alphanumeric()) {
                    r"\b"
                } else {
                    ""
                };
                let pattern = format!(r"(?i)\b{}{tail}", regex::escape(variant));
                let re = Regex::new(&pattern).expect("valid synonym regex");
                (re, *canonical)
            })
        })
        .collect()
}

/// Job categories, checked in order; the first keyword hit wins.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Data Science",
        &[
            "Data", "Machine Learning", "ETL", "Power BI", "Analytics", "Pandas", "AI",
            "Deep Learning", "Big Data", "Analista de Datos", "Ciencia de Datos",
            "Inteligencia Artificial", "Análisis Predictivo",
        ],
    ),
    (
        "Engineering",
        &[
            "Engineer", "Desarrollador", "Developer", "Backend", "Frontend", "Software",
            "Fullstack", "Cloud", "Arquitecto de Software", "Ingeniero", "DevOps",
        ],
    ),
    (
        "Programming Languages",
        &[
            "Python", "JavaScript", "Java", "C#", "C++", "Ruby", "PHP", "Go", "Swift", "Kotlin",
            "TypeScript", "SQL", "Perl", "Rust", "Matlab", "Scala", "Lenguajes de Programación",
            "Programador Java",
        ],
    ),
    (
        "Cybersecurity",
        &[
            "Cybersecurity", "Pentesting", "SOC", "Blue Team", "Red Team", "Incident Response",
            "Threat", "SIEM", "MITRE", "Ciberseguridad", "Seguridad Informática",
            "Analista de Seguridad", "Hacking Ético", "Ethical Hacking", "Auditor de Seguridad",
        ],
    ),
    (
        "Marketing",
        &[
            "SEO", "Marketing", "Content", "Social Media", "Growth", "Advertising", "Brand",
            "Digital", "Publicidad", "Mercadeo", "Estrategia de Marca",
        ],
    ),
    (
        "Operations",
        &[
            "Operations", "Supply Chain", "Logistics", "Project Management",
            "Process Improvement", "Operaciones", "Cadena de Suministro", "Logística",
            "Gestión de Proyectos", "Mejora de Procesos",
        ],
    ),
    (
        "Human Resources",
        &[
            "HR", "Talent", "Recruitment", "People", "Payroll", "Employee", "Recursos Humanos",
            "Gestión de Talento", "Selección", "Gestión de Personas",
        ],
    ),
    (
        "Finance",
        &[
            "Finance", "Financial", "Accounting", "Auditor", "Investment", "Banking", "Treasury",
            "Finanzas", "Contabilidad", "Auditoría", "Inversiones", "Banca", "Asesor Financiero",
        ],
    ),
    (
        "Education",
        &[
            "Teacher", "Professor", "Educator", "Trainer", "Learning", "Instructor", "Docente",
            "Profesor", "Educador", "Formador", "Tutor", "Catedrático", "Maestro",
            "Coach Educativo", "Pedagogo", "Capacitación", "Entrenador de Habilidades",
        ],
    ),
    (
        "Health",
        &[
            "Healthcare", "Doctor", "Nurse", "Therapist", "Pharmacist", "Medical", "Salud",
            "Médico", "Enfermero", "Terapeuta", "Farmacéutico", "Psiquiatra", "Fisioterapeuta",
        ],
    ),
    (
        "Legal",
        &[
            "Lawyer", "Attorney", "Legal", "Compliance", "Contract", "Abogado", "Jurídico",
            "Cumplimiento", "Contrato", "Consultor Legal",
        ],
    ),
    (
        "Creative",
        &[
            "Designer", "Illustrator", "Photographer", "Videographer", "Art", "Creative",
            "Diseñador", "Ilustrador", "Fotógrafo", "Videógrafo", "Arte", "Creativo",
            "Animador 3D",
        ],
    ),
    (
        "Sales",
        &[
            "Sales", "Business Development", "Account Manager", "Customer", "Lead Generation",
            "Ventas", "Desarrollo de Negocios", "Gestión de Cuentas", "Representante de Ventas",
        ],
    ),
    (
        "IT Support",
        &[
            "IT Support", "Helpdesk", "Service Desk", "Technical Support", "System Admin",
            "Soporte IT", "Informatico", "Administrador de Sistemas", "Soporte Técnico",
        ],
    ),
    (
        "Manufacturing",
        &[
            "Production", "Manufacturing", "Factory", "Quality Control", "Producción",
            "Fábrica", "Control de Calidad", "Gestión de Producción",
        ],
    ),
    (
        "Consulting",
        &[
            "Consultant", "Advisory", "Strategy", "Business Analysis", "Consultoría",
            "Estrategia", "Análisis de Negocios", "Asesor",
        ],
    ),
    (
        "Freelance/Independent",
        &[
            "Freelance", "Self-employed", "Independent", "Autónomo", "Independiente",
            "Consultor Independiente",
        ],
    ),
    (
        "Customer Service",
        &[
            "Customer Service", "Support Specialist", "Atención al Cliente",
            "Especialista en Soporte", "Soporte al Cliente",
        ],
    ),
    (
        "Public Sector",
        &[
            "Public Sector", "Government", "Nonprofit", "Sector Público", "Gobierno",
            "Organización sin Fines de Lucro", "ONG",
        ],
    ),
    (
        "Entrepreneurship",
        &[
            "Entrepreneur", "Startup", "Founder", "Co-Founder", "Emprendimiento", "Empresario",
            "Fundador",
        ],
    ),
    (
        "Agriculture",
        &["Agriculture", "Farming", "Agronomist", "Agricultura", "Granja", "Agrónomo"],
    ),
];

pub const OTHER_CATEGORY: &str = "Other";

/// Language whose synonym table normalizes titles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    fn synonym_rules(&self) -> &'static [(Regex, &'static str)] {
        match self {
            Language::Es => &SYNONYM_RULES_ES,
            Language::En => &SYNONYM_RULES_EN,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Es => f.write_str("es"),
            Language::En => f.write_str("en"),
        }
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Language::Es),
            "en" => Ok(Language::En),
            other => Err(AppError::ConfigError(format!(
                "Unsupported language '{other}', expected 'es' or 'en'"
            ))),
        }
    }
}

/// `City, Region, Country` split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationParts {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

/// A person record with the derived fields added by the cleaner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedPerson {
    #[serde(flatten)]
    pub record: PersonRecord,
    #[serde(default)]
    pub cleaned_location: LocationParts,
    #[serde(default)]
    pub location_coordinates: Coordinates,
    #[serde(default)]
    pub cleaned_title: Vec<String>,
    #[serde(default = "other_category")]
    pub title_category: String,
    #[serde(default)]
    pub title_keywords: Vec<String>,
}

fn other_category() -> String {
    OTHER_CATEGORY.to_string()
}

/// Cleaner output file: `{"persons": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedDocument {
    #[serde(default)]
    pub persons: Vec<CleanedPerson>,
}

impl CleanedDocument {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::IoError(format!("Failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::ParseError(format!("Invalid JSON in {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        write_json_atomic(path, self)
    }
}

/// Split on `", "` into up to three parts. Extra parts are ignored.
pub fn split_location(location: &str) -> LocationParts {
    if location.is_empty() {
        return LocationParts::default();
    }
    let mut parts = location.split(", ").map(str::to_string);
    LocationParts {
        city: parts.next(),
        region: parts.next(),
        country: parts.next(),
    }
}

/// Drop astral-plane characters (emoji) and `*#@&<>\/`.
pub fn strip_symbols(text: &str) -> String {
    SYMBOLS_RE.replace_all(text, "").into_owned()
}

/// Title split on `|`, stripped of symbols, with synonyms normalized.
pub fn clean_title(title: &str, language: Language) -> Vec<String> {
    title
        .split('|')
        .map(|part| strip_symbols(part).trim().to_string())
        .filter(|part| !part.is_empty())
        .map(|part| {
            language
                .synonym_rules()
                .iter()
                .fold(part, |text, (re, canonical)| {
                    re.replace_all(&text, *canonical).into_owned()
                })
        })
        .collect()
}

/// Distinct ASCII alphanumeric words, sorted.
pub fn extract_keywords(title: &str) -> Vec<String> {
    WORD_RE
        .find_iter(title)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// First category with a case-insensitive keyword hit, else `Other`.
pub fn classify_title(title: &str) -> &'static str {
    let lowered = title.to_lowercase();
    if lowered.is_empty() {
        return OTHER_CATEGORY;
    }
    CATEGORIES
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| lowered.contains(k.to_lowercase().as_str()))
        })
        .map(|(category, _)| *category)
        .unwrap_or(OTHER_CATEGORY)
}

/// Turns harvested [`PersonRecord`]s into [`CleanedPerson`]s.
pub struct CleanService<G: Geocoder> {
    geocoder: G,
    language: Language,
    geocode_delay: Duration,
}

impl<G: Geocoder> CleanService<G> {
    /// Lookups are spaced one second apart, the public Nominatim limit.
    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder,
            language: Language::default(),
            geocode_delay: Duration::from_secs(1),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_geocode_delay(mut self, delay: Duration) -> Self {
        self.geocode_delay = delay;
        self
    }

    /// Derived fields that need no network access.
    pub fn clean_offline(&self, record: &PersonRecord) -> CleanedPerson {
        CleanedPerson {
            record: record.clone(),
            cleaned_location: split_location(&record.location),
            location_coordinates: Coordinates::default(),
            cleaned_title: clean_title(&record.title, self.language),
            title_category: classify_title(&record.title).to_string(),
            title_keywords: extract_keywords(&record.title),
        }
    }

    /// Clean every record in order, geocoding each non-empty location.
    pub async fn clean_all(&self, records: &[PersonRecord]) -> Vec<CleanedPerson> {
        let mut cleaned = Vec::with_capacity(records.len());
        let mut lookups = 0usize;

        for record in records {
            let mut person = self.clean_offline(record);
            if !record.location.is_empty() {
                if lookups > 0 && !self.geocode_delay.is_zero() {
                    tokio::time::sleep(self.geocode_delay).await;
                }
                lookups += 1;
                person.location_coordinates = self.locate(&record.location).await;
            }
            cleaned.push(person);
        }

        tracing::info!(persons = cleaned.len(), lookups, "Cleaned contacts");
        cleaned
    }

    /// Geocode with a single retry on transient errors. Failure yields nulls.
    async fn locate(&self, location: &str) -> Coordinates {
        let mut result = self.geocoder.geocode(location).await;
        if let Err(e) = &result
            && e.is_retryable()
        {
            tracing::debug!(%location, error = %e, "Retrying geocode");
            tokio::time::sleep(self.geocode_delay).await;
            result = self.geocoder.geocode(location).await;
        }

        match result {
            Ok(Some(coords)) => coords,
            Ok(None) => {
                tracing::debug!(%location, "Location not found");
                Coordinates::default()
            }
            Err(e) => {
                tracing::warn!(%location, error = %e, "Geocoding failed");
                Coordinates::default()
            }
        }
    }
}
