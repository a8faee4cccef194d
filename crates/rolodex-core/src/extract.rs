//! Best-effort contact field extraction.
//!
//! Each field is read by its own [`FieldProbe`]. A probe that fails for any
//! reason (selector absent, page shaped differently, protocol hiccup) yields
//! an empty value for that field only; extraction as a whole never fails.

use crate::error::AppError;
use crate::models::PersonRecord;
use crate::session::BrowserSession;

/// Section element holding one labelled contact detail (Phone, Email, ...).
pub const CONTACT_TYPE_SECTION: &str = ".pv-contact-info__contact-type";

/// A Person Record field filled by extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Website,
    Phone,
    Email,
    Birthday,
    Title,
    Address,
    Location,
    Photo,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Website => "website",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::Birthday => "birthday",
            Field::Title => "title",
            Field::Address => "address",
            Field::Location => "location",
            Field::Photo => "photo",
        }
    }

    fn assign(&self, record: &mut PersonRecord, value: String) {
        let slot = match self {
            Field::Name => &mut record.name,
            Field::Website => &mut record.website,
            Field::Phone => &mut record.phone,
            Field::Email => &mut record.email,
            Field::Birthday => &mut record.birthday,
            Field::Title => &mut record.title,
            Field::Address => &mut record.address,
            Field::Location => &mut record.location,
            Field::Photo => &mut record.photo,
        };
        *slot = value;
    }
}

/// How a field is located on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Text of the first element matching the selector.
    Text(&'static str),
    /// Attribute of the first element matching the selector.
    Attribute {
        selector: &'static str,
        name: &'static str,
    },
    /// Text of the `value` descendant inside the `container` whose `h3`
    /// reads exactly `heading`.
    Section {
        container: &'static str,
        heading: &'static str,
        value: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProbe {
    pub field: Field,
    pub probe: Probe,
}

const fn section(field: Field, heading: &'static str, value: &'static str) -> FieldProbe {
    FieldProbe {
        field,
        probe: Probe::Section {
            container: CONTACT_TYPE_SECTION,
            heading,
            value,
        },
    }
}

/// Probes for the contact-info overlay, in extraction order.
pub const CONTACT_INFO_PROBES: [FieldProbe; 9] = [
    FieldProbe {
        field: Field::Name,
        probe: Probe::Text("#pv-contact-info"),
    },
    FieldProbe {
        field: Field::Website,
        probe: Probe::Text(".pv-contact-info__contact-link"),
    },
    section(Field::Phone, "Phone", "span"),
    section(Field::Email, "Email", "a"),
    section(Field::Birthday, "Birthday", "span"),
    FieldProbe {
        field: Field::Title,
        probe: Probe::Text(".text-body-medium.break-words"),
    },
    section(Field::Address, "Address", "span"),
    FieldProbe {
        field: Field::Location,
        probe: Probe::Text(".text-body-small.inline.t-black--light.break-words"),
    },
    FieldProbe {
        field: Field::Photo,
        probe: Probe::Attribute {
            selector: ".pv-top-card-profile-picture__container",
            name: "src",
        },
    },
];

/// Outcome of one probe: the trimmed value and whether the page had it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRead {
    pub value: String,
    pub found: bool,
}

impl FieldRead {
    fn missing() -> Self {
        Self::default()
    }
}

/// Run one probe; never fails.
pub async fn read_field<S: BrowserSession>(session: &S, probe: &Probe) -> FieldRead {
    match try_read(session, probe).await {
        Ok(Some(value)) => FieldRead {
            value: value.trim().to_string(),
            found: true,
        },
        Ok(None) => FieldRead::missing(),
        Err(e) => {
            tracing::debug!(?probe, error = %e, "Field probe failed");
            FieldRead::missing()
        }
    }
}

async fn try_read<S: BrowserSession>(
    session: &S,
    probe: &Probe,
) -> Result<Option<String>, AppError> {
    match probe {
        Probe::Text(selector) => session.text(selector).await.map(Some),
        Probe::Attribute { selector, name } => session.attribute(selector, name).await,
        Probe::Section {
            container,
            heading,
            value,
        } => {
            let headings = session.child_texts(container, "h3").await?;
            let values = session.child_texts(container, value).await?;
            Ok(headings
                .into_iter()
                .zip(values)
                .find(|(h, _)| h.as_deref().map(str::trim) == Some(*heading))
                .and_then(|(_, v)| v))
        }
    }
}

/// Reads a [`PersonRecord`] from a contact-info page.
#[derive(Debug, Clone)]
pub struct ContactExtractor {
    probes: Vec<FieldProbe>,
}

impl Default for ContactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactExtractor {
    pub fn new() -> Self {
        Self::with_probes(CONTACT_INFO_PROBES.to_vec())
    }

    pub fn with_probes(probes: Vec<FieldProbe>) -> Self {
        Self { probes }
    }

    /// Read every field. `profile` is left empty for the caller to stamp.
    pub async fn extract<S: BrowserSession>(&self, session: &S) -> PersonRecord {
        let mut record = PersonRecord::default();
        let mut found = 0usize;
        for FieldProbe { field, probe } in &self.probes {
            let read = read_field(session, probe).await;
            if read.found {
                found += 1;
            } else {
                tracing::trace!(field = field.as_str(), "Field not present");
            }
            field.assign(&mut record, read.value);
        }
        tracing::debug!(found, total = self.probes.len(), "Extracted contact fields");
        record
    }
}
