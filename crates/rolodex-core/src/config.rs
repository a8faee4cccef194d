use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Account credentials for the social platform.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Validate and build credentials.
    ///
    /// The email must look like `local@domain.tld`; the password must not be
    /// empty.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self, AppError> {
        let email = email.into().trim().to_string();
        let password = password.into();

        if !EMAIL_RE.is_match(&email) {
            return Err(AppError::ConfigError(format!(
                "Invalid email format: '{email}'"
            )));
        }
        if password.is_empty() {
            return Err(AppError::ConfigError("Password cannot be empty".into()));
        }

        Ok(Self { email, password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Parse a secrets document with `email` and `password` keys.
    ///
    /// A numeric password is accepted and used as its decimal text.
    pub fn from_yaml(yaml: &str) -> Result<Self, AppError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::ConfigError(format!("Invalid secrets YAML: {e}")))?;
        let map = doc
            .as_mapping()
            .ok_or_else(|| AppError::ConfigError("Secrets file must be a mapping".into()))?;

        let lookup = |key: &str| -> Result<String, AppError> {
            let value = map
                .get(key)
                .ok_or_else(|| AppError::ConfigError(format!("Missing secret '{key}'")))?;
            match value {
                serde_yaml::Value::String(s) => Ok(s.clone()),
                serde_yaml::Value::Number(n) => Ok(n.to_string()),
                serde_yaml::Value::Null => Ok(String::new()),
                _ => Err(AppError::ConfigError(format!(
                    "Secret '{key}' must be a string"
                ))),
            }
        };

        Self::new(lookup("email")?, lookup("password")?)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw).map_err(|e| match e {
            AppError::ConfigError(msg) => {
                AppError::ConfigError(format!("{msg} in file {}", path.display()))
            }
            other => other,
        })
    }
}

/// On-disk layout of the working folder.
#[derive(Debug, Clone)]
pub struct DataFolder {
    root: PathBuf,
}

impl DataFolder {
    pub const SECRETS_FILE: &'static str = "secrets.yaml";
    pub const QUEUE_FILE: &'static str = "connections_links.json";
    pub const CLEANED_FILE: &'static str = "cleaned_connections_links.json";
    pub const PROFILE_DIR: &'static str = "chrome_profile";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn secrets(&self) -> PathBuf {
        self.root.join(Self::SECRETS_FILE)
    }

    pub fn queue(&self) -> PathBuf {
        self.root.join(Self::QUEUE_FILE)
    }

    pub fn cleaned(&self) -> PathBuf {
        self.root.join(Self::CLEANED_FILE)
    }

    pub fn browser_profile(&self) -> PathBuf {
        self.root.join(Self::PROFILE_DIR)
    }

    /// Fails unless the folder exists and is a directory.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.root.is_dir() {
            return Err(AppError::ConfigError(format!(
                "Data folder not found: {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// Load credentials from the folder's secrets file.
    pub fn credentials(&self) -> Result<Credentials, AppError> {
        self.validate()?;
        let path = self.secrets();
        if !path.exists() {
            return Err(AppError::ConfigError(format!(
                "Missing file in the data folder: {}",
                Self::SECRETS_FILE
            )));
        }
        Credentials::from_file(&path)
    }
}
