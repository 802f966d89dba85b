//! One-shot import: parse, materialize and validate a config file

use crate::{
    validate_profile, CertStore, ConfigParser, ConfigProfile, ImporterConfig, LogSink,
    ParseOptions, Result, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the UI layer needs after importing one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub profile: ConfigProfile,
    pub validation: ValidationResult,
}

impl ImportReport {
    pub fn is_usable(&self) -> bool {
        self.validation.ok
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs parse, materialization and validation as a single step
pub struct Importer<'a> {
    options: ParseOptions,
    store: &'a dyn CertStore,
    log: &'a dyn LogSink,
}

impl<'a> Importer<'a> {
    pub fn new(options: ParseOptions, store: &'a dyn CertStore, log: &'a dyn LogSink) -> Self {
        Self {
            options,
            store,
            log,
        }
    }

    pub fn from_config(
        config: &ImporterConfig,
        store: &'a dyn CertStore,
        log: &'a dyn LogSink,
    ) -> Self {
        Self::new(config.parse_options(), store, log)
    }

    /// Import a config file. Only parse failures are errors; an unusable
    /// profile comes back with its reasons in the report.
    pub fn import_file(&self, path: &Path) -> Result<ImportReport> {
        let parser = ConfigParser::new(self.options.clone(), self.store, self.log);
        let profile = parser.parse_file(path)?;
        let validation = validate_profile(&profile, self.log);

        if validation.ok {
            self.log
                .info(&format!("Profile '{}' is ready to use", profile.name));
        }

        Ok(ImportReport {
            profile,
            validation,
        })
    }
}
