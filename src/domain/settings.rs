use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::errors::{DomainError, DomainResult};

/// Folder selection and named switches. Nothing in the detection loop reads these.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Settings {
    pub folder: Option<PathBuf>,
    pub toggles: BTreeMap<String, bool>,
}

impl Settings {
    pub fn with_toggles<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            folder: None,
            toggles: names.into_iter().map(|n| (n.into(), false)).collect(),
        }
    }

    /// Flip a toggle and return its new value.
    pub fn toggle(&mut self, name: &str) -> DomainResult<bool> {
        let value = self
            .toggles
            .get_mut(name)
            .ok_or_else(|| DomainError::NotFound(format!("toggle '{name}'")))?;
        *value = !*value;
        Ok(*value)
    }

    pub fn select_folder(&mut self, folder: PathBuf) -> DomainResult<()> {
        if !folder.is_dir() {
            return Err(DomainError::InvalidInput(format!(
                "{} is not a directory",
                folder.display()
            )));
        }
        self.folder = Some(folder);
        Ok(())
    }
}
