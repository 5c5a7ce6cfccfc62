use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::DomainError;

/// Sample photo categories offered by the upload form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialCategory {
    PetBottle,
    HdpeBottle,
    AluminiumCan,
    CardboardCarton,
}

impl MaterialCategory {
    pub const ALL: [MaterialCategory; 4] = [
        MaterialCategory::PetBottle,
        MaterialCategory::HdpeBottle,
        MaterialCategory::AluminiumCan,
        MaterialCategory::CardboardCarton,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            MaterialCategory::PetBottle => "pet-bottle",
            MaterialCategory::HdpeBottle => "hdpe-bottle",
            MaterialCategory::AluminiumCan => "aluminium-can",
            MaterialCategory::CardboardCarton => "cardboard-carton",
        }
    }
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for MaterialCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.slug() == s)
            .ok_or_else(|| DomainError::NotFound(format!("material category '{s}'")))
    }
}

#[derive(Debug, Clone)]
pub struct SampleImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Files completed (read successfully) over files submitted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UploadProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl UploadProgress {
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f32 / self.total as f32 * 100.0
    }

    pub fn is_finished(&self) -> bool {
        self.completed + self.failed == self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub category: MaterialCategory,
    pub uploaded: Vec<String>,
    pub failed: Vec<UploadFailure>,
    pub progress: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_slugs_parse() {
        for c in MaterialCategory::ALL {
            assert_eq!(c.slug().parse::<MaterialCategory>().unwrap(), c);
        }
        assert!("glass".parse::<MaterialCategory>().is_err());
    }

    #[test]
    fn progress_counts_completed_files_only() {
        let p = UploadProgress { total: 5, completed: 4, failed: 1 };
        assert_eq!(p.percent(), 80.0);
        assert!(p.is_finished());
        assert_eq!(UploadProgress::default().percent(), 0.0);
    }
}
