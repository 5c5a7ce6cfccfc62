use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};

use crate::domain::{
    errors::{DomainError, DomainResult},
    stream::{Notice, StreamEvent},
    upload::{MaterialCategory, SampleImage, UploadFailure, UploadProgress, UploadReport},
};

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: MaterialCategory,
    pub files: usize,
    pub bytes: usize,
}

/// Labeled sample photos, kept in memory per material category.
pub struct UploadService {
    library: RwLock<BTreeMap<MaterialCategory, Vec<SampleImage>>>,
    progress: watch::Sender<UploadProgress>,
    events: broadcast::Sender<StreamEvent>,
    max_file_bytes: u64,
}

impl UploadService {
    pub fn new(events: broadcast::Sender<StreamEvent>, max_file_bytes: u64) -> Self {
        let (progress, _) = watch::channel(UploadProgress::default());
        Self {
            library: RwLock::new(BTreeMap::new()),
            progress,
            events,
            max_file_bytes,
        }
    }

    pub fn progress(&self) -> UploadProgress {
        *self.progress.borrow()
    }

    /// Read every file concurrently. A file that cannot be read is reported
    /// and skipped; the others are still stored.
    pub async fn upload(&self, category: MaterialCategory, paths: Vec<PathBuf>) -> DomainResult<UploadReport> {
        if paths.is_empty() {
            return Err(DomainError::InvalidInput("no files to upload".into()));
        }

        let mut reads = JoinSet::new();
        let mut pending = HashMap::with_capacity(paths.len());
        for path in paths {
            let max = self.max_file_bytes;
            let task_path = path.clone();
            let handle = reads.spawn(async move { read_sample(&task_path, max).await });
            pending.insert(handle.id(), path);
        }
        self.collect(category, reads, pending).await
    }

    /// Drain the read tasks. `pending` names the file behind each task, so a
    /// task that panicked is still reported against its file.
    async fn collect(
        &self,
        category: MaterialCategory,
        mut reads: JoinSet<DomainResult<SampleImage>>,
        mut pending: HashMap<task::Id, PathBuf>,
    ) -> DomainResult<UploadReport> {
        let total = pending.len();
        let mut progress = UploadProgress { total, ..UploadProgress::default() };
        self.progress.send_replace(progress);

        let mut images = Vec::with_capacity(total);
        let mut failed = Vec::new();
        while let Some(joined) = reads.join_next_with_id().await {
            let (path, result) = match joined {
                Ok((id, result)) => (pending.remove(&id).unwrap_or_default(), result),
                Err(e) => {
                    error!(%category, "Upload task failed: {e}");
                    let path = pending.remove(&e.id()).unwrap_or_default();
                    let reason = if e.is_panic() { "read task panicked".to_string() } else { e.to_string() };
                    let err = DomainError::Upload { path: path.display().to_string(), reason };
                    (path, Err(err))
                }
            };
            match result {
                Ok(image) => {
                    progress.completed += 1;
                    images.push(image);
                }
                Err(e) => {
                    progress.failed += 1;
                    warn!(%category, "{e}");
                    self.notify(Notice::error(format!("Failed to upload file: {}", file_name(&path))));
                    failed.push(UploadFailure {
                        path: path.display().to_string(),
                        reason: upload_reason(e),
                    });
                }
            }
            self.progress.send_replace(progress);
        }

        if failed.is_empty() {
            self.notify(Notice::success(format!("Uploaded {total} files successfully")));
        }
        info!(
            %category,
            completed = progress.completed,
            failed = progress.failed,
            "Upload finished at {:.0}%",
            progress.percent()
        );

        let uploaded = images.iter().map(|i| i.file_name.clone()).collect();
        self.library
            .write()
            .map_err(|_| DomainError::OperationFailed("sample library lock poisoned".into()))?
            .entry(category)
            .or_default()
            .extend(images);

        Ok(UploadReport {
            category,
            uploaded,
            failed,
            progress: progress.percent(),
        })
    }

    pub fn summary(&self) -> DomainResult<Vec<CategorySummary>> {
        let library = self
            .library
            .read()
            .map_err(|_| DomainError::OperationFailed("sample library lock poisoned".into()))?;
        Ok(MaterialCategory::ALL
            .into_iter()
            .map(|category| {
                let samples = library.get(&category).map(Vec::as_slice).unwrap_or_default();
                CategorySummary {
                    category,
                    files: samples.len(),
                    bytes: samples.iter().map(|s| s.bytes.len()).sum(),
                }
            })
            .collect())
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(StreamEvent::Notice(notice));
    }
}

async fn read_sample(path: &Path, max_bytes: u64) -> DomainResult<SampleImage> {
    let fail = |reason: String| DomainError::Upload { path: path.display().to_string(), reason };

    let meta = tokio::fs::metadata(path).await.map_err(|e| fail(e.to_string()))?;
    if !meta.is_file() {
        return Err(fail("not a regular file".into()));
    }
    if meta.len() > max_bytes {
        return Err(fail(format!("{} bytes exceeds the {max_bytes} byte limit", meta.len())));
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| fail(e.to_string()))?;
    Ok(SampleImage { file_name: file_name(path), bytes })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn upload_reason(e: DomainError) -> String {
    match e {
        DomainError::Upload { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exploding_read() -> DomainResult<SampleImage> {
        panic!("jpeg decoder crashed")
    }

    #[tokio::test]
    async fn panicked_read_is_reported_against_its_file() {
        let (events, mut rx) = broadcast::channel(8);
        let service = UploadService::new(events, 1024);

        let mut reads = JoinSet::new();
        let mut pending = HashMap::new();
        let ok = reads.spawn(async { Ok(SampleImage { file_name: "a.jpg".into(), bytes: vec![1, 2, 3] }) });
        pending.insert(ok.id(), PathBuf::from("samples/a.jpg"));
        let crashed = reads.spawn(exploding_read());
        pending.insert(crashed.id(), PathBuf::from("samples/b.jpg"));

        let report = service.collect(MaterialCategory::PetBottle, reads, pending).await.unwrap();

        assert_eq!(report.uploaded, vec!["a.jpg".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, "samples/b.jpg");
        assert_eq!(report.failed[0].reason, "read task panicked");
        assert!((report.progress - 50.0).abs() < 1e-3);

        let mut notices = Vec::new();
        while let Ok(StreamEvent::Notice(notice)) = rx.try_recv() {
            notices.push(notice.message);
        }
        assert_eq!(notices, vec!["Failed to upload file: b.jpg".to_string()]);
    }
}
