//! Inventory - ストレージ階層ごとの artifact 一覧
//!
//! # 共通ルール
//! - 名前を `ArtifactNameParser` で解釈できないエントリは artifact ではないので読み飛ばす
//!   （エラーにしない。迷い込んだファイルがあっても一覧は成功する）
//! - 一覧呼び出しそのものの失敗は `StorageUnavailable`
//! - 毎回新しく一覧する。前回の結果は再利用しない

use std::path::Path;
use tracing::{debug, warn};

use crate::app::config::Paging;
use crate::domain::{
    Artifact, ArtifactNameParser, BacklabError, LocalArtifact, RemoteArtifact,
};
use crate::ports::{Bucket, LocalFilesystem, ObjectStore, PageCursor};

/// Artifacts in a local backup directory.
pub struct LocalInventory<'a> {
    fs: &'a dyn LocalFilesystem,
    parser: &'a dyn ArtifactNameParser,
    dir: &'a Path,
}

impl<'a> LocalInventory<'a> {
    pub fn new(
        fs: &'a dyn LocalFilesystem,
        parser: &'a dyn ArtifactNameParser,
        dir: &'a Path,
    ) -> Self {
        Self { fs, parser, dir }
    }

    /// List artifacts sorted by file name. Directories and unparsable names are skipped.
    pub async fn list(&self) -> Result<Vec<LocalArtifact>, BacklabError> {
        let entries = self
            .fs
            .list_directory(self.dir)
            .await
            .map_err(|source| BacklabError::StorageUnavailable {
                location: self.dir.display().to_string(),
                source,
            })?;

        let mut artifacts: Vec<LocalArtifact> = entries
            .into_iter()
            .filter(|entry| !entry.is_dir)
            .filter_map(|entry| match self.parser.parse(&entry.name) {
                Ok(timestamp) => Some(LocalArtifact {
                    path: self.dir.join(&entry.name),
                    artifact: Artifact::new(entry.name, timestamp),
                }),
                Err(err) => {
                    debug!(entry = %entry.name, error = %err, "skipping non-artifact entry");
                    None
                }
            })
            .collect();

        artifacts.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(artifacts)
    }
}

/// Newest artifact by timestamp. Ties go to the earliest entry in `artifacts`.
pub fn newest(artifacts: &[LocalArtifact]) -> Option<&LocalArtifact> {
    let mut newest: Option<&LocalArtifact> = None;
    for candidate in artifacts {
        match newest {
            Some(current) if candidate.timestamp() <= current.timestamp() => {}
            _ => newest = Some(candidate),
        }
    }
    newest
}

/// Artifact versions stored in a remote bucket.
pub struct RemoteInventory<'a> {
    store: &'a dyn ObjectStore,
    parser: &'a dyn ArtifactNameParser,
    bucket: &'a Bucket,
    paging: Paging,
}

impl<'a> RemoteInventory<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        parser: &'a dyn ArtifactNameParser,
        bucket: &'a Bucket,
        paging: Paging,
    ) -> Self {
        Self {
            store,
            parser,
            bucket,
            paging,
        }
    }

    /// List artifact versions in store order, following pages until the store
    /// reports no more or `paging.max_pages` is reached.
    pub async fn list(&self) -> Result<Vec<RemoteArtifact>, BacklabError> {
        let mut artifacts = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_object_versions(self.bucket, cursor.as_ref(), self.paging.page_size)
                .await
                .map_err(|source| BacklabError::StorageUnavailable {
                    location: format!("bucket {}", self.bucket.name),
                    source,
                })?;
            pages += 1;

            for version in page.versions {
                match self.parser.parse(&version.name) {
                    Ok(timestamp) => artifacts.push(RemoteArtifact {
                        artifact: Artifact::new(version.name, timestamp),
                        version_id: version.version_id,
                    }),
                    Err(err) => {
                        debug!(object = %version.name, error = %err, "skipping non-artifact object");
                    }
                }
            }

            let Some(next) = page.next else {
                break;
            };
            if let Some(max_pages) = self.paging.max_pages
                && pages >= max_pages
            {
                warn!(
                    bucket = %self.bucket.name,
                    pages,
                    next = %next.start_name,
                    "remote listing truncated, retention applies to the listed part only"
                );
                break;
            }
            cursor = Some(next);
        }

        Ok(artifacts)
    }
}
