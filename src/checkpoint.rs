use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Which subcategories (and whole categories) are done. Entries keep their
/// insertion order and are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    completed_categories: Vec<String>,
    #[serde(default)]
    completed_subcategories: Vec<String>,
}

impl Checkpoint {
    pub fn is_subcategory_done(&self, key: &str) -> bool {
        self.completed_subcategories.iter().any(|k| k == key)
    }

    pub fn is_category_done(&self, name: &str) -> bool {
        self.completed_categories.iter().any(|k| k == name)
    }

    /// Returns `false` when the key was already present.
    pub fn mark_subcategory(&mut self, key: &str) -> bool {
        if self.is_subcategory_done(key) {
            return false;
        }
        self.completed_subcategories.push(key.to_owned());
        true
    }

    pub fn mark_category(&mut self, name: &str) -> bool {
        if self.is_category_done(name) {
            return false;
        }
        self.completed_categories.push(name.to_owned());
        true
    }

    pub fn completed_subcategories(&self) -> &[String] {
        &self.completed_subcategories
    }

    pub fn completed_categories(&self) -> &[String] {
        &self.completed_categories
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// An absent checkpoint loads as empty.
    async fn load(&self) -> anyhow::Result<Checkpoint>;
    async fn save(&self, checkpoint: &Checkpoint) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct LocalFsCheckpointStore {
    path: PathBuf,
}

impl LocalFsCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for LocalFsCheckpointStore {
    async fn load(&self) -> anyhow::Result<Checkpoint> {
        let checkpoint = read_json(&self.path)
            .await
            .with_context(|| format!("read checkpoint: {}", self.path.display()))?;
        Ok(dedup(checkpoint.unwrap_or_default()))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        write_json_atomic(&self.path, checkpoint)
            .await
            .with_context(|| format!("write checkpoint: {}", self.path.display()))
    }
}

/// Hand-edited files may repeat keys; keep the first of each.
fn dedup(raw: Checkpoint) -> Checkpoint {
    let mut out = Checkpoint::default();
    for key in &raw.completed_subcategories {
        out.mark_subcategory(key);
    }
    for name in &raw.completed_categories {
        out.mark_category(name);
    }
    out
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
