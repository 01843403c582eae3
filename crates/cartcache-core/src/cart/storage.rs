use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Name of the slot the cart is persisted under.
pub const CART_SLOT: &str = "cart_v1";

/// A single named slot holding the serialized cart.
pub trait CartStorage {
    /// `Ok(None)` when nothing has been saved yet.
    fn read(&self) -> Result<Option<String>>;

    fn write(&mut self, contents: &str) -> Result<()>;
}

/// Keeps the slot as `<dir>/cart_v1.json`.
#[derive(Debug, Clone)]
pub struct FileCartStorage {
    path: PathBuf,
}

impl FileCartStorage {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.json", CART_SLOT)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for FileCartStorage {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cart file: {}", self.path.display()))?;
        Ok(Some(contents))
    }

    fn write(&mut self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write cart file: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory slot, used by tests and when no data directory is available.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStorage {
    contents: Option<String>,
    fail_writes: bool,
}

impl MemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
            fail_writes: false,
        }
    }

    /// Every write returns an error, leaving the slot unchanged.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl CartStorage for MemoryCartStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents.clone())
    }

    fn write(&mut self, contents: &str) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("storage is read-only");
        }
        self.contents = Some(contents.to_string());
        Ok(())
    }
}
