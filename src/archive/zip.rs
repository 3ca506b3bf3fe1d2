use anyhow::{Context, Result};
use log::debug;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// In-memory DEFLATE ZIP writer that never emits the same entry name twice.
pub struct MemoryZip {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
}

impl Default for MemoryZip {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryZip {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
        }
    }

    /// Adds a file; a clashing name gets a `_2`, `_3`, ... suffix before its extension.
    /// Returns the name actually used.
    pub fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<String> {
        let name = self.unique_name(name);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        self.writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("Failed to start ZIP entry {}", name))?;
        self.writer
            .write_all(contents)
            .with_context(|| format!("Failed to write ZIP entry {}", name))?;

        debug!("Added {} ({} bytes)", name, contents.len());
        self.names.insert(name.clone());
        Ok(name)
    }

    pub fn add_text(&mut self, name: &str, text: &str) -> Result<String> {
        self.add_file(name, text.as_bytes())
    }

    /// Finalizes the central directory and returns the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.writer.finish().context("Failed to finalize ZIP archive")?;
        Ok(cursor.into_inner())
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }

        let (stem, extension) = match name.rfind('.') {
            Some(dot) if dot > name.rfind('/').map_or(0, |slash| slash + 1) => {
                name.split_at(dot)
            }
            _ => (name, ""),
        };
        (2..)
            .map(|n| format!("{}_{}{}", stem, n, extension))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}
