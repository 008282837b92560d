use ignore::WalkBuilder;
use std::io;
use std::path::{Path, PathBuf};

/// Lists the regular files directly under the watch root.
pub struct FileScanner {
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            excluded: Vec::new(),
        }
    }

    /// Skip `path` even if it is a regular file under the root.
    #[must_use]
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Non-recursive scan in directory-listing order.
    ///
    /// Hidden and ignore-listed files are included: every file dropped into
    /// the root belongs on the map.
    pub fn scan(&self) -> io::Result<Vec<PathBuf>> {
        if !std::fs::metadata(&self.root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {}", self.root.display()),
            ));
        }

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .max_depth(Some(1))
            .standard_filters(false)
            .follow_links(true);

        let mut files = Vec::new();
        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.depth() == 0 {
                        continue;
                    }
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }
                    let path = entry.into_path();
                    if self.excluded.iter().any(|skip| skip == &path) {
                        log::debug!("Skipping excluded file {}", path.display());
                        continue;
                    }
                    files.push(path);
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::info!("Found {} existing files", files.len());
        Ok(files)
    }
}
