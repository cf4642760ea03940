//! Offline asset host backed by a resource-pack ZIP or directory.
//!
//! Serves the same URL layout as the remote host, so a pack on disk can be
//! used anywhere a [`Fetcher`] is expected.

use super::{FetchResponse, Fetcher, Request};
use crate::error::Result;
use futures::future::{ready, BoxFuture, FutureExt};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};

const LIST_FILE: &str = "_list.json";

enum ArchiveSource {
    /// Every file of a ZIP, read once up front.
    Zip(HashMap<String, Vec<u8>>),
    Directory(PathBuf),
}

/// A [`Fetcher`] that answers `{root}/{path}` from a local pack.
///
/// URLs outside `root` and files missing from the pack answer 404. A
/// `_list.json` request for a directory the pack does not ship is answered
/// with the file names found in that directory.
pub struct ArchiveFetcher {
    root: String,
    source: ArchiveSource,
}

impl ArchiveFetcher {
    /// Load a pack from a file path. Supports both ZIP files and directories.
    pub fn from_path(root: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Ok(Self::from_directory(root, path))
        } else {
            let data = std::fs::read(path)?;
            Self::from_zip_bytes(root, &data)
        }
    }

    /// Load a pack from ZIP data.
    pub fn from_zip_bytes(root: impl Into<String>, data: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))?;
        let mut entries = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            entries.insert(name, contents);
        }

        log::debug!("Indexed {} archive entries", entries.len());
        Ok(Self::with_source(root, ArchiveSource::Zip(entries)))
    }

    /// Serve files from an unpacked pack directory.
    pub fn from_directory(root: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_source(root, ArchiveSource::Directory(path.into()))
    }

    fn with_source(root: impl Into<String>, source: ArchiveSource) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
            source,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Relative pack path for `url`, if it lives under this host.
    fn relative_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.root.as_str())?
            .strip_prefix('/')
            .filter(|path| !path.is_empty() && !path.split('/').any(|seg| seg == ".."))
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match &self.source {
            ArchiveSource::Zip(entries) => Ok(entries.get(path).cloned()),
            ArchiveSource::Directory(base) => match std::fs::read(base.join(path)) {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Stems of the files directly inside `dir`.
    fn list_directory(&self, dir: &str) -> Result<Option<Vec<String>>> {
        let mut names = BTreeSet::new();
        match &self.source {
            ArchiveSource::Zip(entries) => {
                let prefix = format!("{}/", dir);
                for name in entries.keys() {
                    if let Some(rest) = name.strip_prefix(&prefix) {
                        if !rest.contains('/') {
                            names.insert(file_stem(rest).to_string());
                        }
                    }
                }
            }
            ArchiveSource::Directory(base) => {
                let read_dir = match std::fs::read_dir(base.join(dir)) {
                    Ok(read_dir) => read_dir,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                for entry in read_dir {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        let name = entry.file_name().to_string_lossy().to_string();
                        names.insert(file_stem(&name).to_string());
                    }
                }
            }
        }
        if names.is_empty() {
            return Ok(None);
        }
        Ok(Some(names.into_iter().collect()))
    }

    fn respond(&self, url: &str) -> Result<FetchResponse> {
        let Some(path) = self.relative_path(url) else {
            return Ok(FetchResponse::not_found());
        };
        if let Some(body) = self.read(path)? {
            return Ok(FetchResponse::ok(body));
        }
        if let Some(dir) = path.strip_suffix(LIST_FILE) {
            if let Some(names) = self.list_directory(dir.trim_end_matches('/'))? {
                return Ok(FetchResponse::ok(serde_json::to_vec(&names)?));
            }
        }
        Ok(FetchResponse::not_found())
    }
}

/// Name without its first extension: `water_still.png.mcmeta` -> `water_still`.
fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

impl Fetcher for ArchiveFetcher {
    fn fetch(&self, url: &str, _request: Request) -> BoxFuture<'static, Result<FetchResponse>> {
        ready(self.respond(url)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_pack::ResponseType;
    use std::io::Write;

    const ROOT: &str = "http://pack.local";

    fn zip_pack(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn get(fetcher: &ArchiveFetcher, path: &str) -> FetchResponse {
        fetcher.respond(&format!("{ROOT}/{path}")).unwrap()
    }

    #[test]
    fn test_zip_pack() {
        let data = zip_pack(&[
            ("assets/minecraft/models/block/stone.json", br#"{"parent":"block/cube_all"}"#),
            ("assets/minecraft/models/block/dirt.json", b"{}"),
            ("assets/minecraft/models/block/nested/deep.json", b"{}"),
        ]);
        let fetcher = ArchiveFetcher::from_zip_bytes(ROOT, &data).unwrap();

        let stone = get(&fetcher, "assets/minecraft/models/block/stone.json");
        assert!(stone.is_success());
        assert_eq!(stone.body, br#"{"parent":"block/cube_all"}"#);

        assert!(get(&fetcher, "assets/minecraft/models/block/sand.json").is_not_found());
        assert!(fetcher
            .respond("http://elsewhere/assets/minecraft/models/block/stone.json")
            .unwrap()
            .is_not_found());

        let list = get(&fetcher, "assets/minecraft/models/block/_list.json");
        let names: Vec<String> = serde_json::from_slice(&list.body).unwrap();
        assert_eq!(names, vec!["dirt", "stone"]);
    }

    #[test]
    fn test_directory_pack() {
        let dir = tempfile::tempdir().unwrap();
        let textures = dir.path().join("assets/minecraft/textures/block");
        std::fs::create_dir_all(&textures).unwrap();
        std::fs::write(textures.join("stone.png"), b"png").unwrap();
        std::fs::write(textures.join("water_still.png.mcmeta"), b"{}").unwrap();

        let fetcher = ArchiveFetcher::from_path(ROOT, dir.path()).unwrap();
        assert_eq!(get(&fetcher, "assets/minecraft/textures/block/stone.png").body, b"png");
        assert!(get(&fetcher, "assets/minecraft/textures/block/../../../x").is_not_found());
        assert!(get(&fetcher, "assets/minecraft/models/block/_list.json").is_not_found());

        let list = get(&fetcher, "assets/minecraft/textures/block/_list.json");
        let names: Vec<String> = serde_json::from_slice(&list.body).unwrap();
        assert_eq!(names, vec!["stone", "water_still"]);
    }

    #[tokio::test]
    async fn test_fetch_through_trait() {
        let data = zip_pack(&[("assets/minecraft/blockstates/stone.json", b"{}")]);
        let fetcher = ArchiveFetcher::from_zip_bytes(format!("{ROOT}/"), &data).unwrap();
        let response = fetcher
            .fetch(
                &format!("{ROOT}/assets/minecraft/blockstates/stone.json"),
                Request::asset(ResponseType::Json),
            )
            .await
            .unwrap();
        assert!(response.is_success());
    }
}
