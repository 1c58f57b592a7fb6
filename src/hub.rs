use std::path::{Path, PathBuf};

use crate::error::RecognitionError;

const HUB_URL: &str = "https://huggingface.co";

/// A file that has to be fetched from the hub before the model can load.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub url: String,
    pub path: PathBuf,
    /// A failed download is logged and skipped instead of aborting the batch.
    pub optional: bool,
}

impl RemoteFile {
    pub fn optional(self) -> Self {
        Self {
            optional: true,
            ..self
        }
    }


    /// Short name used in progress messages.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Directory for model storage: ~/.local/share/scene-text-reader/models/
pub fn models_dir() -> PathBuf {
    let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("scene-text-reader");
    p.push("models");
    p
}

/// Local cache directory of one repository, `acme/model` -> `acme--model`.
pub fn repo_dir(root: &Path, repo: &str) -> PathBuf {
    root.join(repo.replace('/', "--"))
}

pub fn file_url(repo: &str, file: &str) -> String {
    format!("{HUB_URL}/{repo}/resolve/main/{file}")
}

/// Describe `file` of `repo` cached under `root`.
pub fn remote_file(root: &Path, repo: &str, file: &str) -> RemoteFile {
    RemoteFile {
        url: file_url(repo, file),
        path: repo_dir(root, repo).join(file),
        optional: false,
    }
}

/// Download every file in `files`, reporting progress via the provided callback.
/// `on_progress(file_name, bytes_downloaded, total_bytes)`; total may be 0 if unknown.
/// The first failing required file aborts; failing optional files are skipped.
pub async fn download_files<F>(files: &[RemoteFile], on_progress: F) -> Result<(), RecognitionError>
where
    F: Fn(&str, u64, u64) + Send,
{
    for file in files {
        if let Err(e) = download_file(file, &on_progress).await {
            let _ = tokio::fs::remove_file(partial_path(file)).await;
            if file.optional {
                log::warn!("Skipping optional {}: {e}", file.url);
                continue;
            }
            return Err(RecognitionError::Download {
                url: file.url.clone(),
                message: e.to_string(),
            });
        }
    }
    Ok(())
}

fn partial_path(file: &RemoteFile) -> PathBuf {
    file.path.with_extension("part")
}

async fn download_file<F>(
    file: &RemoteFile,
    on_progress: &F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Fn(&str, u64, u64) + Send,
{
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    if let Some(dir) = file.path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    log::info!("Downloading {}", file.url);
    let response = reqwest::get(&file.url).await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let name = file.name();

    let partial = partial_path(file);
    let mut out = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_progress(&name, downloaded, total);
    }

    out.flush().await?;
    drop(out);
    tokio::fs::rename(&partial, &file.path).await?;
    log::info!("Saved {} ({downloaded} bytes)", file.path.display());
    Ok(())
}
