//! Flat-file helpers shared by the profile, wellbeing, and pattern stores.
//!
//! Directories are created 0700 and files written 0600 on unix; records
//! stay human-inspectable (JSON / JSON lines).

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

/// Create `dir` (and parents) and restrict it to the owning user.
pub async fn ensure_private_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).await.map_err(|source| StoreError::Write {
        path: path_str(dir),
        source,
    })?;
    set_mode(dir, 0o700).await
}

/// Open `path` for writing, creating it owner-only. A file that already
/// exists is tightened to 0600 as well.
async fn open_private(path: &Path, append: bool) -> Result<fs::File, StoreError> {
    let mut options = fs::OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    #[cfg(unix)]
    options.mode(0o600);

    let file = options.open(path).await.map_err(|source| StoreError::Write {
        path: path_str(path),
        source,
    })?;
    set_mode(path, 0o600).await?;
    Ok(file)
}

async fn write_all(mut file: fs::File, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    };
    written.await.map_err(|source| StoreError::Write {
        path: path_str(path),
        source,
    })
}

/// Overwrite `path` with `content`, owner-only.
pub async fn write_private(path: &Path, content: &str) -> Result<(), StoreError> {
    let file = open_private(path, false).await?;
    write_all(file, path, content.as_bytes()).await
}

/// Serialize `value` as pretty JSON into `path`.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)?;
    write_private(path, &content).await
}

/// Read a JSON document. Returns `None` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path_str(path),
            source,
        }),
    }
}

/// Append one JSON record as a line.
pub async fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');

    let file = open_private(path, true).await?;
    write_all(file, path, line.as_bytes()).await
}

/// Rewrite `path` in full with one JSON record per line.
pub async fn write_json_lines<T: Serialize>(path: &Path, values: &[T]) -> Result<(), StoreError> {
    let mut content = String::new();
    for value in values {
        content.push_str(&serde_json::to_string(value)?);
        content.push('\n');
    }
    write_private(path, &content).await
}

/// Read a JSON-lines file. Blank lines are skipped; a bad line is an error.
pub async fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path_str(path),
                source,
            });
        }
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
                path: path_str(path),
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|source| StoreError::Write {
            path: path_str(path),
            source,
        })
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        n: u32,
    }

    #[tokio::test]
    async fn json_lines_rewrite_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recs.jsonl");

        write_json_lines(&path, &[Rec { n: 1 }, Rec { n: 2 }]).await.unwrap();
        append_json_line(&path, &Rec { n: 3 }).await.unwrap();

        let recs: Vec<Rec> = read_json_lines(&path).await.unwrap();
        assert_eq!(recs, vec![Rec { n: 1 }, Rec { n: 2 }, Rec { n: 3 }]);
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let recs: Vec<Rec> = read_json_lines(&dir.path().join("none.jsonl")).await.unwrap();
        assert!(recs.is_empty());
        let doc: Option<Rec> = read_json(&dir.path().join("none.json")).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn corrupt_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        tokio::fs::write(&path, "{\"n\":1}\nnot json\n").await.unwrap();
        let err = read_json_lines::<Rec>(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 2, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let private = dir.path().join("private");
        ensure_private_dir(&private).await.unwrap();
        let file = private.join("doc.json");
        write_json(&file, &Rec { n: 7 }).await.unwrap();

        let dir_mode = std::fs::metadata(&private).unwrap().permissions().mode() & 0o777;
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rewrites_and_appends_leave_files_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;

        let log = dir.path().join("log.jsonl");
        append_json_line(&log, &Rec { n: 1 }).await.unwrap();
        assert_eq!(mode(&log), 0o600);

        let loose = dir.path().join("loose.json");
        std::fs::write(&loose, "{\"n\":0}").unwrap();
        std::fs::set_permissions(&loose, std::fs::Permissions::from_mode(0o644)).unwrap();
        write_json(&loose, &Rec { n: 2 }).await.unwrap();
        assert_eq!(mode(&loose), 0o600);
        let back: Option<Rec> = read_json(&loose).await.unwrap();
        assert_eq!(back, Some(Rec { n: 2 }));
    }
}
