use crate::Result;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Splits `items` into consecutive chunks of at most `size` elements. A `size` of zero is treated
/// as one so that callers never loop forever on a misconfigured batch size.
pub(crate) fn chunks<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_sizes() {
        let items = [1, 2, 3, 4, 5];
        let got: Vec<Vec<i32>> = chunks(&items, 2).map(|c| c.to_vec()).collect();
        assert_eq!(got, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_chunks_zero_size_is_one() {
        let items = [1, 2];
        assert_eq!(chunks(&items, 0).count(), 2);
    }

    #[tokio::test]
    async fn test_write_read_deserialize() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x.json");
        write(&path, r#"{"a": 1}"#).await.unwrap();
        let value: serde_json::Value = deserialize(&path).await.unwrap();
        assert_eq!(value["a"], 1);
    }
}
