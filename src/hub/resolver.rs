//! Remote size resolution

use super::{EntryKind, RemoteMetadataClient};
use crate::error::ResolveError;
use std::sync::Arc;

/// Outcome of one resolution: the byte size, or a classified failure
pub type Resolution = Result<u64, ResolveError>;

/// Resolves byte sizes through a [`RemoteMetadataClient`]
///
/// Never retries; pacing and retry policy belong to the caller.
#[derive(Clone)]
pub struct SizeResolver {
    client: Arc<dyn RemoteMetadataClient>,
}

impl SizeResolver {
    pub fn new(client: Arc<dyn RemoteMetadataClient>) -> Self {
        Self { client }
    }

    /// Size of `filename` inside `repo_id`, or of all files at the repository
    /// root when `filename` is `None`
    ///
    /// A resolution that finds no bytes at all (empty listing, only
    /// directories, zero-length file) is a `NotFound` failure, never a zero.
    pub async fn resolve_size(&self, repo_id: &str, filename: Option<&str>) -> Resolution {
        let result = match filename {
            Some(filename) => self.resolve_file(repo_id, filename).await,
            None => self.resolve_snapshot(repo_id).await,
        };

        match &result {
            Ok(size_bytes) => tracing::debug!(
                repo_id = %repo_id,
                filename = ?filename,
                size_bytes = size_bytes,
                "Size resolved"
            ),
            Err(e) => tracing::debug!(
                repo_id = %repo_id,
                filename = ?filename,
                kind = e.kind(),
                error = %e,
                "Size resolution failed"
            ),
        }

        result
    }

    async fn resolve_file(&self, repo_id: &str, filename: &str) -> Resolution {
        let entry = self.client.stat(repo_id, filename).await?;

        if entry.kind != EntryKind::File {
            return Err(ResolveError::Other(format!(
                "{}/{} is not a file",
                repo_id, filename
            )));
        }
        if entry.size == 0 {
            return Err(ResolveError::NotFound(format!(
                "{}/{} is empty",
                repo_id, filename
            )));
        }

        Ok(entry.size)
    }

    async fn resolve_snapshot(&self, repo_id: &str) -> Resolution {
        let entries = self.client.list(repo_id, None).await?;

        if entries.is_empty() {
            return Err(ResolveError::NotFound(format!(
                "{} has no files",
                repo_id
            )));
        }

        let total: u64 = entries
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .map(|e| e.size)
            .sum();

        if total == 0 {
            return Err(ResolveError::NotFound(format!(
                "{} has no file content at its root ({} entries)",
                repo_id,
                entries.len()
            )));
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::RemoteEntry;
    use crate::hub::mocks::MockClient;

    fn resolver(client: MockClient) -> (SizeResolver, Arc<MockClient>) {
        let client = Arc::new(client);
        (SizeResolver::new(client.clone()), client)
    }

    #[tokio::test]
    async fn test_single_file_size() {
        let (resolver, client) =
            resolver(MockClient::new().with_file("org/repo", "model.safetensors", 2_147_483_648));

        let size = resolver
            .resolve_size("org/repo", Some("model.safetensors"))
            .await;

        assert_eq!(size, Ok(2_147_483_648));
        assert_eq!(client.calls(), vec!["stat org/repo/model.safetensors"]);
    }

    #[tokio::test]
    async fn test_snapshot_sums_files_and_ignores_directories() {
        let (resolver, client) = resolver(MockClient::new().with_listing(
            "org/repo",
            vec![
                RemoteEntry::file("a.safetensors", 1000),
                RemoteEntry::file("b.json", 20),
                RemoteEntry::directory("sub"),
            ],
        ));

        assert_eq!(resolver.resolve_size("org/repo", None).await, Ok(1020));
        assert_eq!(client.calls(), vec!["list org/repo"]);
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_found() {
        let (resolver, _) = resolver(MockClient::new().with_listing("org/empty", vec![]));

        assert!(matches!(
            resolver.resolve_size("org/empty", None).await,
            Err(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directories_only_listing_is_not_found() {
        let (resolver, _) = resolver(
            MockClient::new().with_listing("org/dirs", vec![RemoteEntry::directory("unet")]),
        );

        assert!(matches!(
            resolver.resolve_size("org/dirs", None).await,
            Err(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let (resolver, _) = resolver(
            MockClient::new()
                .with_stat_error(
                    "org/private",
                    "x.bin",
                    ResolveError::AccessDenied("401 Unauthorized".to_string()),
                )
                .with_listing_error("org/flaky", ResolveError::Transient("timeout".to_string())),
        );

        assert_eq!(
            resolver.resolve_size("org/private", Some("x.bin")).await,
            Err(ResolveError::AccessDenied("401 Unauthorized".to_string()))
        );
        assert_eq!(
            resolver.resolve_size("org/flaky", None).await,
            Err(ResolveError::Transient("timeout".to_string()))
        );
    }

    #[tokio::test]
    async fn test_stat_of_directory_is_rejected() {
        let client = MockClient::new();
        client.set_stat("org/repo", "unet", Ok(RemoteEntry::directory("unet")));
        let (resolver, _) = resolver(client);

        assert!(matches!(
            resolver.resolve_size("org/repo", Some("unet")).await,
            Err(ResolveError::Other(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_length_file_is_not_found() {
        let (resolver, _) =
            resolver(MockClient::new().with_file("org/repo", "placeholder.txt", 0));

        assert!(matches!(
            resolver.resolve_size("org/repo", Some("placeholder.txt")).await,
            Err(ResolveError::NotFound(_))
        ));
    }
}
