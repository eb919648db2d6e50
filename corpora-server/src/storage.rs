use crate::container::ContainerName;
use anyhow::{Context, Result, anyhow};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{
    fmt,
    path::PathBuf,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::fs::{self, File};
use tracing::debug;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Storage class a container belongs to.
///
/// Classes partition the data directory at the top level. Only corpus
/// storage exists right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Corpus,
}

impl StorageClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Corpus => "corpus",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown storage class")]
pub struct UnknownStorageClass;

impl FromStr for StorageClass {
    type Err = UnknownStorageClass;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "corpus" => Ok(Self::Corpus),
            _ => Err(UnknownStorageClass),
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission granted by a signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPermission {
    Read,
}

impl AccessPermission {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignedUrlError {
    #[error("signed url has expired")]
    Expired,

    #[error("signature does not match the requested blob")]
    SignatureMismatch,

    #[error("signature is malformed")]
    MalformedSignature,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("blob filename must be a single non-empty path segment")]
pub struct InvalidBlobName;

/// Validates that a filename is usable as a blob name on disk.
///
/// Filenames are otherwise opaque; this only rejects values that would
/// escape the container directory or cannot name a file.
pub fn validate_blob_filename(filename: &str) -> Result<(), InvalidBlobName> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0'])
    {
        return Err(InvalidBlobName);
    }
    Ok(())
}

/// Filesystem-backed blob storage that can mint and verify time-limited
/// signed read URLs for its blobs.
///
/// Blobs are stored at `<base_dir>/<class>/<container>/<filename>`. A signed
/// URL points at the `/signed` route of `public_url` and carries an expiry
/// timestamp plus an HMAC-SHA256 signature over the granted access.
#[derive(Debug)]
pub struct BlobStorage {
    base_dir: PathBuf,
    public_url: Url,
    signing_key: Vec<u8>,
}

impl BlobStorage {
    /// Create a new [`BlobStorage`] rooted at `base_dir`.
    pub fn new(base_dir: PathBuf, public_url: Url, signing_key: impl Into<Vec<u8>>) -> Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            public_url,
            signing_key: signing_key.into(),
        })
    }

    fn blob_path(
        &self,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
    ) -> Result<PathBuf> {
        validate_blob_filename(filename)?;
        Ok(self
            .base_dir
            .join(class.as_str())
            .join(container.as_str())
            .join(filename))
    }

    /// Save blob bytes to storage, overwriting any existing blob of the
    /// same name.
    pub async fn save_blob(
        &self,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let path = self.blob_path(class, container, filename)?;
        debug!("saving blob {class}/{container}/{filename} to storage");
        fs::create_dir_all(path.parent().context("blob path has no parent")?).await?;
        fs::write(path, bytes).await?;
        Ok(())
    }

    /// Open a blob for reading, returning the file handle and its length.
    ///
    /// Returns `Ok(None)` if no blob of that name exists.
    pub async fn open_blob(
        &self,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
    ) -> Result<Option<(File, u64)>> {
        let path = self.blob_path(class, container, filename)?;
        debug!("opening blob {class}/{container}/{filename} from storage");
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let len = file.metadata().await?.len();
        Ok(Some((file, len)))
    }

    /// Mint a time-limited signed URL granting `permission` on a single blob.
    ///
    /// The blob is not required to exist at minting time; a URL for a
    /// missing blob will 404 when fetched.
    pub fn signed_read_url(
        &self,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
        permission: AccessPermission,
        ttl: Duration,
    ) -> Result<Url> {
        let expires = unix_now() + ttl.as_secs();
        let signature = self.access_signature(permission, class, container, filename, expires);

        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("public url cannot be used as a base url"))?
            .pop_if_empty()
            .extend(["signed", class.as_str(), container.as_str(), filename]);
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("sig", &signature);
        debug!("minted signed url for {class}/{container}/{filename} expiring at {expires}");
        Ok(url)
    }

    /// Check that `sig` grants read access to the named blob and that the
    /// grant has not expired.
    pub fn verify_read_access(
        &self,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
        expires: u64,
        sig: &str,
    ) -> Result<(), SignedUrlError> {
        if expires < unix_now() {
            return Err(SignedUrlError::Expired);
        }
        let sig_bytes = hex::decode(sig).map_err(|_| SignedUrlError::MalformedSignature)?;
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("hmac accepts keys of any length");
        mac.update(Self::signature_payload(AccessPermission::Read, class, container, filename, expires).as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| SignedUrlError::SignatureMismatch)
    }

    fn access_signature(
        &self,
        permission: AccessPermission,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
        expires: u64,
    ) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("hmac accepts keys of any length");
        mac.update(Self::signature_payload(permission, class, container, filename, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signature_payload(
        permission: AccessPermission,
        class: StorageClass,
        container: &ContainerName,
        filename: &str,
        expires: u64,
    ) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            permission.as_str(),
            class.as_str(),
            container.as_str(),
            filename,
            expires
        )
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn storage() -> (tempfile::TempDir, BlobStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(
            dir.path().join("data"),
            Url::parse("http://127.0.0.1:8310").unwrap(),
            "test-signing-key",
        )
        .unwrap();
        (dir, storage)
    }

    fn container() -> ContainerName {
        "my-corpus".parse().unwrap()
    }

    #[test]
    fn minted_url_reflects_blob_and_expiry() {
        let (_dir, storage) = storage();
        let url = storage
            .signed_read_url(
                StorageClass::Corpus,
                &container(),
                "crash-01.bin",
                AccessPermission::Read,
                TTL,
            )
            .unwrap();

        assert_eq!(url.path(), "/signed/corpus/my-corpus/crash-01.bin");
        let expires: u64 = url
            .query_pairs()
            .find(|(key, _)| key == "expires")
            .map(|(_, value)| value.parse().unwrap())
            .unwrap();
        let expected = unix_now() + TTL.as_secs();
        assert!(expires.abs_diff(expected) <= 2, "expiry not ~5min out");
    }

    #[test]
    fn minted_url_verifies() {
        let (_dir, storage) = storage();
        let url = storage
            .signed_read_url(
                StorageClass::Corpus,
                &container(),
                "crash-01.bin",
                AccessPermission::Read,
                TTL,
            )
            .unwrap();

        let mut expires = None;
        let mut sig = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "expires" => expires = Some(value.parse::<u64>().unwrap()),
                "sig" => sig = Some(value.into_owned()),
                _ => {}
            }
        }
        storage
            .verify_read_access(
                StorageClass::Corpus,
                &container(),
                "crash-01.bin",
                expires.unwrap(),
                &sig.unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn signature_is_bound_to_the_blob() {
        let (_dir, storage) = storage();
        let expires = unix_now() + TTL.as_secs();
        let sig = storage.access_signature(
            AccessPermission::Read,
            StorageClass::Corpus,
            &container(),
            "crash-01.bin",
            expires,
        );

        // Same blob verifies, any other blob does not.
        assert!(
            storage
                .verify_read_access(StorageClass::Corpus, &container(), "crash-01.bin", expires, &sig)
                .is_ok()
        );
        assert_eq!(
            storage.verify_read_access(
                StorageClass::Corpus,
                &container(),
                "crash-02.bin",
                expires,
                &sig
            ),
            Err(SignedUrlError::SignatureMismatch)
        );
        assert_eq!(
            storage.verify_read_access(
                StorageClass::Corpus,
                &"other-corpus".parse().unwrap(),
                "crash-01.bin",
                expires,
                &sig
            ),
            Err(SignedUrlError::SignatureMismatch)
        );
    }

    #[test]
    fn expired_grant_is_rejected() {
        let (_dir, storage) = storage();
        let expires = unix_now() - 1;
        let sig = storage.access_signature(
            AccessPermission::Read,
            StorageClass::Corpus,
            &container(),
            "crash-01.bin",
            expires,
        );
        assert_eq!(
            storage.verify_read_access(
                StorageClass::Corpus,
                &container(),
                "crash-01.bin",
                expires,
                &sig
            ),
            Err(SignedUrlError::Expired)
        );
    }

    #[test]
    fn garbage_signature_is_malformed() {
        let (_dir, storage) = storage();
        assert_eq!(
            storage.verify_read_access(
                StorageClass::Corpus,
                &container(),
                "crash-01.bin",
                unix_now() + 60,
                "not-hex"
            ),
            Err(SignedUrlError::MalformedSignature)
        );
    }

    #[test]
    fn traversal_filenames_are_rejected() {
        for filename in ["", ".", "..", "../secret", "a/b", "a\\b", "nul\0byte"] {
            assert_eq!(
                validate_blob_filename(filename),
                Err(InvalidBlobName),
                "accepted '{}'",
                filename.escape_debug()
            );
        }
        assert!(validate_blob_filename("crash-01.bin").is_ok());
    }

    #[tokio::test]
    async fn save_then_open_round_trips() {
        let (_dir, storage) = storage();
        storage
            .save_blob(StorageClass::Corpus, &container(), "crash-01.bin", b"input")
            .await
            .unwrap();

        let (mut file, len) = storage
            .open_blob(StorageClass::Corpus, &container(), "crash-01.bin")
            .await
            .unwrap()
            .expect("blob should exist");
        assert_eq!(len, 5);

        use tokio::io::AsyncReadExt;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"input");
    }

    #[tokio::test]
    async fn open_missing_blob_returns_none() {
        let (_dir, storage) = storage();
        assert!(
            storage
                .open_blob(StorageClass::Corpus, &container(), "missing.bin")
                .await
                .unwrap()
                .is_none()
        );
    }
}
