use crate::config::ConverterConfig;
use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

/// Generates the correlation stem shared by one request's input, descriptor
/// and output files. Coarse timestamp plus a high-entropy random component,
/// so concurrent requests never collide.
pub fn unique_basename() -> String {
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}_{}", Utc::now().timestamp_millis(), random)
}

/// Filesystem artifacts tied to one conversion request.
///
/// Owns the basename linking the stored upload, the generated metadata
/// descriptor and the converted output inside the tool's shared working
/// directories. `cleanup` must run on every exit path of a request, success
/// or failure, or orphaned files accumulate across requests.
pub struct ConversionJob {
    basename: String,
    packed_dir: PathBuf,
    unpacked_dir: PathBuf,
}

impl ConversionJob {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            basename: unique_basename(),
            packed_dir: config.packed_dir(),
            unpacked_dir: config.unpacked_dir(),
        }
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// `<packed>/<basename>.xnb` — unpack input or pack output
    pub fn packed_file(&self) -> PathBuf {
        self.packed_dir.join(format!("{}.xnb", self.basename))
    }

    /// `<unpacked>/<basename>.json` — the metadata descriptor
    pub fn descriptor_file(&self) -> PathBuf {
        self.unpacked_dir.join(format!("{}.json", self.basename))
    }

    /// `<unpacked>/<basename>.sfditem` — pack input or unpack output
    pub fn unpacked_file(&self) -> PathBuf {
        self.unpacked_dir.join(format!("{}.sfditem", self.basename))
    }

    /// Stores uploaded `.sfditem` bytes as the pack input
    pub async fn store_unpacked_input(&self, data: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.unpacked_dir).await?;
        tokio::fs::write(self.unpacked_file(), data).await?;
        Ok(())
    }

    /// Stores uploaded `.xnb` bytes as the unpack input
    pub async fn store_packed_input(&self, data: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.packed_dir).await?;
        tokio::fs::write(self.packed_file(), data).await?;
        Ok(())
    }

    /// Writes the descriptor the tool requires before packing. Fixed
    /// template; only the export filename varies per request.
    pub async fn write_descriptor(&self) -> Result<()> {
        let descriptor = json!({
            "header": {
                "target": "w",
                "formatVersion": 5,
                "hidef": false,
                "compressed": 128,
            },
            "readers": [
                {
                    "type": "SFD.Content.ItemsContentTypeReader, SFD.Content",
                    "version": 0,
                }
            ],
            "content": {
                "export": format!("{}.sfditem", self.basename),
            },
        });

        tokio::fs::create_dir_all(&self.unpacked_dir).await?;
        tokio::fs::write(self.descriptor_file(), serde_json::to_vec(&descriptor)?).await?;
        Ok(())
    }

    /// Removes every artifact tied to this basename. Absence of any
    /// individual file is fine; other removal failures are logged and
    /// swallowed so cleanup never masks the request's outcome.
    pub async fn cleanup(&self) {
        for path in [
            self.packed_file(),
            self.descriptor_file(),
            self.unpacked_file(),
        ] {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_config(root: &std::path::Path) -> ConverterConfig {
        ConverterConfig {
            xnbcli_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unique_basename_shape() {
        let basename = unique_basename();
        let (millis, random) = basename.split_once('_').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert!(random.parse::<u32>().unwrap() < 1_000_000_000);
    }

    #[test]
    fn test_unique_basename_no_collisions() {
        let names: HashSet<String> = (0..1000).map(|_| unique_basename()).collect();
        assert_eq!(names.len(), 1000);
    }

    #[tokio::test]
    async fn test_descriptor_content() {
        let dir = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(&test_config(dir.path()));

        job.write_descriptor().await.unwrap();

        let raw = tokio::fs::read_to_string(job.descriptor_file()).await.unwrap();
        let descriptor: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(descriptor["header"]["target"], "w");
        assert_eq!(descriptor["header"]["formatVersion"], 5);
        assert_eq!(descriptor["header"]["hidef"], false);
        assert_eq!(descriptor["header"]["compressed"], 128);
        assert_eq!(
            descriptor["readers"][0]["type"],
            "SFD.Content.ItemsContentTypeReader, SFD.Content"
        );
        assert_eq!(descriptor["readers"][0]["version"], 0);
        assert_eq!(
            descriptor["content"]["export"],
            format!("{}.sfditem", job.basename())
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(&test_config(dir.path()));

        job.store_unpacked_input(b"{\"foo\":\"bar\"}").await.unwrap();
        job.store_packed_input(b"\x00binary").await.unwrap();
        job.write_descriptor().await.unwrap();

        assert!(job.unpacked_file().exists());
        assert!(job.packed_file().exists());
        assert!(job.descriptor_file().exists());

        job.cleanup().await;

        assert!(!job.unpacked_file().exists());
        assert!(!job.packed_file().exists());
        assert!(!job.descriptor_file().exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let job = ConversionJob::new(&test_config(dir.path()));

        // Only one of the three artifacts exists
        job.store_packed_input(b"\x00binary").await.unwrap();

        job.cleanup().await;
        assert!(!job.packed_file().exists());

        // Nothing exists at all; still fine
        job.cleanup().await;
    }
}
