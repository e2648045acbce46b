use std::env;
use std::path::PathBuf;

/// Runtime configuration for the conversion service
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Installation directory of the xnbcli tool
    pub xnbcli_root: PathBuf,

    /// Command line for the tool's pack run (default: "npm run pack")
    pub pack_command: String,

    /// Command line for the tool's unpack run (default: "npm run unpack")
    pub unpack_command: String,

    /// Maximum upload size in bytes (default: 40 KiB)
    pub max_upload_size: usize,

    /// Deadline for one converter run in seconds (default: 60)
    pub convert_timeout_secs: u64,

    /// Origins accepted by the CORS layer
    pub allowed_origins: Vec<String>,

    /// Socket address the server binds to (default: "127.0.0.1:3000")
    pub bind_addr: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            xnbcli_root: PathBuf::from("xnbcli"),
            pack_command: "npm run pack".to_string(),
            unpack_command: "npm run unpack".to_string(),
            max_upload_size: 40 * 1024, // 40 KiB
            convert_timeout_secs: 60,
            allowed_origins: vec![
                "https://superfighters.vercel.app".to_string(),
                "http://localhost:3000".to_string(),
            ],
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl ConverterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            xnbcli_root: env::var("XNBCLI_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.xnbcli_root),

            pack_command: env::var("PACK_COMMAND").unwrap_or(default.pack_command),

            unpack_command: env::var("UNPACK_COMMAND").unwrap_or(default.unpack_command),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            convert_timeout_secs: env::var("CONVERT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.convert_timeout_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),

            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),
        }
    }

    /// Directory the tool reads/writes packed `.xnb` files in
    pub fn packed_dir(&self) -> PathBuf {
        self.xnbcli_root.join("packed")
    }

    /// Directory the tool reads/writes unpacked `.sfditem`/descriptor files in
    pub fn unpacked_dir(&self) -> PathBuf {
        self.xnbcli_root.join("unpacked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.max_upload_size, 40 * 1024);
        assert_eq!(config.pack_command, "npm run pack");
        assert_eq!(config.unpack_command, "npm run unpack");
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_working_dirs_rooted_under_tool() {
        let config = ConverterConfig {
            xnbcli_root: PathBuf::from("/opt/xnbcli"),
            ..Default::default()
        };
        assert_eq!(config.packed_dir(), PathBuf::from("/opt/xnbcli/packed"));
        assert_eq!(config.unpacked_dir(), PathBuf::from("/opt/xnbcli/unpacked"));
    }
}
