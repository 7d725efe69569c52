use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub storage_path: String,
    pub allowed_extensions: Vec<String>,
    pub max_upload_size_mb: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub max_in_flight: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("PHOTOWALL_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            host: env::var("PHOTOWALL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            storage_path: env::var("PHOTOWALL_STORAGE_PATH")
                .unwrap_or_else(|_| "./imgs".to_string()),
            allowed_extensions: parse_extensions(
                &env::var("PHOTOWALL_ALLOWED_EXTENSIONS").unwrap_or_else(|_| "png,jpg".to_string()),
            ),
            max_upload_size_mb: env::var("PHOTOWALL_MAX_UPLOAD_MB")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            max_width: env::var("PHOTOWALL_MAX_WIDTH")
                .unwrap_or_else(|_| "1920".to_string())
                .parse()?,
            max_height: env::var("PHOTOWALL_MAX_HEIGHT")
                .unwrap_or_else(|_| "1080".to_string())
                .parse()?,
            max_in_flight: env::var("PHOTOWALL_MAX_IN_FLIGHT")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()?,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

/// Normalizes a comma-separated extension list: trimmed, lower-cased,
/// leading dots stripped, empties dropped.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
