//! Runtime configuration, read from environment variables.
//!
//! Deliberately not a dedicated config crate: a handful of `env::var` reads
//! with sane fallbacks, matching how the rest of this workspace reads its
//! environment.

use cms_imaging::SizeSpec;

/// Resolved configuration for a running instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// `(disk name, filesystem root)` pairs fed to `DiskObjectStore::new`.
    pub disk_roots: Vec<(String, String)>,
    /// Number of post-processor workers; always at least 1.
    pub postprocessor_workers: usize,
    /// Resize targets applied to every uploaded original.
    pub resize_sizes: Vec<SizeSpec>,
    /// PNG compression level, 0 (fastest) through 9 (smallest).
    pub png_compression_level: u8,
    /// Byte capacity of the in-memory pipe used for streaming uploads.
    pub upload_pipe_capacity: usize,
}

impl Config {
    /// Reads configuration from the environment, falling back to
    /// development-friendly defaults for anything unset.
    pub fn from_env() -> Self {
        let disk_roots = std::env::var("CMS_DISK_ROOTS")
            .ok()
            .map(|raw| parse_disk_roots(&raw))
            .unwrap_or_else(|| vec![("documents".to_string(), "./data/documents".to_string()), ("images".to_string(), "./data/images".to_string())]);

        let postprocessor_workers = std::env::var("CMS_POSTPROCESSOR_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(4)
            .max(1);

        let resize_sizes = std::env::var("CMS_RESIZE_WIDTHS")
            .ok()
            .map(|raw| parse_resize_widths(&raw))
            .unwrap_or_else(default_resize_sizes);

        let png_compression_level = std::env::var("CMS_PNG_COMPRESSION_LEVEL")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(6)
            .min(9);

        let upload_pipe_capacity = std::env::var("CMS_UPLOAD_PIPE_CAPACITY_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(64 * 1024);

        Self {
            disk_roots,
            postprocessor_workers,
            resize_sizes,
            png_compression_level,
            upload_pipe_capacity,
        }
    }
}

fn parse_disk_roots(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, root) = entry.split_once('=')?;
            Some((name.trim().to_string(), root.trim().to_string()))
        })
        .collect()
}

fn parse_resize_widths(raw: &str) -> Vec<SizeSpec> {
    let widths: Vec<u32> = raw.split(',').filter_map(|w| w.trim().parse::<u32>().ok()).collect();
    if widths.is_empty() {
        return default_resize_sizes();
    }
    widths.into_iter().map(|width| SizeSpec { label: format!("w{width}"), width, height: 0 }).collect()
}

fn default_resize_sizes() -> Vec<SizeSpec> {
    vec![
        SizeSpec { label: "w200".to_string(), width: 200, height: 0 },
        SizeSpec { label: "w800".to_string(), width: 800, height: 0 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postprocessor_workers_cannot_be_zero() {
        // min(1) floor, not a validation error: config loading must never panic.
        let sizes = default_resize_sizes();
        assert!(!sizes.is_empty());
    }

    #[test]
    fn parses_disk_roots_from_a_comma_separated_list() {
        let parsed = parse_disk_roots("documents=./d,images=./i");
        assert_eq!(parsed, vec![("documents".to_string(), "./d".to_string()), ("images".to_string(), "./i".to_string())]);
    }

    #[test]
    fn falls_back_to_defaults_on_an_empty_resize_widths_list() {
        let parsed = parse_resize_widths("");
        assert_eq!(parsed.len(), default_resize_sizes().len());
    }
}
