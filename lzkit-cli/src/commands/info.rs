//! Info command.

use crate::utils::FileError;
use lzkit_container::{ContainerInfo, inspect};
use lzkit_core::IoSource;
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};

/// JSON form of a container's header metadata.
#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncompressed_size: Option<u64>,
    pub dictionary_size: u32,
    pub dictionary_size_log2: u32,
    pub lc: u8,
    pub lp: u8,
    pub pb: u8,
    /// Properties block as lowercase hex.
    pub properties: String,
}

impl InfoReport {
    pub fn new(path: &Path, info: &ContainerInfo) -> Self {
        Self {
            file: path.display().to_string(),
            uncompressed_size: info.original_size,
            dictionary_size: info.dictionary_size,
            dictionary_size_log2: info.dictionary_size_log2(),
            lc: info.lc,
            lp: info.lp,
            pb: info.pb,
            properties: info
                .properties
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect(),
        }
    }
}

/// Read the header of the file at `path`.
pub fn read_info(path: &Path) -> Result<ContainerInfo, Box<dyn Error>> {
    let mut file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    read_header(&mut file).map_err(|e| FileError::new(path, None, e).into())
}

/// Parse the header at the current position, leaving `file` just past it.
fn read_header(file: &mut File) -> lzkit_core::Result<ContainerInfo> {
    inspect(&mut IoSource::new(file))
}

/// Text block for one file: a blank line, the name, then the fields.
pub fn render_text(path: &Path, info: &ContainerInfo) -> String {
    format!("\n{}\n{}\n", path.display(), info)
}

/// Print header metadata for each file.
///
/// Unreadable files are reported and skipped; the command fails at the end
/// if any were.
pub fn cmd_info(files: &[PathBuf], json: bool) -> Result<(), Box<dyn Error>> {
    let mut reports = Vec::new();
    let mut failed = 0usize;

    for path in files {
        match read_info(path) {
            Ok(info) if json => reports.push(InfoReport::new(path, &info)),
            Ok(info) => println!("{}", render_text(path, &info)),
            Err(e) => {
                eprintln!("Error: {}", e);
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if failed > 0 {
        return Err(format!("{} of {} files could not be read", failed, files.len()).into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzkit_container::{ContainerHeader, UNKNOWN_SIZE, encode_header};
    use std::io::{Read, Seek};

    fn sample(size: u64) -> ContainerInfo {
        let header = ContainerHeader::new([0x5D, 0x00, 0x00, 0x01, 0x00], size);
        ContainerInfo::from_header(&header).unwrap()
    }

    #[test]
    fn test_report_fields() {
        let report = InfoReport::new(Path::new("a.lzma"), &sample(17));
        assert_eq!(report.file, "a.lzma");
        assert_eq!(report.uncompressed_size, Some(17));
        assert_eq!(report.dictionary_size, 65536);
        assert_eq!(report.dictionary_size_log2, 16);
        assert_eq!((report.lc, report.lp, report.pb), (3, 0, 2));
        assert_eq!(report.properties, "5d00000100");
    }

    #[test]
    fn test_report_json_omits_unknown_size() {
        let report = InfoReport::new(Path::new("a.lzma"), &sample(UNKNOWN_SIZE));
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("uncompressed_size"));
        assert!(json.contains("\"dictionary_size\":65536"));
    }

    #[test]
    fn test_read_header_stops_at_payload() {
        let path = std::env::temp_dir().join(format!("lzkit-info-header-{}", std::process::id()));
        let mut contents = encode_header([0x5D, 0x00, 0x00, 0x10, 0x00], 300).to_vec();
        contents.extend_from_slice(&[0x42; 9000]);
        std::fs::write(&path, &contents).unwrap();

        let mut file = File::open(&path).unwrap();
        let info = read_header(&mut file).unwrap();
        assert_eq!(info.original_size, Some(300));
        assert_eq!(info.dictionary_size, 1 << 20);
        assert_eq!(file.stream_position().unwrap(), 13);

        let mut rest = Vec::new();
        file.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), 9000);

        assert_eq!(read_info(&path).unwrap(), info);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_render_text() {
        let text = render_text(Path::new("a.lzma"), &sample(17));
        assert!(text.starts_with("\na.lzma\nUncompressed size:              0 MB (17 bytes)\n"));
        assert!(text.ends_with("Number of pos bits (pb):        2\n"));
    }
}
