use super::{Artifact, FormatHandler, HandlerOptions, lowercase_name};
use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// PNG images, kept as raw bytes.
///
/// The load probe is content-based when the file exists: a `.png` name with
/// the wrong signature is refused so a later handler can try it.
pub struct PngHandler;

impl FormatHandler for PngHandler {
    fn name(&self) -> &'static str {
        "png"
    }

    fn can_load(&self, path: &Path) -> bool {
        if !lowercase_name(path).is_some_and(|name| name.ends_with(".png")) {
            return false;
        }
        if !path.is_file() {
            return true;
        }
        has_png_signature(path)
    }

    fn can_save(&self, path: &Path) -> bool {
        lowercase_name(path).is_some_and(|name| name.ends_with(".png"))
    }

    fn load(&self, path: &Path, _options: &HandlerOptions) -> Result<Artifact> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        if !bytes.starts_with(PNG_MAGIC) {
            bail!("{} is missing the PNG signature", path.display());
        }
        Ok(Artifact::Binary {
            format: "png",
            bytes,
        })
    }

    fn save(&self, artifact: &Artifact, path: &Path, _options: &HandlerOptions) -> Result<()> {
        match artifact {
            Artifact::Binary {
                format: "png",
                bytes,
            } => fs::write(path, bytes).with_context(|| format!("writing {}", path.display())),
            _ => bail!("only PNG data can be written to {}", path.display()),
        }
    }
}

fn has_png_signature(path: &Path) -> bool {
    let mut header = [0u8; 8];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|_| &header == PNG_MAGIC)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probe_checks_signature_of_existing_files() {
        let temp = TempDir::new().expect("temp dir");
        let real = temp.path().join("real.png");
        let fake = temp.path().join("fake.png");
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(b"rest");
        fs::write(&real, &bytes).unwrap();
        fs::write(&fake, b"not an image").unwrap();

        assert!(PngHandler.can_load(&real));
        assert!(!PngHandler.can_load(&fake));
        assert!(PngHandler.can_load(&temp.path().join("missing.png")));
        assert!(!PngHandler.can_load(&temp.path().join("real.jpg")));
    }
}
