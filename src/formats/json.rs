use super::{Artifact, FormatHandler, HandlerOptions, lowercase_name};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// JSON sidecars and metadata documents.
///
/// Loading always yields [`Artifact::Json`]; saving accepts JSON values and
/// tables (written as an array of row objects).
pub struct JsonHandler;

impl FormatHandler for JsonHandler {
    fn name(&self) -> &'static str {
        "json"
    }

    fn can_load(&self, path: &Path) -> bool {
        lowercase_name(path).is_some_and(|name| name.ends_with(".json"))
    }

    fn can_save(&self, path: &Path) -> bool {
        self.can_load(path)
    }

    fn load(&self, path: &Path, _options: &HandlerOptions) -> Result<Artifact> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let value: Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Artifact::Json(value))
    }

    fn save(&self, artifact: &Artifact, path: &Path, options: &HandlerOptions) -> Result<()> {
        let value = match artifact {
            Artifact::Json(value) => value.clone(),
            Artifact::Table(table) => serde_json::to_value(table.rows())?,
            Artifact::Binary { format, .. } => {
                bail!("cannot encode {format} data as JSON")
            }
        };
        let pretty = options
            .get("pretty")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let text = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }
}
