use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the bid log and the reports are written.
///
/// # Examples
///
/// ```
/// use fdr_csv::CsvConfig;
///
/// let config = CsvConfig {
///     outputs_dir: "outputs".into(),
///     tag: Some("high_elasticity".into()),
/// };
/// assert_eq!(config.path("bid"), std::path::Path::new("outputs/bid_high_elasticity.csv"));
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvConfig {
    /// The directory holding every output file
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: PathBuf,

    /// The run tag, appended to every file name
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            outputs_dir: default_outputs_dir(),
            tag: None,
        }
    }
}

impl CsvConfig {
    /// The path of the output file `stem`, e.g. `{outputs_dir}/{stem}_{tag}.csv`
    pub fn path(&self, stem: &str) -> PathBuf {
        let name = match self.tag.as_deref() {
            Some(tag) if !tag.is_empty() => format!("{stem}_{tag}.csv"),
            _ => format!("{stem}.csv"),
        };
        self.outputs_dir.join(name)
    }
}
