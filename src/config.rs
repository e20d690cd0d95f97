//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.alertsplit.toml` files. Every value has a built-in default, so the
//! tool runs with no file at all.

use crate::models::GroupConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".alertsplit.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input table settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Partitioner output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Report colors.
    #[serde(default)]
    pub style: StyleConfig,

    /// Operating-post groups, processed in this order.
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            report: ReportConfig::default(),
            style: StyleConfig::default(),
            groups: default_groups(),
        }
    }
}

fn default_groups() -> Vec<GroupConfig> {
    vec![
        GroupConfig::new(
            "PA1",
            &[
                "CC13", "CC21", "CL2005", "CL3008", "CL3010", "CL3012", "CL3013", "CL3014",
                "CL3016", "CL3017", "CL3021", "CL3022", "CL3024", "CL3035", "CL3037", "CC02",
                "CC03", "CC09",
            ],
        ),
        GroupConfig::new(
            "PA2",
            &[
                "CL19", "CL2002", "CL2004", "CL3002", "CL3003", "CL3004", "CL3005", "CL3006",
                "CL3009", "CL3015", "CL3036", "CL3039", "CL3042", "CL3043", "CL206",
            ],
        ),
        GroupConfig::new(
            "PA3",
            &[
                "C11", "CL2001", "CL2003", "CL2006", "CL2018", "CL3001", "CL3011", "CL3018",
                "CL3023", "CL3025", "CL3027", "CL3030", "CL3032", "CL3033", "CL3024", "CL2013",
                "CL2014", "CL2015",
            ],
        ),
        GroupConfig::new(
            "PA4",
            &[
                "CC04", "CC10", "CC14", "CL2007", "CL2008", "CL3007", "CL3019", "CL3020",
                "CL3026", "CL3028", "CL3029", "CL3031", "CL3038", "CL3040", "CL3041", "CC16",
                "CC17", "SL001",
            ],
        ),
    ]
}

/// Character encoding of the input table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// ISO-8859-1: every byte is the code point of the same value.
    #[default]
    #[serde(alias = "iso-8859-1")]
    Latin1,
    /// UTF-8, decoded lossily.
    #[serde(alias = "utf-8")]
    Utf8,
}

/// Input table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub encoding: Encoding,

    /// Fixed field delimiter. Detected from the file when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,

    /// Column holding the membership code.
    #[serde(default = "default_prefix_column")]
    pub prefix_column: String,

    /// Column holding the alert category.
    #[serde(default = "default_category_column")]
    pub category_column: String,

    /// Column holding the driver identifier.
    #[serde(default = "default_driver_column")]
    pub driver_column: String,

    /// Name of the injected group column.
    #[serde(default = "default_group_column")]
    pub group_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            delimiter: None,
            prefix_column: default_prefix_column(),
            category_column: default_category_column(),
            driver_column: default_driver_column(),
            group_column: default_group_column(),
        }
    }
}

fn default_prefix_column() -> String {
    "PREFIXO".to_string()
}

fn default_category_column() -> String {
    "TIPO".to_string()
}

fn default_driver_column() -> String {
    "MOTORISTA".to_string()
}

fn default_group_column() -> String {
    "PA".to_string()
}

/// Partitioner output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Subfolder created beside the input file.
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Columns always removed from artifacts.
    #[serde(default = "default_removed_columns")]
    pub removed_columns: Vec<String>,

    /// Categories always excluded.
    #[serde(default = "default_excluded_categories")]
    pub excluded_categories: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            removed_columns: default_removed_columns(),
            excluded_categories: default_excluded_categories(),
        }
    }
}

fn default_folder() -> String {
    "exportados".to_string()
}

fn default_removed_columns() -> Vec<String> {
    vec![
        "CIDADE",
        "ESTADO",
        "LATITUDE",
        "LONGITUDE",
        "LIMIAR",
        "UO",
        "PONTO_REFERENCIA",
        "USUARIO FEEDBACK",
        "FEEDBACK VIDEO",
        "ULTIMO_COMENTARIO",
        "ATRIBUIDO",
        "CATEGORIA",
        "CERCA ELETRÔNICA",
        "INTEGRADOR",
        "GRUPO",
        "VISUALIZADO POR",
        "NIVEL",
        "RÓTULO",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded_categories() -> Vec<String> {
    vec!["EXCESSO_RPM", "BOCEJO"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Number of drivers in the ranking panels.
    #[serde(default = "default_top_drivers")]
    pub top_drivers: usize,

    /// Candidate date columns, tried in order.
    #[serde(default = "default_date_columns")]
    pub date_columns: Vec<String>,

    /// File name of the composite image.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Image width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Header title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_drivers: default_top_drivers(),
            date_columns: default_date_columns(),
            filename: default_filename(),
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

fn default_top_drivers() -> usize {
    7
}

fn default_date_columns() -> Vec<String> {
    vec!["DATA", "Date", "data", "DATA_OCORRENCIA", "DATA_ALERTA"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_filename() -> String {
    "relatorio_alertas_com_analise_temporal.png".to_string()
}

fn default_width() -> u32 {
    3600
}

fn default_height() -> u32 {
    3000
}

fn default_title() -> String {
    "RELATÓRIO EXECUTIVO DE ANÁLISE DE ALERTAS COM TENDÊNCIAS TEMPORAIS".to_string()
}

/// Report colors as `#rrggbb` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Colors assigned to groups in configuration order.
    #[serde(default = "default_group_colors")]
    pub group_colors: Vec<String>,

    /// Palette cycled for categories without a fixed color.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,

    /// Color of the leading bar in the driver ranking.
    #[serde(default = "default_highlight")]
    pub highlight: String,

    /// Color of the remaining ranking bars.
    #[serde(default = "default_muted")]
    pub muted: String,

    #[serde(default = "default_background")]
    pub background: String,

    #[serde(default = "default_text")]
    pub text: String,

    /// Fixed colors for well-known categories.
    #[serde(default = "default_category_colors")]
    pub category_colors: BTreeMap<String, String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            group_colors: default_group_colors(),
            palette: default_palette(),
            highlight: default_highlight(),
            muted: default_muted(),
            background: default_background(),
            text: default_text(),
            category_colors: default_category_colors(),
        }
    }
}

fn default_group_colors() -> Vec<String> {
    vec!["#DC2626", "#16A34A", "#7C3AED", "#EA580C"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_category_colors() -> BTreeMap<String, String> {
    [
        ("EXCESSO_VELOCIDADE", "#DC2626"),
        ("FREADA_BRUSCA", "#16A34A"),
        ("ACELERACAO_BRUSCA", "#2563EB"),
        ("CURVA_FECHADA", "#7C3AED"),
        ("FADIGA", "#EA580C"),
        ("OUTROS", "#6B7280"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_palette() -> Vec<String> {
    vec![
        "#1F77B4", "#FF7F0E", "#2CA02C", "#D62728", "#9467BD", "#8C564B", "#E377C2", "#7F7F7F",
        "#BCBD22", "#17BECF",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_highlight() -> String {
    "#DC2626".to_string()
}

fn default_muted() -> String {
    "#64748B".to_string()
}

fn default_background() -> String {
    "#FFFFFF".to_string()
}

fn default_text() -> String {
    "#000000".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.report.top_drivers == 0 {
            anyhow::bail!("report.top_drivers must be at least 1");
        }
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(top) = args.top_drivers {
            self.report.top_drivers = top;
        }
    }

    /// Membership codes listed under more than one group, with the groups
    /// that list them.
    pub fn overlapping_codes(&self) -> Vec<(String, Vec<String>)> {
        let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for group in &self.groups {
            for code in &group.codes {
                let entry = owners.entry(code.as_str()).or_default();
                if !entry.contains(&group.id) {
                    entry.push(group.id.clone());
                }
            }
        }

        owners
            .into_iter()
            .filter(|(_, groups)| groups.len() > 1)
            .map(|(code, groups)| (code.to_string(), groups))
            .collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> Result<String> {
        let config = Config::default();
        toml::to_string_pretty(&config).context("Failed to serialize default config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.groups.len(), 4);
        assert_eq!(config.groups[0].id, "PA1");
        assert_eq!(config.groups[0].codes.len(), 18);
        assert_eq!(config.report.top_drivers, 7);
        assert_eq!(config.output.folder, "exportados");
        assert_eq!(config.input.encoding, Encoding::Latin1);
        assert!(config
            .output
            .excluded_categories
            .contains(&"BOCEJO".to_string()));
        assert_eq!(config.output.removed_columns.len(), 18);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[input]
encoding = "utf-8"
delimiter = ";"

[report]
top_drivers = 3

[[groups]]
id = "NORTE"
codes = ["A1", "A2"]

[[groups]]
id = "SUL"
codes = ["B1"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.encoding, Encoding::Utf8);
        assert_eq!(config.input.delimiter, Some(';'));
        assert_eq!(config.input.prefix_column, "PREFIXO");
        assert_eq!(config.report.top_drivers, 3);
        assert_eq!(config.report.date_columns[0], "DATA");
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[1].id, "SUL");
        assert_eq!(config.output.folder, "exportados");
    }

    #[test]
    fn test_load_rejects_zero_top_drivers() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[report]\ntop_drivers = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("top_drivers"));

        std::fs::write(&path, "[report]\ntop_drivers = 2\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().report.top_drivers, 2);
    }

    #[test]
    fn test_default_overlap_is_reported() {
        let overlaps = Config::default().overlapping_codes();
        assert_eq!(
            overlaps,
            vec![("CL3024".to_string(), vec!["PA1".to_string(), "PA3".to_string()])]
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("[[groups]]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.groups, Config::default().groups);
    }
}
