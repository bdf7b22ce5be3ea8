#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CUTOFFS_JSON: &str = r#"[
    {"institution": "LDCE", "program": "Computer", "category": "OPEN", "year": 2024, "cutoff": 12000},
    {"institution": "LDCE", "program": "Computer", "category": "OPEN", "year": 2025, "cutoff": 10000},
    {"institution": "VGEC", "program": "IT", "category": "OPEN", "year": 2024, "cutoff": 8000},
    {"institution": "VGEC", "program": "IT", "category": "OPEN", "year": 2025, "cutoff": 9000},
    {"institution": "SCET", "program": "Mechanical", "category": "OPEN", "year": 2025, "cutoff": 30000},
    {"institution": "SCET", "program": "Mechanical", "category": "SC", "year": 2025, "cutoff": null}
]"#;

pub const PLACEMENTS_JSON: &str = r#"[
    {"year": "2019", "companies": [
        {"company": "TCS", "offers": 5},
        {"company": "Infosys", "offers": 40},
        {"company": "Wipro", "offers": 17}
    ]},
    {"year": "2020", "companies": [
        {"company": "Infosys", "offers": 30},
        {"company": "Wipro", "offers": 28, "remarks": "Elite track"}
    ]},
    {"year": "2022", "companies": [
        {"company": "TCS", "offers": 8}
    ]}
]"#;

/// Isolated working directory with a config file and fixture datasets.
pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub config: PathBuf,
    pub data: PathBuf,
    pub output: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_data(CUTOFFS_JSON, PLACEMENTS_JSON)
    }

    pub fn with_data(cutoffs: &str, placements: &str) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let data = root.join("data");
        let output = root.join("output");
        fs::create_dir_all(&data).expect("create data dir");
        fs::write(data.join("cutoffs.json"), cutoffs).expect("write cutoffs");
        fs::write(data.join("placements.json"), placements).expect("write placements");

        let config = root.join("config.toml");
        write_config(&config, &data, &output, "");

        Self {
            _tmp: tmp,
            root,
            config,
            data,
            output,
        }
    }

    pub fn set_extra_config(&self, extra: &str) {
        write_config(&self.config, &self.data, &self.output, extra);
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    /// Command without a `--config` argument.
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("campus-insights").expect("binary built");
        cmd.current_dir(&self.root).env_remove("RUST_LOG");
        cmd
    }
}

fn write_config(path: &Path, data: &Path, output: &Path, extra: &str) {
    let content = format!(
        "data_source_mode = \"local\"\ndata_directory = {:?}\noutput_directory = {:?}\n{}",
        data.display().to_string(),
        output.display().to_string(),
        extra
    );
    fs::write(path, content).expect("write config");
}
