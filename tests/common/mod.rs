//! Shared test infrastructure for integration tests.
//!
//! Builds synthetic ESPRESSO input directories (minimal FITS primary headers)
//! and runs the compiled binary against them with the mock engine in
//! `tests/mock-esorex.sh`.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const BLOCK_LEN: usize = 2880;

/// Raw frame types of a complete sky-mode dataset, in classification order.
pub const CALIBRATION_TYPES: [&str; 13] = [
    "BIAS",
    "DARK",
    "LED",
    "ORDERDEF,LAMP,OFF",
    "ORDERDEF,OFF,LAMP",
    "FLAT,LAMP,OFF",
    "FLAT,OFF,LAMP",
    "WAVE,FP,FP",
    "WAVE,FP,THAR",
    "WAVE,THAR,FP",
    "CONTAM,OFF,FP",
    "EFF,SKY,SKY",
    "FLUX,STD,SKY",
];

/// Static categories the stage templates look up.
pub const STATIC_TAGS: [&str; 14] = [
    "CCD_GEOM",
    "INST_CONFIG",
    "LED_FF_GAIN_WINDOWS",
    "STATIC_WAVE_MATRIX_A",
    "STATIC_WAVE_MATRIX_B",
    "REF_LINE_TABLE_A",
    "REF_LINE_TABLE_B",
    "STATIC_DLL_MATRIX_A",
    "STATIC_DLL_MATRIX_B",
    "STD_TABLE",
    "EXT_TABLE",
    "MASK_LUT",
    "FLUX_TEMPLATE",
    "MASK_TABLE",
];

fn card(keyword: &str, value: &str) -> String {
    let card = if keyword.len() > 8 {
        format!("{keyword} = {value}")
    } else {
        format!("{keyword:<8}= {value:>20}")
    };
    format!("{card:<80}")
}

fn quoted(value: &str) -> String {
    format!("'{:<8}'", value.replace('\'', "''"))
}

/// Write a data-less FITS file whose primary header holds `cards`.
pub fn write_fits(path: &Path, cards: &[(&str, String)]) {
    let mut header = card("SIMPLE", "T") + &card("BITPIX", "8") + &card("NAXIS", "0");
    for (keyword, value) in cards {
        header.push_str(&card(keyword, value));
    }
    header.push_str(&format!("{:<80}", "END"));
    while header.len() % BLOCK_LEN != 0 {
        header.push(' ');
    }
    fs::write(path, header).expect("write fits");
}

pub fn write_raw(dir: &Path, name: &str, dpr_type: &str, binning: (u32, u32)) -> PathBuf {
    let path = dir.join(name);
    write_fits(
        &path,
        &[
            ("HIERARCH ESO DPR TYPE", quoted(dpr_type)),
            ("EXPTIME", "60.0".to_string()),
            ("HIERARCH ESO DET BINX", binning.0.to_string()),
            ("HIERARCH ESO DET BINY", binning.1.to_string()),
        ],
    );
    path
}

pub fn write_static(dir: &Path, name: &str, tag: &str) -> PathBuf {
    let path = dir.join(name);
    write_fits(&path, &[("HIERARCH ESO PRO CATG", quoted(tag))]);
    path
}

/// Temporary raw/output/work directory triple.
pub struct Workspace {
    _temp: TempDir,
    pub raw: PathBuf,
    pub out: PathBuf,
    pub work: PathBuf,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("tempdir");
        let raw = temp.path().join("raw");
        let out = temp.path().join("reduced");
        let work = temp.path().join("work");
        fs::create_dir_all(&raw).expect("create raw");
        fs::create_dir_all(&work).expect("create work");
        Self {
            _temp: temp,
            raw,
            out,
            work,
        }
    }

    /// Populate `raw` with one frame per group at 2x1 and every static file.
    pub fn with_complete_dataset(self, science_type: &str) -> Self {
        for (idx, dpr_type) in CALIBRATION_TYPES.iter().enumerate() {
            write_raw(&self.raw, &format!("ESPRESSO.cal{idx:02}.fits"), dpr_type, (2, 1));
        }
        write_raw(&self.raw, "ESPRESSO.sci01.fits", science_type, (2, 1));
        // Same types at another binning must be ignored.
        write_raw(&self.raw, "ESPRESSO.zz-1x1.fits", "BIAS", (1, 1));
        for tag in STATIC_TAGS {
            write_static(&self.raw, &format!("M.ESPRESSO.{tag}.fits"), tag);
        }
        self
    }

    /// Command running the binary on this workspace, engine left unset.
    pub fn base_command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_espresso-cascade"));
        command
            .arg(&self.raw)
            .arg(&self.out)
            .arg("--work-dir")
            .arg(&self.work)
            .env_remove("RUST_LOG")
            .env_remove("ESOREX_COMMAND")
            .env_remove("MOCK_ESOREX_MODE");
        command
    }

    /// Command running the binary on this workspace with the mock engine.
    pub fn command(&self) -> Command {
        let mut command = self.base_command();
        command.arg("--engine").arg(mock_engine());
        command
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.work.join("calls.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Engine command line for the mock script, quoted for shell-words.
pub fn mock_engine() -> String {
    let script = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/mock-esorex.sh");
    format!("sh '{}'", script.display())
}

pub fn run(mut command: Command) -> Output {
    command.output().expect("run espresso-cascade")
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
