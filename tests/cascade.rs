//! End-to-end runs of the cascade against the mock engine.

mod common;

use common::{run, stderr, Workspace};
use std::fs;

const SCIENCE_STEM: &str = "ESPRESSO.sci01";

#[test]
fn sky_run_relocates_calibrations_and_science_products() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    let output = run(ws.command());
    assert!(output.status.success(), "{}", stderr(&output));

    let calls = ws.calls();
    assert_eq!(calls.len(), 12, "{calls:#?}");
    assert!(calls[0].starts_with("espdr_mbias "), "{}", calls[0]);
    assert!(calls[0].ends_with("/BIAS.txt"), "{}", calls[0]);
    assert!(calls[6].starts_with("espdr_wave_THAR "), "{}", calls[6]);
    assert!(calls[6].ends_with("/WAVE_FP_TH.txt"), "{}", calls[6]);
    assert!(calls[11].starts_with("espdr_sci_red --background_sw=off "), "{}", calls[11]);
    assert!(calls[11].ends_with("/SCI_OBJ_combined.txt"), "{}", calls[11]);

    for product in [
        "ESPRESSO_master_bias_res.fits",
        "ESPRESSO_WAVE_MATRIX_A.fits",
        "ESPRESSO_WAVE_MATRIX_B.fits",
        "ESPRESSO_ABS_EFF_A.fits",
        "esorex_masterbias.log",
        "esorex_wave_thar_fp.log",
        "esorex_cal_flux.log",
    ] {
        assert!(ws.out.join(product).is_file(), "missing {product}");
    }
    let science = ws.out.join("SCIENCE_PRODUCTS");
    for suffix in [
        "CCF_A.fits",
        "CCF_B.fits",
        "S1D_SKYSUB_FLUXCAL_A.fits",
        "esorex_sci_red.log",
    ] {
        let name = format!("{SCIENCE_STEM}_{suffix}");
        assert!(science.join(&name).is_file(), "missing {name}");
    }

    let leftovers: Vec<String> = fs::read_dir(&ws.work)
        .expect("read work dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with("fits") || name.ends_with(".log"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(ws.out.join("reduction_report.json")).expect("read report"),
    )
    .expect("parse report");
    assert_eq!(report["binning"], "2x1");
    assert_eq!(report["fiber_b"], "sky");
    let stages = report["stages"].as_array().expect("stages");
    assert_eq!(stages.len(), 12);
    assert_eq!(stages[11]["exposure"], SCIENCE_STEM);
}

#[test]
fn fabry_perot_run_skips_sky_only_products() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,FP");
    let mut command = ws.command();
    command.arg("2x1").arg("FP");
    let output = run(command);
    assert!(output.status.success(), "{}", stderr(&output));

    let science = ws.out.join("SCIENCE_PRODUCTS");
    assert!(science.join(format!("{SCIENCE_STEM}_CCF_A.fits")).is_file());
    assert!(!science.join(format!("{SCIENCE_STEM}_CCF_B.fits")).exists());
    assert!(!science.join(format!("{SCIENCE_STEM}_S2D_SKYSUB_A.fits")).exists());

    let fragments = fs::read_to_string(ws.out.join("SCI_OBJ_part1.txt")).expect("fragments");
    assert!(fragments.trim_end().ends_with(" OBJ_FP"), "{fragments}");
}

#[test]
fn engine_command_can_come_from_the_environment() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    let mut command = ws.base_command();
    command.env("ESOREX_COMMAND", common::mock_engine());
    let output = run(command);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(ws.calls().len(), 12);
}

#[test]
fn failing_recipe_aborts_the_run() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    let mut command = ws.command();
    command.env("MOCK_ESOREX_MODE", "fail");
    let output = run(command);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("espdr_mbias"), "{err}");
    assert!(err.contains("master bias"), "{err}");
    assert_eq!(ws.calls().len(), 1, "no stage runs after a failure");
    assert!(ws.out.join("BIAS.txt").is_file());
    assert!(!ws.out.join("ESPRESSO_master_bias.fits").exists());
}

#[test]
fn silent_engine_failure_names_stage_and_product() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    let mut command = ws.command();
    command.env("MOCK_ESOREX_MODE", "silent");
    let output = run(command);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("master bias"), "{err}");
    assert!(err.contains("ESPRESSO_master_bias.fits"), "{err}");
    assert_eq!(ws.calls().len(), 1);
    assert!(!ws.out.join("reduction_report.json").exists());
}

#[test]
fn manifests_only_writes_sof_files_without_running_recipes() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    let mut command = ws.base_command();
    command.arg("--manifests-only");
    let output = run(command);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(ws.calls().is_empty());

    for name in [
        "BIAS.txt",
        "DARK.txt",
        "LED.txt",
        "ORDERDEF.txt",
        "FLAT.txt",
        "WAVE_FP_FP.txt",
        "WAVE_FP_TH.txt",
        "WAVE_TH_FP.txt",
        "CONTAM.txt",
        "EFF_SKY.txt",
        "FLUX_STD.txt",
        "SCI_OBJ_part1.txt",
        "SCI_OBJ_part2.txt",
    ] {
        let text = fs::read_to_string(ws.out.join(name)).expect(name);
        assert!(!text.trim().is_empty(), "{name} is empty");
    }

    let bias = fs::read_to_string(ws.out.join("BIAS.txt")).expect("bias");
    let tags: Vec<&str> = bias
        .lines()
        .filter_map(|line| line.rsplit(' ').next())
        .collect();
    assert_eq!(tags, vec!["BIAS", "CCD_GEOM", "INST_CONFIG"]);
    assert!(bias.lines().next().is_some_and(|line| line.contains("ESPRESSO.cal00.fits")));
}

#[test]
fn second_flux_standard_warns_and_second_contamination_frame_fails() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    common::write_raw(&ws.raw, "ESPRESSO.cal99.fits", "FLUX,STD,SKY", (2, 1));
    let mut command = ws.base_command();
    command.arg("--manifests-only");
    let output = run(command);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("only the first is used"));
    let flux = fs::read_to_string(ws.out.join("FLUX_STD.txt")).expect("flux");
    assert!(flux.contains("ESPRESSO.cal12.fits FLUX"), "{flux}");
    assert!(!flux.contains("ESPRESSO.cal99.fits"), "{flux}");

    common::write_raw(&ws.raw, "ESPRESSO.cal98.fits", "CONTAM,OFF,FP", (2, 1));
    let mut command = ws.base_command();
    command.arg("--manifests-only");
    let output = run(command);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("CONTAM,OFF,FP"), "{}", stderr(&output));
}

#[test]
fn leftover_products_from_an_earlier_run_are_not_relocated() {
    let ws = Workspace::new().with_complete_dataset("OBJECT,SKY");
    for product in ["ESPRESSO_master_bias.fits", "ESPRESSO_master_bias_res.fits"] {
        fs::write(ws.work.join(product), "stale").expect("seed work dir");
    }
    fs::write(ws.work.join("esorex.log"), "stale").expect("seed log");

    let mut command = ws.command();
    command.env("MOCK_ESOREX_MODE", "silent");
    let output = run(command);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("ESPRESSO_master_bias"), "{err}");
    assert!(err.contains("stale engine output"), "{err}");
    assert!(!ws.out.join("ESPRESSO_master_bias.fits").exists());
    assert!(!ws.out.join("esorex_masterbias.log").exists());
}
