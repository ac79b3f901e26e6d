//! Stage table: recipe, SOF template and expected products per stage.
use super::{FrameGroup, MASK_TABLE_TAG};
use crate::config::FiberBMode;
use serde::Serialize;
use std::fmt;

/// Log file the engine writes into its working directory on every run.
pub const ENGINE_LOG: &str = "esorex.log";
/// Prefix the engine puts on every product file name.
pub const PRODUCT_PREFIX: &str = "ESPRESSO_";
/// Options passed to the science recipe only.
const SCIENCE_OPTIONS: &[&str] = &["--background_sw=off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MasterBias,
    MasterDark,
    BadPixels,
    OrderDefinition,
    MasterFlat,
    WaveFpFp,
    WaveFpThar,
    WaveTharFp,
    Contamination,
    RelativeEfficiency,
    FluxCalibration,
    Science,
}

impl Stage {
    /// Execution order; each stage consumes products of the ones before it.
    pub const ORDER: [Stage; 12] = [
        Stage::MasterBias,
        Stage::MasterDark,
        Stage::BadPixels,
        Stage::OrderDefinition,
        Stage::MasterFlat,
        Stage::WaveFpFp,
        Stage::WaveFpThar,
        Stage::WaveTharFp,
        Stage::Contamination,
        Stage::RelativeEfficiency,
        Stage::FluxCalibration,
        Stage::Science,
    ];

    pub fn spec(self) -> &'static StageSpec {
        &STAGES[self as usize]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().title)
    }
}

/// One non-raw SOF entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Single-valued static calibration looked up by category.
    Static(&'static str),
    /// Every static calibration of a set-valued category.
    StaticSet(&'static str),
    /// Product of an earlier stage, expected under the output directory.
    Product {
        file: &'static str,
        tag: &'static str,
    },
}

/// A file the engine is expected to leave in its working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub file: &'static str,
    pub sky_only: bool,
}

impl Product {
    const fn always(file: &'static str) -> Self {
        Self {
            file,
            sky_only: false,
        }
    }

    const fn sky_only(file: &'static str) -> Self {
        Self {
            file,
            sky_only: true,
        }
    }

    /// Whether the engine produces this file for the given fiber-B mode.
    pub fn expected_for(&self, fiber_b: FiberBMode) -> bool {
        !self.sky_only || fiber_b == FiberBMode::Sky
    }
}

#[derive(Debug)]
pub struct StageSpec {
    pub stage: Stage,
    /// Human-readable name used in logs and errors.
    pub title: &'static str,
    pub recipe: &'static str,
    pub options: &'static [&'static str],
    /// SOF file name under the output directory.
    pub manifest_file: &'static str,
    /// Name the engine log is given once relocated.
    pub log_name: &'static str,
    /// Raw frame groups listed first in the SOF, in this order.
    pub groups: &'static [FrameGroup],
    /// Entries following the raw frames.
    pub template: &'static [Source],
    pub products: &'static [Product],
    /// Whether leftover scratch files are deleted after the stage.
    pub clean_scratch: bool,
}

const fn product(file: &'static str, tag: &'static str) -> Source {
    Source::Product { file, tag }
}

const CCD_GEOM: Source = Source::Static("CCD_GEOM");
const INST_CONFIG: Source = Source::Static("INST_CONFIG");
const MASTER_BIAS_RES: Source = product("ESPRESSO_master_bias_res.fits", "MASTER_BIAS_RES");
const HOT_PIXEL_MASK: Source = product("ESPRESSO_hot_pixels.fits", "HOT_PIXEL_MASK");
const BAD_PIXEL_MASK: Source = product("ESPRESSO_bad_pixels.fits", "BAD_PIXEL_MASK");
const ORDER_TABLE_A: Source = product("ESPRESSO_ORDER_TABLE_A.fits", "ORDER_TABLE_A");
const ORDER_TABLE_B: Source = product("ESPRESSO_ORDER_TABLE_B.fits", "ORDER_TABLE_B");
const ORDER_PROFILE_A: Source = product("ESPRESSO_ORDER_PROFILE_A.fits", "ORDER_PROFILE_A");
const ORDER_PROFILE_B: Source = product("ESPRESSO_ORDER_PROFILE_B.fits", "ORDER_PROFILE_B");
const BLAZE_A: Source = product("ESPRESSO_BLAZE_A.fits", "BLAZE_A");
const BLAZE_B: Source = product("ESPRESSO_BLAZE_B.fits", "BLAZE_B");
const FSPECTRUM_A: Source = product("ESPRESSO_FLAT_A.fits", "FSPECTRUM_A");
const FSPECTRUM_B: Source = product("ESPRESSO_FLAT_B.fits", "FSPECTRUM_B");
const WAVE_MATRIX_THAR_FP_A: Source = product("ESPRESSO_WAVE_MATRIX_A.fits", "WAVE_MATRIX_THAR_FP_A");
const WAVE_MATRIX_FP_THAR_B: Source = product("ESPRESSO_WAVE_MATRIX_B.fits", "WAVE_MATRIX_FP_THAR_B");

const WAVE_THAR_TEMPLATE: &[Source] = &[
    CCD_GEOM,
    INST_CONFIG,
    MASTER_BIAS_RES,
    HOT_PIXEL_MASK,
    BAD_PIXEL_MASK,
    ORDER_TABLE_A,
    ORDER_TABLE_B,
    BLAZE_A,
    BLAZE_B,
    FSPECTRUM_A,
    FSPECTRUM_B,
    ORDER_PROFILE_A,
    ORDER_PROFILE_B,
    Source::Static("REF_LINE_TABLE_A"),
    Source::Static("REF_LINE_TABLE_B"),
    product("ESPRESSO_FP_SEARCHED_LINE_TABLE_A.fits", "FP_SEARCHED_LINE_TABLE_FP_FP_A"),
    product("ESPRESSO_FP_SEARCHED_LINE_TABLE_B.fits", "FP_SEARCHED_LINE_TABLE_FP_FP_B"),
    product("ESPRESSO_S2D_BLAZE_FP_FP_A.fits", "S2D_BLAZE_FP_FP_A"),
    product("ESPRESSO_S2D_BLAZE_FP_FP_B.fits", "S2D_BLAZE_FP_FP_B"),
    Source::Static("STATIC_DLL_MATRIX_A"),
    Source::Static("STATIC_DLL_MATRIX_B"),
    Source::Static("STATIC_WAVE_MATRIX_A"),
    Source::Static("STATIC_WAVE_MATRIX_B"),
];

static STAGES: [StageSpec; 12] = [
    StageSpec {
        stage: Stage::MasterBias,
        title: "master bias",
        recipe: "espdr_mbias",
        options: &[],
        manifest_file: "BIAS.txt",
        log_name: "esorex_masterbias.log",
        groups: &[FrameGroup::Bias],
        template: &[CCD_GEOM, INST_CONFIG],
        products: &[
            Product::always("ESPRESSO_master_bias.fits"),
            Product::always("ESPRESSO_master_bias_res.fits"),
        ],
        clean_scratch: false,
    },
    StageSpec {
        stage: Stage::MasterDark,
        title: "master dark and hot pixel map",
        recipe: "espdr_mdark",
        options: &[],
        manifest_file: "DARK.txt",
        log_name: "esorex_masterdark.log",
        groups: &[FrameGroup::Dark],
        template: &[CCD_GEOM, INST_CONFIG, MASTER_BIAS_RES],
        products: &[
            Product::always("ESPRESSO_master_dark.fits"),
            Product::always("ESPRESSO_hot_pixels.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::BadPixels,
        title: "bad pixel map",
        recipe: "espdr_led_ff",
        options: &[],
        manifest_file: "LED.txt",
        log_name: "esorex_badpixels.log",
        groups: &[FrameGroup::Led],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            Source::Static("LED_FF_GAIN_WINDOWS"),
            MASTER_BIAS_RES,
            HOT_PIXEL_MASK,
        ],
        products: &[Product::always("ESPRESSO_bad_pixels.fits")],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::OrderDefinition,
        title: "order definition",
        recipe: "espdr_orderdef",
        options: &[],
        manifest_file: "ORDERDEF.txt",
        log_name: "esorex_orderdef.log",
        groups: &[FrameGroup::OrderDefA, FrameGroup::OrderDefB],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            MASTER_BIAS_RES,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
        ],
        products: &[
            Product::always("ESPRESSO_ORDER_TABLE_A.fits"),
            Product::always("ESPRESSO_ORDER_TABLE_B.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::MasterFlat,
        title: "master flat",
        recipe: "espdr_mflat",
        options: &[],
        manifest_file: "FLAT.txt",
        log_name: "esorex_mflat.log",
        groups: &[FrameGroup::FlatA, FrameGroup::FlatB],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
            MASTER_BIAS_RES,
            ORDER_TABLE_A,
            ORDER_TABLE_B,
            Source::Static("STATIC_WAVE_MATRIX_A"),
            Source::Static("STATIC_WAVE_MATRIX_B"),
        ],
        products: &[
            Product::always("ESPRESSO_ORDER_PROFILE_A.fits"),
            Product::always("ESPRESSO_ORDER_PROFILE_B.fits"),
            Product::always("ESPRESSO_BLAZE_A.fits"),
            Product::always("ESPRESSO_BLAZE_B.fits"),
            Product::always("ESPRESSO_FLAT_A.fits"),
            Product::always("ESPRESSO_FLAT_B.fits"),
            Product::always("ESPRESSO_background_map_A.fits"),
            Product::always("ESPRESSO_background_map_B.fits"),
            Product::always("ESPRESSO_spectrum_extracted_A.fits"),
            Product::always("ESPRESSO_spectrum_extracted_B.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::WaveFpFp,
        title: "wavelength solution FP-FP",
        recipe: "espdr_wave_FP",
        options: &[],
        manifest_file: "WAVE_FP_FP.txt",
        log_name: "esorex_wave_fp_fp.log",
        groups: &[FrameGroup::WaveFpFp],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            MASTER_BIAS_RES,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
            ORDER_TABLE_A,
            ORDER_TABLE_B,
            BLAZE_A,
            BLAZE_B,
            FSPECTRUM_A,
            FSPECTRUM_B,
            ORDER_PROFILE_A,
            ORDER_PROFILE_B,
        ],
        products: &[
            Product::always("ESPRESSO_S2D_FP_FP_A.fits"),
            Product::always("ESPRESSO_S2D_FP_FP_B.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_FP_FP_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_FP_FP_B.fits"),
            Product::always("ESPRESSO_FP_SEARCHED_LINE_TABLE_A.fits"),
            Product::always("ESPRESSO_FP_SEARCHED_LINE_TABLE_B.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::WaveFpThar,
        title: "wavelength solution FP-ThAr",
        recipe: "espdr_wave_THAR",
        options: &[],
        manifest_file: "WAVE_FP_TH.txt",
        log_name: "esorex_wave_fp_thar.log",
        groups: &[FrameGroup::WaveFpThar],
        template: WAVE_THAR_TEMPLATE,
        products: &[
            Product::always("ESPRESSO_AIR_DLL_MATRIX_B.fits"),
            Product::always("ESPRESSO_AIR_WAVE_MATRIX_B.fits"),
            Product::always("ESPRESSO_DLL_MATRIX_B.fits"),
            Product::always("ESPRESSO_FP_FITTED_LINE_TABLE_B.fits"),
            Product::always("ESPRESSO_LINE_TABLE_RAW_B.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_FP_THAR_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_FP_THAR_B.fits"),
            Product::always("ESPRESSO_S2D_FP_THAR_A.fits"),
            Product::always("ESPRESSO_S2D_FP_THAR_B.fits"),
            Product::always("ESPRESSO_WAVE_MATRIX_B.fits"),
            Product::always("ESPRESSO_WAVE_TABLE_B.fits"),
            Product::always("ESPRESSO_THAR_LINE_TABLE_B.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::WaveTharFp,
        title: "wavelength solution ThAr-FP",
        recipe: "espdr_wave_THAR",
        options: &[],
        manifest_file: "WAVE_TH_FP.txt",
        log_name: "esorex_wave_thar_fp.log",
        groups: &[FrameGroup::WaveTharFp],
        template: WAVE_THAR_TEMPLATE,
        products: &[
            Product::always("ESPRESSO_AIR_DLL_MATRIX_A.fits"),
            Product::always("ESPRESSO_AIR_WAVE_MATRIX_A.fits"),
            Product::always("ESPRESSO_DLL_MATRIX_A.fits"),
            Product::always("ESPRESSO_FP_FITTED_LINE_TABLE_A.fits"),
            Product::always("ESPRESSO_LINE_TABLE_RAW_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_THAR_FP_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_THAR_FP_B.fits"),
            Product::always("ESPRESSO_S2D_THAR_FP_A.fits"),
            Product::always("ESPRESSO_S2D_THAR_FP_B.fits"),
            Product::always("ESPRESSO_WAVE_MATRIX_A.fits"),
            Product::always("ESPRESSO_WAVE_TABLE_A.fits"),
            Product::always("ESPRESSO_THAR_LINE_TABLE_A.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::Contamination,
        title: "cross-fiber contamination",
        recipe: "espdr_cal_contam",
        options: &[],
        manifest_file: "CONTAM.txt",
        log_name: "esorex_cal_contam.log",
        groups: &[FrameGroup::Contam],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            MASTER_BIAS_RES,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
            ORDER_TABLE_A,
            ORDER_TABLE_B,
            ORDER_PROFILE_A,
            ORDER_PROFILE_B,
            FSPECTRUM_A,
            FSPECTRUM_B,
        ],
        products: &[
            Product::always("ESPRESSO_CONTAM_FP_B.fits"),
            Product::always("ESPRESSO_CONTAM_S2D_A.fits"),
            Product::always("ESPRESSO_CONTAM_S2D_B.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::RelativeEfficiency,
        title: "relative fiber efficiency",
        recipe: "espdr_cal_eff_ab",
        options: &[],
        manifest_file: "EFF_SKY.txt",
        log_name: "esorex_cal_eff_ab.log",
        groups: &[FrameGroup::Efficiency],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
            ORDER_TABLE_A,
            ORDER_TABLE_B,
            ORDER_PROFILE_A,
            ORDER_PROFILE_B,
            FSPECTRUM_A,
            FSPECTRUM_B,
        ],
        products: &[
            Product::always("ESPRESSO_S2D_BLAZE_EFF_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_EFF_B.fits"),
            Product::always("ESPRESSO_REL_EFF_B.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::FluxCalibration,
        title: "flux calibration",
        recipe: "espdr_cal_flux",
        options: &[],
        manifest_file: "FLUX_STD.txt",
        log_name: "esorex_cal_flux.log",
        groups: &[FrameGroup::FluxStandard],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            Source::Static("STD_TABLE"),
            Source::Static("EXT_TABLE"),
            MASTER_BIAS_RES,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
            ORDER_TABLE_A,
            ORDER_TABLE_B,
            ORDER_PROFILE_A,
            ORDER_PROFILE_B,
            FSPECTRUM_A,
            FSPECTRUM_B,
            BLAZE_A,
            BLAZE_B,
            WAVE_MATRIX_THAR_FP_A,
            WAVE_MATRIX_FP_THAR_B,
        ],
        products: &[
            Product::always("ESPRESSO_S2D_STD_A.fits"),
            Product::always("ESPRESSO_S1D_STD_A.fits"),
            Product::always("ESPRESSO_S1D_ENERGY_STD_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_STD_A.fits"),
            Product::always("ESPRESSO_AVG_FLUX_STD_A.fits"),
            Product::always("ESPRESSO_ABS_EFF_RAW_A.fits"),
            Product::always("ESPRESSO_ABS_EFF_A.fits"),
        ],
        clean_scratch: true,
    },
    StageSpec {
        stage: Stage::Science,
        title: "science reduction",
        recipe: "espdr_sci_red",
        options: SCIENCE_OPTIONS,
        manifest_file: "SCI_OBJ_part2.txt",
        log_name: "esorex_sci_red.log",
        groups: &[FrameGroup::Science],
        template: &[
            CCD_GEOM,
            INST_CONFIG,
            Source::Static("EXT_TABLE"),
            Source::Static("MASK_LUT"),
            Source::StaticSet(MASK_TABLE_TAG),
            Source::Static("STD_TABLE"),
            MASTER_BIAS_RES,
            HOT_PIXEL_MASK,
            BAD_PIXEL_MASK,
            ORDER_TABLE_A,
            ORDER_TABLE_B,
            ORDER_PROFILE_A,
            ORDER_PROFILE_B,
            FSPECTRUM_A,
            FSPECTRUM_B,
            BLAZE_A,
            BLAZE_B,
            product("ESPRESSO_S2D_BLAZE_THAR_FP_A.fits", "S2D_BLAZE_THAR_FP_A"),
            product("ESPRESSO_S2D_BLAZE_THAR_FP_B.fits", "S2D_BLAZE_THAR_FP_B"),
            WAVE_MATRIX_THAR_FP_A,
            WAVE_MATRIX_FP_THAR_B,
            product("ESPRESSO_DLL_MATRIX_B.fits", "DLL_MATRIX_FP_THAR_B"),
            product("ESPRESSO_DLL_MATRIX_A.fits", "DLL_MATRIX_THAR_FP_A"),
            Source::Static("FLUX_TEMPLATE"),
            product("ESPRESSO_CONTAM_FP_B.fits", "CONTAM_FP"),
            product("ESPRESSO_REL_EFF_B.fits", "REL_EFF_B"),
            product("ESPRESSO_ABS_EFF_A.fits", "ABS_EFF_A"),
        ],
        products: &[
            Product::always("ESPRESSO_CCF_A.fits"),
            Product::always("ESPRESSO_CCF_RESIDUALS_A.fits"),
            Product::always("ESPRESSO_S1D_A.fits"),
            Product::always("ESPRESSO_S1D_B.fits"),
            Product::always("ESPRESSO_S1D_FLUXCAL_A.fits"),
            Product::always("ESPRESSO_S2D_A.fits"),
            Product::always("ESPRESSO_S2D_B.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_A.fits"),
            Product::always("ESPRESSO_S2D_BLAZE_B.fits"),
            Product::sky_only("ESPRESSO_CCF_B.fits"),
            Product::sky_only("ESPRESSO_CCF_SKYSUB_A.fits"),
            Product::sky_only("ESPRESSO_S1D_SKYSUB_A.fits"),
            Product::sky_only("ESPRESSO_S1D_SKYSUB_FLUXCAL_A.fits"),
            Product::sky_only("ESPRESSO_S2D_SKYSUB_A.fits"),
        ],
        clean_scratch: true,
    },
];
