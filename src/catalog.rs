//! Versioned lookup tables describing the ESPRESSO calibration cascade.
//!
//! Engine releases rename recipes, tags and product files from time to time;
//! all of those names live here as data so a release bump is a table edit.
use crate::config::FiberBMode;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

mod stages;

pub use stages::{Source, Stage, StageSpec, ENGINE_LOG, PRODUCT_PREFIX};

/// Engine release the tables below were written against.
pub const CATALOG_VERSION: &str = "espdr-2.2.x";

pub const DPR_TYPE_KEY: &str = "HIERARCH ESO DPR TYPE";
pub const EXPTIME_KEY: &str = "EXPTIME";
pub const BINX_KEY: &str = "HIERARCH ESO DET BINX";
pub const BINY_KEY: &str = "HIERARCH ESO DET BINY";
pub const PRO_CATG_KEY: &str = "HIERARCH ESO PRO CATG";

/// File names of raw exposures inside the input directory.
pub const RAW_FRAME_PATTERN: &str = r"^ESPRE.*\.fits$";
/// File names of static calibrations inside the input directory.
pub const STATIC_FILE_PATTERN: &str = r"^M\.ESPRESSO.*\.fits$";

/// Static category that may appear several times.
pub const MASK_TABLE_TAG: &str = "MASK_TABLE";
/// Static categories checked before any stage template is resolved.
pub const REQUIRED_STATIC_TAGS: [&str; 2] = ["CCD_GEOM", "INST_CONFIG"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameGroup {
    Bias,
    Dark,
    Led,
    OrderDefA,
    OrderDefB,
    FlatA,
    FlatB,
    WaveFpFp,
    WaveFpThar,
    WaveTharFp,
    Contam,
    Efficiency,
    FluxStandard,
    Science,
}

impl fmt::Display for FrameGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameGroup::Bias => "BIAS",
            FrameGroup::Dark => "DARK",
            FrameGroup::Led => "LED",
            FrameGroup::OrderDefA => "ORDERDEF_A",
            FrameGroup::OrderDefB => "ORDERDEF_B",
            FrameGroup::FlatA => "FLAT_A",
            FrameGroup::FlatB => "FLAT_B",
            FrameGroup::WaveFpFp => "WAVE_FP_FP",
            FrameGroup::WaveFpThar => "WAVE_FP_THAR",
            FrameGroup::WaveTharFp => "WAVE_THAR_FP",
            FrameGroup::Contam => "CONTAM",
            FrameGroup::Efficiency => "EFF",
            FrameGroup::FluxStandard => "FLUX_STD",
            FrameGroup::Science => "SCIENCE",
        };
        f.write_str(name)
    }
}

/// How many members of a group a stage may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Every member is used.
    All,
    /// More than one member is fatal.
    ExactlyOne,
    /// Extra members are reported and only the first is used.
    FirstOnly,
}

/// One row of the frame classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRule {
    pub group: FrameGroup,
    /// Exact `ESO DPR TYPE` value selecting the group.
    pub dpr_type: &'static str,
    /// Tag written next to each member in the SOF.
    pub tag: &'static str,
    pub cardinality: Cardinality,
}

const fn rule(
    group: FrameGroup,
    dpr_type: &'static str,
    tag: &'static str,
    cardinality: Cardinality,
) -> GroupRule {
    GroupRule {
        group,
        dpr_type,
        tag,
        cardinality,
    }
}

static CALIBRATION_RULES: [GroupRule; 13] = [
    rule(FrameGroup::Bias, "BIAS", "BIAS", Cardinality::All),
    rule(FrameGroup::Dark, "DARK", "DARK", Cardinality::All),
    rule(FrameGroup::Led, "LED", "LED_FF", Cardinality::All),
    rule(FrameGroup::OrderDefA, "ORDERDEF,LAMP,OFF", "ORDERDEF_A", Cardinality::All),
    rule(FrameGroup::OrderDefB, "ORDERDEF,OFF,LAMP", "ORDERDEF_B", Cardinality::All),
    rule(FrameGroup::FlatA, "FLAT,LAMP,OFF", "FLAT_A", Cardinality::All),
    rule(FrameGroup::FlatB, "FLAT,OFF,LAMP", "FLAT_B", Cardinality::All),
    rule(FrameGroup::WaveFpFp, "WAVE,FP,FP", "FP_FP", Cardinality::All),
    rule(FrameGroup::WaveFpThar, "WAVE,FP,THAR", "FP_THAR", Cardinality::All),
    rule(FrameGroup::WaveTharFp, "WAVE,THAR,FP", "THAR_FP", Cardinality::All),
    rule(FrameGroup::Contam, "CONTAM,OFF,FP", "RAW_CONTAM_FP", Cardinality::ExactlyOne),
    rule(FrameGroup::Efficiency, "EFF,SKY,SKY", "EFF_AB", Cardinality::FirstOnly),
    rule(FrameGroup::FluxStandard, "FLUX,STD,SKY", "FLUX", Cardinality::FirstOnly),
];

static SCIENCE_SKY: GroupRule = rule(FrameGroup::Science, "OBJECT,SKY", "OBJ_SKY", Cardinality::All);
static SCIENCE_FP: GroupRule = rule(FrameGroup::Science, "OBJECT,FP", "OBJ_FP", Cardinality::All);

/// Classification table for the given fiber-B mode, in validation order.
pub fn classification_rules(fiber_b: FiberBMode) -> Vec<&'static GroupRule> {
    let science = match fiber_b {
        FiberBMode::Sky => &SCIENCE_SKY,
        FiberBMode::FabryPerot => &SCIENCE_FP,
    };
    CALIBRATION_RULES.iter().chain([science]).collect()
}

/// Every static category some stage template looks up, including the set-valued one.
pub fn referenced_static_tags() -> BTreeSet<&'static str> {
    let mut tags: BTreeSet<&'static str> = REQUIRED_STATIC_TAGS.into_iter().collect();
    for stage in Stage::ORDER {
        for source in stage.spec().template {
            match source {
                Source::Static(tag) | Source::StaticSet(tag) => {
                    tags.insert(*tag);
                }
                Source::Product { .. } => {}
            }
        }
    }
    tags
}
