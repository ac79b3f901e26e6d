//! Frame classification and group validation.
use crate::catalog::{
    classification_rules, referenced_static_tags, Cardinality, FrameGroup, GroupRule,
    MASK_TABLE_TAG, REQUIRED_STATIC_TAGS,
};
use crate::config::{Binning, FiberBMode};
use crate::frames::{InputFrame, StaticCalibrations};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("no {dpr_type} frames at {binning} binning (group {group})")]
    MissingGroup {
        group: FrameGroup,
        dpr_type: &'static str,
        binning: Binning,
    },
    #[error("group {group} needs exactly one {dpr_type} frame, found {}: {}", files.len(), list_files(files))]
    TooManyFrames {
        group: FrameGroup,
        dpr_type: &'static str,
        files: Vec<PathBuf>,
    },
    #[error("no static calibration file with category {0}")]
    MissingStatic(&'static str),
}

fn list_files(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Members of one group after cardinality rules were applied.
#[derive(Debug, Clone)]
pub struct ClassifiedGroup {
    pub rule: &'static GroupRule,
    pub frames: Vec<PathBuf>,
}

/// Every group of the classification table, in table order.
#[derive(Debug, Clone)]
pub struct ClassifiedFrames {
    groups: Vec<ClassifiedGroup>,
}

impl ClassifiedFrames {
    pub fn group(&self, group: FrameGroup) -> Option<&ClassifiedGroup> {
        self.groups.iter().find(|candidate| candidate.rule.group == group)
    }
}

/// Bucket frames at `binning` into groups and validate each group.
///
/// Frames keep their input order inside a group. Groups are checked in table
/// order, so the first problem reported is the earliest table row.
pub fn classify_frames(
    frames: &[InputFrame],
    binning: Binning,
    fiber_b: FiberBMode,
) -> Result<ClassifiedFrames, ClassifyError> {
    let mut groups: Vec<ClassifiedGroup> = classification_rules(fiber_b)
        .into_iter()
        .map(|rule| ClassifiedGroup {
            rule,
            frames: Vec::new(),
        })
        .collect();

    let mut off_binning = 0usize;
    for frame in frames {
        if !binning.matches(frame.binx, frame.biny) {
            off_binning += 1;
            continue;
        }
        match groups
            .iter_mut()
            .find(|group| group.rule.dpr_type == frame.dpr_type)
        {
            Some(group) => group.frames.push(frame.path.clone()),
            None => tracing::debug!(
                file = %frame.path.display(),
                dpr_type = %frame.dpr_type,
                "frame type not used by the cascade"
            ),
        }
    }
    if off_binning > 0 {
        tracing::info!(skipped = off_binning, %binning, "ignored frames at other binnings");
    }

    for group in &mut groups {
        let rule = group.rule;
        if group.frames.is_empty() {
            return Err(ClassifyError::MissingGroup {
                group: rule.group,
                dpr_type: rule.dpr_type,
                binning,
            });
        }
        match rule.cardinality {
            Cardinality::All => {}
            Cardinality::ExactlyOne if group.frames.len() > 1 => {
                return Err(ClassifyError::TooManyFrames {
                    group: rule.group,
                    dpr_type: rule.dpr_type,
                    files: group.frames.clone(),
                });
            }
            Cardinality::ExactlyOne => {}
            Cardinality::FirstOnly if group.frames.len() > 1 => {
                tracing::warn!(
                    group = %rule.group,
                    found = group.frames.len(),
                    using = %first_name(&group.frames),
                    "more than one frame; only the first is used"
                );
                group.frames.truncate(1);
            }
            Cardinality::FirstOnly => {}
        }
        tracing::info!(group = %rule.group, frames = group.frames.len(), "classified");
    }
    Ok(ClassifiedFrames { groups })
}

fn first_name(frames: &[PathBuf]) -> String {
    frames
        .first()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Confirm every static category the stage templates look up is present.
///
/// The required categories are checked first so their absence is what gets
/// reported. An empty mask table set only warns: the science SOF simply lists
/// no mask tables.
pub fn check_static_calibrations(statics: &StaticCalibrations) -> Result<(), ClassifyError> {
    for tag in REQUIRED_STATIC_TAGS {
        if statics.get(tag).is_none() {
            return Err(ClassifyError::MissingStatic(tag));
        }
    }
    for tag in referenced_static_tags() {
        if tag == MASK_TABLE_TAG {
            if statics.set_members(tag).is_empty() {
                tracing::warn!(tag, "no mask tables found");
            }
            continue;
        }
        if statics.get(tag).is_none() {
            return Err(ClassifyError::MissingStatic(tag));
        }
    }
    Ok(())
}
