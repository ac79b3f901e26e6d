//! Test helpers: minimal FITS writers and synthetic input directories.
use crate::catalog::{
    classification_rules, referenced_static_tags, FrameGroup, BINX_KEY, BINY_KEY, DPR_TYPE_KEY,
    EXPTIME_KEY, MASK_TABLE_TAG, PRO_CATG_KEY,
};
use crate::config::{Binning, FiberBMode};
use crate::fits::{BLOCK_LEN, CARD_LEN};
use std::path::{Path, PathBuf};

/// One header card to write.
pub(crate) struct Card {
    keyword: String,
    value: String,
}

impl Card {
    pub(crate) fn text(keyword: &str, value: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: format!("'{:<8}'", value.replace('\'', "''")),
        }
    }

    fn logical(keyword: &str, value: bool) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: if value { "T" } else { "F" }.to_string(),
        }
    }

    pub(crate) fn int(keyword: &str, value: i64) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn float(keyword: &str, value: f64) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: format!("{value:?}"),
        }
    }

    fn render(&self) -> String {
        let card = if self.keyword.starts_with("HIERARCH ") || self.keyword.len() > 8 {
            format!("{} = {}", self.keyword, self.value)
        } else {
            format!("{:<8}= {:>20}", self.keyword, self.value)
        };
        assert!(card.len() <= CARD_LEN, "card too long: {card}");
        format!("{card:<80}")
    }
}

/// Write a FITS file holding only a primary header with the given cards.
pub(crate) fn write_fits(path: &Path, cards: &[Card]) {
    let mut header = String::new();
    header.push_str(&Card::logical("SIMPLE", true).render());
    header.push_str(&Card::int("BITPIX", 8).render());
    header.push_str(&Card::int("NAXIS", 0).render());
    for card in cards {
        header.push_str(&card.render());
    }
    header.push_str(&format!("{:<80}", "END"));
    while header.len() % BLOCK_LEN != 0 {
        header.push(' ');
    }
    std::fs::write(path, header).expect("write fits header");
}

/// Synthetic input directory.
pub(crate) struct Dataset {
    pub(crate) dir: PathBuf,
}

impl Dataset {
    pub(crate) fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).expect("create dataset dir");
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Dataset holding one frame of every group at `binning` and every referenced static.
    pub(crate) fn complete(dir: &Path, binning: Binning, fiber_b: FiberBMode) -> Self {
        let dataset = Self::new(dir);
        for (idx, rule) in classification_rules(fiber_b).iter().enumerate() {
            dataset.raw(
                &format!("ESPRESSO.{idx:02}.{}.fits", rule.group),
                rule.dpr_type,
                i64::from(binning.x),
                i64::from(binning.y),
            );
        }
        for tag in referenced_static_tags() {
            dataset.static_file(&format!("M.ESPRESSO.{tag}.fits"), tag);
        }
        dataset.static_file(&format!("M.ESPRESSO.{MASK_TABLE_TAG}.2.fits"), MASK_TABLE_TAG);
        dataset
    }

    pub(crate) fn raw(&self, name: &str, dpr_type: &str, binx: i64, biny: i64) -> PathBuf {
        let path = self.dir.join(name);
        write_fits(
            &path,
            &[
                Card::text(DPR_TYPE_KEY, dpr_type),
                Card::float(EXPTIME_KEY, 30.0),
                Card::int(BINX_KEY, binx),
                Card::int(BINY_KEY, biny),
            ],
        );
        path
    }

    pub(crate) fn static_file(&self, name: &str, tag: &str) -> PathBuf {
        let path = self.dir.join(name);
        write_fits(&path, &[Card::text(PRO_CATG_KEY, tag)]);
        path
    }

    /// Path of the frame `complete` wrote for `group`.
    pub(crate) fn group_frame(&self, group: FrameGroup) -> PathBuf {
        let idx = classification_rules(FiberBMode::Sky)
            .iter()
            .position(|rule| rule.group == group)
            .expect("known group");
        self.dir.join(format!("ESPRESSO.{idx:02}.{group}.fits"))
    }

    pub(crate) fn remove(&self, path: &Path) {
        std::fs::remove_file(path).expect("remove dataset file");
    }
}
