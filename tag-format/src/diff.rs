//! Operation lists describing how a file's tags should change.

use crate::chapter::ChapterInfo;
use crate::meta::{FieldMap, Scalar, Scalars};
use crate::picture::PictureInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarChange {
    pub scalar: Scalar,
    /// New value in string form; `""` clears the scalar.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOp {
    Upsert { key: String, value: String },
    Delete { key: String },
}

impl FieldOp {
    pub fn key(&self) -> &str {
        match self {
            FieldOp::Upsert { key, .. } | FieldOp::Delete { key } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PictureOp {
    Upsert(PictureInfo),
    Delete(PictureInfo),
}

/// Everything that has to be written to bring a file in line with an edited
/// track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagDelta {
    pub scalars: Vec<ScalarChange>,
    pub fields: Vec<FieldOp>,
    pub pictures: Vec<PictureOp>,
    /// Replacement chapter list; `None` leaves chapters alone.
    pub chapters: Option<Vec<ChapterInfo>>,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.fields.is_empty()
            && self.pictures.is_empty()
            && self.chapters.is_none()
    }

    pub fn changes_scalar(&self, scalar: Scalar) -> bool {
        self.scalars.iter().any(|c| c.scalar == scalar)
    }
}

pub fn diff_scalars(initial: &Scalars, current: &Scalars) -> Vec<ScalarChange> {
    Scalar::ALL
        .iter()
        .filter_map(|&scalar| {
            let value = current.get(scalar);
            if initial.get(scalar) == value {
                None
            } else {
                Some(ScalarChange { scalar, value })
            }
        })
        .collect()
}

/// Keys present now with a changed or new value become upserts; keys present
/// at load time and gone now become deletes.
pub fn diff_fields(initial: &FieldMap, current: &FieldMap) -> Vec<FieldOp> {
    let mut ops = Vec::new();
    for (key, value) in current {
        if initial.get(key) != Some(value) {
            ops.push(FieldOp::Upsert {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    for key in initial.keys() {
        if !current.contains_key(key) {
            ops.push(FieldOp::Delete { key: key.clone() });
        }
    }
    ops
}

/// Chapters are written as a whole: any difference replaces the list.
pub fn diff_chapters(initial: &[ChapterInfo], current: &[ChapterInfo]) -> Option<Vec<ChapterInfo>> {
    if initial == current {
        None
    } else {
        Some(current.to_vec())
    }
}

/// Classification of current pictures against the ones present at load time.
///
/// `kept`, `added` and `updated` partition the current list. Each initial
/// picture is matched at most once; `deleted` holds the unmatched ones.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PictureDiff {
    /// Indices into the current list.
    pub kept: Vec<usize>,
    /// Indices into the current list.
    pub added: Vec<usize>,
    /// `(current, initial)` index pairs with matching slot and differing payload.
    pub updated: Vec<(usize, usize)>,
    /// Indices into the initial list.
    pub deleted: Vec<usize>,
}

impl PictureDiff {
    /// Classify with a caller-supplied slot equality.
    pub fn classify_by<F>(initial: &[PictureInfo], current: &[PictureInfo], same_slot: F) -> PictureDiff
    where
        F: Fn(&PictureInfo, &PictureInfo) -> bool,
    {
        let mut diff = PictureDiff::default();
        let mut claimed = vec![false; initial.len()];
        let mut unmatched = Vec::new();

        // Identical payloads claim their initial first, so an edit elsewhere
        // in the slot cannot take it.
        for (i, picture) in current.iter().enumerate() {
            let found = initial.iter().enumerate().position(|(j, old)| {
                !claimed[j] && same_slot(old, picture) && old.hash() == picture.hash()
            });
            match found {
                Some(j) => {
                    claimed[j] = true;
                    diff.kept.push(i);
                }
                None => unmatched.push(i),
            }
        }

        for i in unmatched {
            let picture = &current[i];
            let found = initial
                .iter()
                .enumerate()
                .position(|(j, old)| !claimed[j] && same_slot(old, picture));
            match found {
                Some(j) => {
                    claimed[j] = true;
                    diff.updated.push((i, j));
                }
                None => diff.added.push(i),
            }
        }

        diff.deleted = (0..initial.len()).filter(|&j| !claimed[j]).collect();
        diff
    }

    pub fn classify(initial: &[PictureInfo], current: &[PictureInfo]) -> PictureDiff {
        PictureDiff::classify_by(initial, current, PictureInfo::same_slot)
    }

    /// Turn the classification into operations. An updated picture becomes an
    /// upsert of the new payload plus a delete of the old one.
    pub fn to_ops(&self, initial: &[PictureInfo], current: &[PictureInfo]) -> Vec<PictureOp> {
        let mut ops = Vec::new();
        for &j in &self.deleted {
            ops.push(PictureOp::Delete(initial[j].clone()));
        }
        for &(i, j) in &self.updated {
            ops.push(PictureOp::Upsert(current[i].clone()));
            ops.push(PictureOp::Delete(initial[j].clone()));
        }
        for &i in &self.added {
            ops.push(PictureOp::Upsert(current[i].clone()));
        }
        ops
    }
}

pub fn diff_pictures(initial: &[PictureInfo], current: &[PictureInfo]) -> Vec<PictureOp> {
    PictureDiff::classify(initial, current).to_ops(initial, current)
}
