//! Per-side views over a file's timeline.

use thiserror::Error;
use tracing::debug;

use crate::constant::{INITIAL_LEFT_INDEX, INITIAL_RIGHT_INDEX};
use crate::version::{Side, VersionDescriptor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("index {index} is outside a timeline of {len} versions")]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

/// One side's copy of the timeline and its active index
#[derive(Debug, Clone)]
pub struct VersionListModel {
    versions: Vec<VersionDescriptor>,
    active: usize,
}

impl VersionListModel {
    /// `active` must lie inside `versions`
    pub fn new(versions: Vec<VersionDescriptor>, active: usize) -> Result<Self, OutOfRange> {
        if active >= versions.len() {
            return Err(OutOfRange {
                index: active,
                len: versions.len(),
            });
        }
        Ok(Self { versions, active })
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &VersionDescriptor {
        &self.versions[self.active]
    }

    pub fn versions(&self) -> &[VersionDescriptor] {
        &self.versions
    }

    /// Make `index` active. Fails without touching state when out of range.
    pub fn select(&mut self, index: usize) -> Result<&VersionDescriptor, OutOfRange> {
        if index >= self.versions.len() {
            return Err(OutOfRange {
                index,
                len: self.versions.len(),
            });
        }
        self.active = index;
        Ok(&self.versions[index])
    }

    /// Move the active index by `delta`; `None` at the timeline boundaries
    pub fn move_by(&mut self, delta: isize) -> Option<&VersionDescriptor> {
        let target = self
            .active
            .checked_add_signed(delta)
            .filter(|&index| index < self.versions.len());
        match target {
            Some(index) => self.select(index).ok(),
            None => {
                debug!(active = self.active, delta, "move past timeline boundary ignored");
                None
            }
        }
    }

    /// Extend with older versions; the active index stays put
    pub fn append(&mut self, descriptors: &[VersionDescriptor]) {
        self.versions.extend_from_slice(descriptors);
    }
}

/// The left and right views of one timeline.
///
/// Both views always hold the same descriptors in the same order; only the
/// active indices differ.
#[derive(Debug, Clone)]
pub struct TimelinePair {
    left: VersionListModel,
    right: VersionListModel,
}

impl TimelinePair {
    /// Right starts on the newest entry, left on the one before it
    pub fn new(versions: Vec<VersionDescriptor>) -> Result<Self, OutOfRange> {
        Ok(Self {
            left: VersionListModel::new(versions.clone(), INITIAL_LEFT_INDEX)?,
            right: VersionListModel::new(versions, INITIAL_RIGHT_INDEX)?,
        })
    }

    pub fn side(&self, side: Side) -> &VersionListModel {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut VersionListModel {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Append the same descriptors to both sides
    pub fn append(&mut self, descriptors: &[VersionDescriptor]) {
        self.left.append(descriptors);
        self.right.append(descriptors);
        debug_assert_eq!(self.left.len(), self.right.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionId;
    use chrono::Utc;

    fn versions(count: u64) -> Vec<VersionDescriptor> {
        (0..count)
            .map(|i| VersionDescriptor {
                id: VersionId::Sync(i),
                timestamp: Utc::now(),
                size_bytes: None,
                label: format!("v{i}"),
                is_disk_state: false,
                device: None,
                commit: None,
            })
            .collect()
    }

    #[test]
    fn select_rejects_out_of_range_without_change() {
        let mut model = VersionListModel::new(versions(3), 1).unwrap();
        assert_eq!(model.select(3).unwrap_err(), OutOfRange { index: 3, len: 3 });
        assert_eq!(model.active_index(), 1);
        assert_eq!(model.select(2).unwrap().label, "v2");
        assert_eq!(model.active_index(), 2);
    }

    #[test]
    fn move_by_is_noop_at_boundaries() {
        let mut model = VersionListModel::new(versions(3), 0).unwrap();
        assert!(model.move_by(-1).is_none());
        assert_eq!(model.active_index(), 0);

        model.select(2).unwrap();
        assert!(model.move_by(1).is_none());
        assert_eq!(model.active_index(), 2);

        assert_eq!(model.move_by(-2).unwrap().label, "v0");
    }

    #[test]
    fn append_keeps_active_index() {
        let mut model = VersionListModel::new(versions(2), 1).unwrap();
        model.append(&versions(3));
        assert_eq!(model.len(), 5);
        assert_eq!(model.active_index(), 1);
    }

    #[test]
    fn pair_starts_right_newest_left_previous() {
        let pair = TimelinePair::new(versions(4)).unwrap();
        assert_eq!(pair.side(Side::Right).active_index(), 0);
        assert_eq!(pair.side(Side::Left).active_index(), 1);
    }

    #[test]
    fn pair_needs_two_versions() {
        assert!(TimelinePair::new(versions(1)).is_err());
        assert!(TimelinePair::new(Vec::new()).is_err());
    }

    #[test]
    fn pair_append_keeps_sides_aligned() {
        let mut pair = TimelinePair::new(versions(2)).unwrap();
        pair.side_mut(Side::Left).select(0).unwrap();
        pair.append(&versions(2));
        assert_eq!(pair.side(Side::Left).len(), pair.side(Side::Right).len());
        assert_eq!(pair.len(), 4);
        assert_eq!(pair.side(Side::Left).active_index(), 0);
        assert_eq!(pair.side(Side::Right).active_index(), 0);
    }
}
