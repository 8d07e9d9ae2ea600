//! Scene model: ordered items over a base raster

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::domain::{BgTransform, Family, Item, ItemId, Point};
use crate::error::{EditorError, EditorResult};
use crate::filters::FilterConfig;

/// Z-order change for a single item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reorder {
    ToTop,
    ToBottom,
    Up,
    Down,
}

/// Items in paint order plus the raster they annotate
#[derive(Clone, Debug)]
pub struct Scene {
    items: Vec<Item>,
    base: Arc<RgbaImage>,
    transform: BgTransform,
    filters: FilterConfig,
    next_id: u64,
}

impl Scene {
    pub fn new(base: Arc<RgbaImage>) -> Self {
        Self {
            items: Vec::new(),
            base,
            transform: BgTransform::default(),
            filters: FilterConfig::default(),
            next_id: 1,
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Reserve a fresh identifier
    pub fn next_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append `item` on top of the paint order under a fresh identifier
    pub fn add_item(&mut self, mut item: Item) -> ItemId {
        item.id = self.next_id();
        let id = item.id;
        self.items.push(item);
        id
    }

    /// Apply `patch` to the item with `id`; its identity and position are kept
    pub fn update_item(&mut self, id: ItemId, patch: impl FnOnce(&mut Item)) -> EditorResult<()> {
        let item = self.item_mut(id).ok_or(EditorError::UnknownItem(id))?;
        patch(item);
        item.id = id;
        Ok(())
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let index = self.position(id)?;
        Some(self.items.remove(index))
    }

    /// Move an item in the paint order. Returns false when nothing moved.
    pub fn reorder(&mut self, id: ItemId, op: Reorder) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let last = self.items.len() - 1;
        let target = match op {
            Reorder::ToTop => last,
            Reorder::ToBottom => 0,
            Reorder::Up if index < last => index + 1,
            Reorder::Down if index > 0 => index - 1,
            Reorder::Up | Reorder::Down => return false,
        };
        if target == index {
            return false;
        }
        let item = self.items.remove(index);
        self.items.insert(target, item);
        true
    }

    /// Copy of every item belonging to `family`, in paint order
    pub fn family(&self, family: Family) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.family() == family)
            .cloned()
            .collect()
    }

    /// Swap in a new set of items for one family, leaving the other untouched.
    ///
    /// Privacy strokes are composited into the raster and never interleave
    /// with annotations visually, so the restored family is appended after
    /// the other one.
    pub fn replace_family(&mut self, family: Family, items: Vec<Item>) {
        self.items.retain(|item| item.family() != family);
        let restored_max = items.iter().map(|item| item.id.0).max().unwrap_or(0);
        self.next_id = self.next_id.max(restored_max + 1);
        self.items
            .extend(items.into_iter().filter(|item| item.family() == family));
    }

    /// Topmost annotation under `point`
    pub fn hit_test(&self, point: Point) -> Option<ItemId> {
        self.items
            .iter()
            .rev()
            .filter(|item| item.family() == Family::General)
            .find(|item| item.contains(point))
            .map(|item| item.id)
    }

    pub fn base_raster(&self) -> &Arc<RgbaImage> {
        &self.base
    }

    /// Replace the base raster; the canvas follows its size
    pub fn set_base_raster(&mut self, raster: Arc<RgbaImage>) {
        self.base = raster;
        self.transform = BgTransform::default();
    }

    pub fn transform(&self) -> BgTransform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: BgTransform) {
        self.transform = transform;
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: FilterConfig) {
        self.filters = filters;
    }

    /// Canvas size: the base raster after rotation
    pub fn display_size(&self) -> (u32, u32) {
        self.transform
            .oriented_size(self.base.width(), self.base.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShapeColor;
    use crate::domain::{ItemKind, PrivacyEffect};

    fn scene() -> Scene {
        Scene::new(Arc::new(RgbaImage::new(100, 50)))
    }

    fn line(at: Point) -> Item {
        Item::new(
            ItemId(0),
            at,
            ItemKind::FreeLine {
                points: vec![Point::ZERO, Point::new(10.0, 10.0)],
                color: ShapeColor::default(),
                width: 2.0,
            },
        )
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let mut s = scene();
        let a = s.add_item(line(Point::ZERO));
        let b = s.add_item(line(Point::ZERO));
        assert_ne!(a, b);
        assert_eq!(s.items()[1].id, b);
    }

    #[test]
    fn update_preserves_order_and_id() {
        let mut s = scene();
        let a = s.add_item(line(Point::ZERO));
        let b = s.add_item(line(Point::ZERO));
        s.update_item(a, |item| {
            item.x = 42.0;
            item.id = ItemId(999);
        })
        .unwrap();
        assert_eq!(s.items()[0].id, a);
        assert_eq!(s.items()[0].x, 42.0);
        assert_eq!(s.items()[1].id, b);
        assert!(matches!(
            s.update_item(ItemId(77), |_| {}),
            Err(EditorError::UnknownItem(ItemId(77)))
        ));
    }

    #[test]
    fn reorder_edges_are_no_ops() {
        let mut s = scene();
        let a = s.add_item(line(Point::ZERO));
        let b = s.add_item(line(Point::ZERO));
        let c = s.add_item(line(Point::ZERO));
        assert!(!s.reorder(c, Reorder::Up));
        assert!(!s.reorder(a, Reorder::Down));
        assert!(s.reorder(a, Reorder::ToTop));
        let order: Vec<ItemId> = s.items().iter().map(|i| i.id).collect();
        assert_eq!(order, vec![b, c, a]);
        assert!(s.reorder(a, Reorder::Down));
        assert!(s.reorder(b, Reorder::Up));
        let order: Vec<ItemId> = s.items().iter().map(|i| i.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn replace_family_leaves_other_family() {
        let mut s = scene();
        let a = s.add_item(line(Point::ZERO));
        let mut stroke = Item::new(ItemId(0), Point::ZERO, ItemKind::privacy(PrivacyEffect::Blur, 8.0));
        stroke.brush_mut().unwrap().points.push(Point::ZERO);
        s.add_item(stroke);
        s.replace_family(Family::Privacy, Vec::new());
        assert_eq!(s.items().len(), 1);
        assert_eq!(s.items()[0].id, a);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut s = scene();
        let _a = s.add_item(line(Point::new(0.0, 0.0)));
        let b = s.add_item(line(Point::new(2.0, 2.0)));
        assert_eq!(s.hit_test(Point::new(5.0, 5.0)), Some(b));
        assert_eq!(s.hit_test(Point::new(90.0, 40.0)), None);
    }

    #[test]
    fn remove_returns_item() {
        let mut s = scene();
        let a = s.add_item(line(Point::ZERO));
        assert_eq!(s.remove_item(a).map(|i| i.id), Some(a));
        assert!(s.remove_item(a).is_none());
    }
}
