use std::collections::{BTreeMap, HashMap};

use prep_common::{BoundingBox, ImageId, Point2D};
use serde::{Deserialize, Serialize};

/// One row of `parts/part_locs.txt`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartLocation {
    pub part_id: u32,
    pub location: Point2D,
    pub visible: bool,
}

/// Part annotations grouped per image, together with the bird bounding boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CubParts {
    names: BTreeMap<u32, String>,
    locations: HashMap<ImageId, Vec<PartLocation>>,
    bboxes: HashMap<ImageId, BoundingBox>,
}

impl CubParts {
    pub fn new(
        names: BTreeMap<u32, String>,
        locations: HashMap<ImageId, Vec<PartLocation>>,
        bboxes: HashMap<ImageId, BoundingBox>,
    ) -> Self {
        Self {
            names,
            locations,
            bboxes,
        }
    }

    /// Number of annotated images
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn part_name(&self, part_id: u32) -> Option<&str> {
        self.names.get(&part_id).map(String::as_str)
    }

    pub fn part_names(&self) -> &BTreeMap<u32, String> {
        &self.names
    }

    /// Every part of one image, in file order
    pub fn for_image(&self, img_id: &ImageId) -> Option<&[PartLocation]> {
        self.locations.get(img_id).map(Vec::as_slice)
    }

    pub fn visible(&self, img_id: &ImageId) -> impl Iterator<Item = &PartLocation> {
        self.for_image(img_id)
            .unwrap_or_default()
            .iter()
            .filter(|part| part.visible)
    }

    pub fn bbox(&self, img_id: &ImageId) -> Option<&BoundingBox> {
        self.bboxes.get(img_id)
    }

    /// Visible parts that fall inside the image's bounding box
    pub fn visible_in_bbox(&self, img_id: &ImageId) -> Vec<&PartLocation> {
        match self.bbox(img_id) {
            Some(bbox) => self
                .visible(img_id)
                .filter(|part| bbox.contains(part.location))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Parts of one image in the coordinate frame of its bounding-box crop.
    pub fn relative_to_bbox(&self, img_id: &ImageId) -> Option<Vec<PartLocation>> {
        let origin = self.bbox(img_id)?.origin();
        let parts = self.for_image(img_id)?;
        Some(
            parts
                .iter()
                .map(|part| PartLocation {
                    location: part.location.translate(-origin.x, -origin.y),
                    ..*part
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CubParts {
        let id = ImageId::from(1u32);
        let names = BTreeMap::from([(1, "back".to_string()), (2, "beak".to_string())]);
        let locations = HashMap::from([(
            id.clone(),
            vec![
                PartLocation {
                    part_id: 1,
                    location: Point2D::new(120.0, 80.0),
                    visible: true,
                },
                PartLocation {
                    part_id: 2,
                    location: Point2D::new(0.0, 0.0),
                    visible: false,
                },
            ],
        )]);
        let bboxes = HashMap::from([(id, BoundingBox::new(100.0, 50.0, 40.0, 60.0))]);
        CubParts::new(names, locations, bboxes)
    }

    #[test]
    fn test_lookup() {
        let parts = sample();
        let id = ImageId::from(1u32);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts.part_name(2), Some("beak"));
        assert_eq!(parts.for_image(&id).unwrap().len(), 2);
        assert_eq!(parts.visible(&id).count(), 1);
        assert_eq!(parts.visible(&ImageId::from(9u32)).count(), 0);
    }

    #[test]
    fn test_visible_in_bbox() {
        let parts = sample();
        let inside = parts.visible_in_bbox(&ImageId::from(1u32));
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].part_id, 1);
        assert!(parts.visible_in_bbox(&ImageId::from(2u32)).is_empty());
    }

    #[test]
    fn test_relative_to_bbox() {
        let parts = sample();
        let relative = parts.relative_to_bbox(&ImageId::from(1u32)).unwrap();
        assert_eq!(relative[0].location, Point2D::new(20.0, 30.0));
        assert_eq!(relative[0].part_id, 1);
        assert!(parts.relative_to_bbox(&ImageId::from(2u32)).is_none());
    }
}
