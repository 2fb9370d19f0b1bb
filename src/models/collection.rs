//! The named content collections kept in the store.

use serde::Serialize;

/// Every collection the site reads and the admin panel edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Notices,
    Results,
    Routines,
    DigitalContent,
    Teachers,
    GalleryItems,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Notices,
        Collection::Results,
        Collection::Routines,
        Collection::DigitalContent,
        Collection::Teachers,
        Collection::GalleryItems,
    ];

    /// Collection name in the content store.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Notices => "notices",
            Collection::Results => "results",
            Collection::Routines => "routines",
            Collection::DigitalContent => "digital_content",
            Collection::Teachers => "teachers",
            Collection::GalleryItems => "galleryItems",
        }
    }

    /// Path segment used by the HTTP surface.
    pub fn slug(&self) -> &'static str {
        match self {
            Collection::Notices => "notices",
            Collection::Results => "results",
            Collection::Routines => "routines",
            Collection::DigitalContent => "digital-content",
            Collection::Teachers => "teachers",
            Collection::GalleryItems => "gallery",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }

    /// Field the collection is listed by (descending), if any.
    pub fn default_order(&self) -> Option<&'static str> {
        if self.is_notice_like() {
            Some("date")
        } else {
            None
        }
    }

    /// Notices, results, routines and digital content share one record shape.
    pub fn is_notice_like(&self) -> bool {
        matches!(
            self,
            Collection::Notices
                | Collection::Results
                | Collection::Routines
                | Collection::DigitalContent
        )
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_slugs_resolve_back() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
            assert_eq!(Collection::from_slug(collection.slug()), Some(collection));
        }
    }

    #[test]
    fn test_only_notice_like_collections_are_ordered() {
        assert_eq!(Collection::Results.default_order(), Some("date"));
        assert_eq!(Collection::Teachers.default_order(), None);
        assert_eq!(Collection::GalleryItems.default_order(), None);
    }
}
