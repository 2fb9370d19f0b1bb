//! Photo gallery items and the category taxonomy the authoring UI offers.

use serde::{Deserialize, Serialize};

use super::{check_required, Collection, Entity, EntityPatch};
use crate::errors::AppError;

/// One photo in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    pub category: String,
    pub image_url: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub year: i32,
}

/// Partial gallery item as submitted by the admin form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl EntityPatch for GalleryItemPatch {
    fn validate(&self, creating: bool) -> Result<(), AppError> {
        // Category is not checked against the taxonomy; the form constrains it.
        check_required("category", self.category.as_deref(), creating)?;
        check_required("imageUrl", self.image_url.as_deref(), creating)?;
        check_required("alt", self.alt.as_deref(), creating)?;
        check_required("title", self.title.as_deref(), creating)?;
        check_required("description", self.description.as_deref(), creating)?;
        match self.year {
            Some(year) if year <= 0 => Err(AppError::Validation(format!(
                "year must be positive, got {}",
                year
            ))),
            None if creating => Err(AppError::Validation("year is required".to_string())),
            _ => Ok(()),
        }
    }
}

impl Entity for GalleryItem {
    type Patch = GalleryItemPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn media_url(&self) -> Option<&str> {
        Some(self.image_url.as_str()).filter(|url| !url.is_empty())
    }

    fn seed(_collection: Collection) -> Vec<Self> {
        [
            ("ক্যাম্পাস", "কলেজ ক্যাম্পাস"),
            ("ক্রীড়া", "বার্ষিক ক্রীড়া"),
            ("সাংস্কৃতিক অনুষ্ঠান", "সাংস্কৃতিক অনুষ্ঠান"),
            ("ক্যাম্পাস", "কলেজের ভবন"),
            ("পুরস্কার বিতরণী", "পুরস্কার বিতরণী"),
            ("নবীন বরণ", "নবীন বরণ"),
            ("ক্যাম্পাস", "লাইব্রেরি"),
            ("ক্রীড়া", "খেলাধুলা"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (category, alt))| GalleryItem {
            id: (i + 1).to_string(),
            category: category.to_string(),
            image_url: format!("https://picsum.photos/seed/g{}/600/400", i + 1),
            alt: alt.to_string(),
            title: alt.to_string(),
            description: alt.to_string(),
            year: 2024,
        })
        .collect()
    }
}

/// A heading in the category picker with its selectable subcategories.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub group: &'static str,
    pub subcategories: &'static [&'static str],
}

pub const GALLERY_CATEGORIES: &[CategoryGroup] = &[
    CategoryGroup {
        group: "প্রাতিষ্ঠানিক",
        subcategories: &["ক্যাম্পাস", "শ্রেণিকক্ষ", "ল্যাব"],
    },
    CategoryGroup {
        group: "অনুষ্ঠান",
        subcategories: &[
            "সাংস্কৃতিক অনুষ্ঠান",
            "নবীন বরণ",
            "বিদায় সংবর্ধনা",
            "জাতীয় দিবস",
        ],
    },
    CategoryGroup {
        group: "সহশিক্ষা কার্যক্রম",
        subcategories: &["ক্রীড়া", "পুরস্কার বিতরণী", "শিক্ষা সফর"],
    },
];
