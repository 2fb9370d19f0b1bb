//! Staff directory entries.

use serde::{Deserialize, Serialize};

use super::{check_required, Collection, Entity, EntityPatch};
use crate::errors::AppError;

/// A teacher shown in the staff directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub designation: String,
    #[serde(default)]
    pub image_url: String,
    /// Free-form biography used by older records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub educational_qualification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_qualities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<String>,
}

/// Partial teacher as submitted by the admin form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub educational_qualification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_qualities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<String>,
}

impl EntityPatch for TeacherPatch {
    fn validate(&self, creating: bool) -> Result<(), AppError> {
        check_required("name", self.name.as_deref(), creating)?;
        check_required("designation", self.designation.as_deref(), creating)
    }
}

impl Entity for Teacher {
    type Patch = TeacherPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn media_url(&self) -> Option<&str> {
        Some(self.image_url.as_str()).filter(|url| !url.is_empty())
    }

    fn seed(_collection: Collection) -> Vec<Self> {
        [
            ("মোঃ মাহবুব আলম (মানিক)", "প্রতিষ্ঠাতা ও অধ্যক্ষ"),
            ("আব্দুল করিম", "সহকারী অধ্যাপক (বাণিজ্য)"),
            ("ফাতেমা বেগম", "ইন্সট্রাক্টর (কম্পিউটার)"),
            ("রহমান আলী", "ইন্সট্রাক্টর (ইলেকট্রিক্যাল)"),
            ("শামীমা আক্তার", "প্রভাষক (হিসাববিজ্ঞান)"),
            ("নজরুল ইসলাম", "প্রভাষক (ব্যবস্থাপনা)"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (name, designation))| Teacher {
            id: (i + 1).to_string(),
            name: name.to_string(),
            designation: designation.to_string(),
            image_url: format!("https://picsum.photos/seed/{}/400/400", i + 1),
            details: None,
            educational_qualification: None,
            additional_qualities: None,
            roll: None,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_teacher_requires_name_and_designation() {
        let patch = TeacherPatch {
            name: Some("New Name".to_string()),
            ..Default::default()
        };
        assert!(patch.validate(true).is_err());
        assert!(patch.validate(false).is_ok());
    }

    #[test]
    fn test_empty_image_url_owns_no_media() {
        let mut teacher = Teacher::seed(Collection::Teachers).remove(0);
        assert!(teacher.media_url().is_some());
        teacher.image_url.clear();
        assert!(teacher.media_url().is_none());
    }
}
