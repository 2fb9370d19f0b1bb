//! Notice-like records: notices, results, class routines and digital content.

use serde::{Deserialize, Serialize};

use super::{check_required, Collection, Entity, EntityPatch};
use crate::errors::AppError;

/// How the site should open a notice's link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Download the linked file.
    File,
    /// Navigate to the link.
    #[default]
    Link,
}

/// A dated entry with a link, shared by four collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub date: String,
    pub link: String,
    #[serde(rename = "type", default)]
    pub kind: NoticeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Partial notice as submitted by the admin form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NoticeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl EntityPatch for NoticePatch {
    fn validate(&self, creating: bool) -> Result<(), AppError> {
        check_required("title", self.title.as_deref(), creating)?;
        check_required("date", self.date.as_deref(), creating)?;
        check_required("link", self.link.as_deref(), creating)
    }
}

impl Entity for Notice {
    type Patch = NoticePatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn seed(collection: Collection) -> Vec<Self> {
        let rows: &[(&str, &str)] = match collection {
            Collection::Results => &[
                ("এইচএসসি (বিএমটি) ২০২৪ পরীক্ষার ফলাফল", "আগস্ট ১৫, ২০২৪"),
                ("একাদশ শ্রেণির বার্ষিক পরীক্ষার ফলাফল", "জানুয়ারি ১০, ২০২৪"),
                ("এইচএসসি (বিএমটি) ২০২৩ পরীক্ষার ফলাফল", "নভেম্বর ২৬, ২০২৩"),
            ],
            Collection::Routines => &[
                ("একাদশ শ্রেণির ক্লাস রুটিন (জুলাই-ডিসেম্বর ২০২৪)", "জুলাই ০১, ২০২৪"),
                ("দ্বাদশ শ্রেণির ক্লাস রুটিন (জুলাই-ডিসেম্বর ২০২৪)", "জুলাই ০১, ২০২৪"),
                ("ব্যবহারিক ক্লাসের সময়সূচী", "জুন ২০, ২০২৪"),
            ],
            Collection::DigitalContent => &[
                ("কম্পিউটার অপারেশন: মাইক্রোসফট ওয়ার্ড পরিচিতি", "জুলাই ১২, ২০২৪"),
                ("হিসাব বিজ্ঞান: জাবেদা ও খতিয়ান", "জুন ২৮, ২০২৪"),
                ("ই-কমার্স: অনলাইন ব্যবসার প্রাথমিক ধারণা", "জুন ০৫, ২০২৪"),
            ],
            Collection::Notices => &[
                ("২০২৪ সালের এইচএসসি (বিএমটি) পরীক্ষার সময়সূচী", "জুলাই ২০, ২০২৪"),
                ("গ্রীষ্মকালীন ছুটি সংক্রান্ত বিজ্ঞপ্তি", "জুন ১৫, ২০২৪"),
                ("উপবৃত্তি সংক্রান্ত জরুরি নোটিশ", "মে ৩০, ২০২৪"),
                ("বার্ষিক ক্রীড়া প্রতিযোগিতা আয়োজন প্রসঙ্গে", "মে ১০, ২০২৪"),
                ("ক্লাস রুটিন (জুলাই-ডিসেম্বর ২০২৪)", "এপ্রিল ২৮, ২০২৪"),
            ],
            Collection::Teachers | Collection::GalleryItems => &[],
        };

        rows.iter()
            .enumerate()
            .map(|(i, (title, date))| Notice {
                id: (i + 1).to_string(),
                title: title.to_string(),
                date: date.to_string(),
                link: "#".to_string(),
                kind: NoticeKind::Link,
                file_name: None,
            })
            .collect()
    }
}
