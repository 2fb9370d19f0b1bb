//! The site-wide settings singleton.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::store::{Document, DocumentPath};

/// Where the singleton lives in the content store.
pub const SITE_INFO_COLLECTION: &str = "site_info";
pub const SITE_INFO_ID: &str = "main";

pub fn site_info_path() -> DocumentPath {
    DocumentPath::new(SITE_INFO_COLLECTION, SITE_INFO_ID)
}

/// A labelled link in the footer's "important links" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportantLink {
    pub id: String,
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Facebook,
    Twitter,
    Youtube,
    Instagram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub id: String,
    pub platform: SocialPlatform,
    pub url: String,
}

/// All display strings of the site. Fields missing from a stored record
/// fall back to the default value's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteInfo {
    pub college_name: String,
    pub slogan: String,
    pub hero_image_url: String,
    pub location: String,
    pub phone: String,
    pub email: String,
    pub established: String,
    pub eiin: String,
    pub code: String,
    pub founder: String,
    pub principal_name: String,
    pub principal_designation: String,
    pub principal_message: String,
    pub principal_image_url: String,
    pub about_us_preview: String,
    pub about_us_full: String,
    pub about_us_image_url: String,
    pub mission: String,
    pub vision: String,
    pub office_hours_days: String,
    pub office_hours_time: String,
    pub important_links: Vec<ImportantLink>,
    pub social_links: Vec<SocialLink>,
}

impl SiteInfo {
    pub fn from_document(document: Document) -> Result<Self, AppError> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            document.fields,
        ))?)
    }

    pub fn to_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(AppError::Internal(
                "SiteInfo did not serialize to an object".to_string(),
            )),
        }
    }

    /// Reject records the site cannot render.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.college_name.trim().is_empty() {
            return Err(AppError::Validation(
                "collegeName must not be empty".to_string(),
            ));
        }
        let mut ids = std::collections::HashSet::new();
        for id in self
            .important_links
            .iter()
            .map(|l| &l.id)
            .chain(self.social_links.iter().map(|l| &l.id))
        {
            if id.trim().is_empty() || !ids.insert(id) {
                return Err(AppError::Validation(format!(
                    "link ids must be unique and non-empty, got '{}'",
                    id
                )));
            }
        }
        Ok(())
    }
}

impl Default for SiteInfo {
    fn default() -> Self {
        let link = |id: &str, label: &str, url: &str| ImportantLink {
            id: id.to_string(),
            label: label.to_string(),
            url: url.to_string(),
        };
        let social = |id: &str, platform| SocialLink {
            id: id.to_string(),
            platform,
            url: "#".to_string(),
        };

        Self {
            college_name: "শহীদ ফজলুল বারী কারিগরি ও বাণিজ্যিক মহাবিদ্যালয়".to_string(),
            slogan: "শিক্ষাই জাতির মেরুদণ্ড".to_string(),
            hero_image_url: "https://picsum.photos/seed/college/1600/900".to_string(),
            location: "দাড়িদহ, শিবগঞ্জ, বগুড়া".to_string(),
            phone: "+8801234567890 (অফিস)".to_string(),
            email: "info@sfbtc.edu.bd".to_string(),
            established: "২০০৩ ইং".to_string(),
            eiin: "১৩২২২০".to_string(),
            code: "২০০৩০".to_string(),
            founder: "মোঃ মাহবুব আলম (মানিক)".to_string(),
            principal_name: "মোঃ মাহবুব আলম (মানিক)".to_string(),
            principal_designation: "প্রতিষ্ঠাতা ও অধ্যক্ষ".to_string(),
            principal_message: "আমাদের লক্ষ্য হলো প্রত্যেক শিক্ষার্থীকে নৈতিক ও মানবিক মূল্যবোধ সম্পন্ন এবং কর্মমুখী শিক্ষায় শিক্ষিত করে দেশের সুনাগরিক হিসেবে গড়ে তোলা।".to_string(),
            principal_image_url: "https://picsum.photos/seed/1/200/200".to_string(),
            about_us_preview: "২০০৩ সালে প্রতিষ্ঠিত এই মহাবিদ্যালয় বগুড়া জেলার একটি অন্যতম কারিগরি ও বাণিজ্যিক শিক্ষা প্রতিষ্ঠান।".to_string(),
            about_us_full: "দাড়িদহ, শিবগঞ্জ, বগুড়ায় অবস্থিত এই কলেজটি ২০০৩ সাল থেকে শিক্ষার্থীদের কর্মমুখী ও নৈতিক শিক্ষায় শিক্ষিত করে আসছে।".to_string(),
            about_us_image_url: "https://picsum.photos/seed/about/800/600".to_string(),
            mission: "শিক্ষার্থীদের যুগোপযোগী কারিগরি ও বাণিজ্যিক জ্ঞান প্রদান করে দক্ষ মানবসম্পদ হিসেবে গড়ে তোলা।".to_string(),
            vision: "দেশের অন্যতম সেরা কারিগরি শিক্ষা প্রতিষ্ঠান হিসেবে পরিচিতি লাভ করা।".to_string(),
            office_hours_days: "শনিবার - বৃহস্পতিবার".to_string(),
            office_hours_time: "সকাল ৯:০০ - বিকাল ৪:০০".to_string(),
            important_links: vec![
                link("admission", "ভর্তি তথ্য", "#"),
                link("notices", "নোটিশ বোর্ড", "#"),
                link("results", "ফলাফল", "#"),
                link("bteb", "কারিগরি শিক্ষা বোর্ড", "https://www.bteb.gov.bd/"),
            ],
            social_links: vec![
                social("facebook", SocialPlatform::Facebook),
                social("twitter", SocialPlatform::Twitter),
                social("youtube", SocialPlatform::Youtube),
                social("instagram", SocialPlatform::Instagram),
            ],
        }
    }
}
