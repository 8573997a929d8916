use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cake/plate decoration tip. Unlike posts, tips carry a free-form
/// category string and a short tip text next to the description.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tip {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tip: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Tip payload for create and update calls, JSON on the wire.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TipDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl TipDraft {
    /// Materialize with an id and timestamp, the way the offline variant
    /// minted tips before saving them.
    pub fn into_tip(self, id: String, created_at: DateTime<Utc>) -> Tip {
        Tip {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            difficulty: self.difficulty,
            media: self.media,
            author: self.author,
            tip: self.tip,
            media_type: self.media_type,
            created_at: Some(created_at),
        }
    }

    /// Mock-variant update: replace content, keep identity and timestamp.
    pub fn apply(self, existing: &mut Tip) {
        let id = existing.id.clone();
        let created_at = existing.created_at;
        *existing = Tip {
            created_at,
            ..self.into_tip(id, Utc::now())
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_materializes_with_identity() {
        let draft = TipDraft {
            title: "Mirror glaze".into(),
            tip: Some("Pour at 32C".into()),
            ..Default::default()
        };
        let tip = draft.into_tip("1700000000000".into(), Utc::now());
        assert_eq!(tip.id, "1700000000000");
        assert_eq!(tip.tip.as_deref(), Some("Pour at 32C"));
    }

    #[test]
    fn update_keeps_id_and_timestamp() {
        let created = Utc::now();
        let mut tip = TipDraft {
            title: "Old".into(),
            ..Default::default()
        }
        .into_tip("42".into(), created);

        TipDraft {
            title: "New".into(),
            difficulty: Some("easy".into()),
            ..Default::default()
        }
        .apply(&mut tip);

        assert_eq!(tip.id, "42");
        assert_eq!(tip.title, "New");
        assert_eq!(tip.created_at, Some(created));
    }
}
