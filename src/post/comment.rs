use serde::{Deserialize, Serialize};

/// One comment on a post.
///
/// Older server variants ship comments as bare strings, newer ones as
/// `{ text, replies, reactions }`. Both wire shapes resolve into this one
/// struct at deserialization, so nothing downstream ever branches on shape.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "Wire")]
pub struct Comment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
    #[serde(default)]
    pub reactions: u32,
}

impl Comment {
    /// This comment plus everything nested under it.
    pub fn thread_len(&self) -> usize {
        1 + self.replies.iter().map(Comment::thread_len).sum::<usize>()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Text(String),
    Thread {
        text: String,
        #[serde(default)]
        replies: Vec<Comment>,
        #[serde(default)]
        reactions: u32,
    },
}

impl From<Wire> for Comment {
    fn from(wire: Wire) -> Self {
        match wire {
            Wire::Text(text) => Comment {
                text,
                replies: vec![],
                reactions: 0,
            },
            Wire::Thread {
                text,
                replies,
                reactions,
            } => Comment {
                text,
                replies,
                reactions,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_becomes_comment() {
        let comment: Comment = serde_json::from_str("\"Looks delicious!\"").unwrap();
        assert_eq!(comment.text, "Looks delicious!");
        assert!(comment.replies.is_empty());
        assert_eq!(comment.reactions, 0);
    }

    #[test]
    fn threaded_shape_keeps_replies() {
        let comment: Comment = serde_json::from_str(
            r#"{
                "text": "Which flour did you use?",
                "reactions": 2,
                "replies": ["00 flour", {"text": "thanks!"}]
            }"#,
        )
        .unwrap();
        assert_eq!(comment.reactions, 2);
        assert_eq!(comment.replies.len(), 2);
        assert_eq!(comment.replies[0].text, "00 flour");
        assert_eq!(comment.thread_len(), 3);
    }

    #[test]
    fn mixed_list_normalizes() {
        let comments: Vec<Comment> =
            serde_json::from_str(r#"["plain", {"text": "rich", "reactions": 1}]"#).unwrap();
        assert_eq!(comments[0].text, "plain");
        assert_eq!(comments[1].reactions, 1);
    }
}
