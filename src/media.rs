//! Image description for note attachments.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use log::{debug, warn};
use mime::Mime;

use crate::dispatch::FallbackDispatcher;
use crate::llm::VisionBackend;
use crate::misskey::DriveFile;
use crate::types::{ContextEntry, Endpoint, EndpointKind};

/// Check if an attachment is an image
#[must_use]
pub fn is_image(file: &DriveFile) -> bool {
    file.content_type
        .parse::<Mime>()
        .is_ok_and(|mime| mime.type_() == mime::IMAGE)
}

/// Describes every image attachment, keyed by attachment id.
///
/// Non-image files are ignored. Only instance thumbnails are sent to the
/// vision endpoints, so images without one are skipped. Images whose
/// description fails on every vision endpoint are left out of the result.
pub async fn describe_images(
    vision: &dyn VisionBackend,
    dispatcher: &FallbackDispatcher,
    endpoints: &[Endpoint],
    attachments: &[DriveFile],
    note_id: &str,
) -> HashMap<String, String> {
    let mut seen = HashSet::new();
    let images: Vec<(&DriveFile, &str)> = attachments
        .iter()
        .filter(|&file| is_image(file) && seen.insert(file.id.as_str()))
        .filter_map(|file| match file.preview_url() {
            Some(thumbnail) => Some((file, thumbnail)),
            None => {
                debug!("[{note_id}] Image {} has no thumbnail, skipping", file.id);
                None
            }
        })
        .collect();

    if images.is_empty() {
        return HashMap::new();
    }
    if endpoints.is_empty() {
        debug!(
            "[{note_id}] No vision endpoints configured, skipping {} images",
            images.len()
        );
        return HashMap::new();
    }

    debug!("[{note_id}] Describing {} images", images.len());
    let requests = images.into_iter().map(|(file, thumbnail)| async move {
        let description = dispatcher
            .dispatch(EndpointKind::Vision, endpoints, note_id, |endpoint| {
                vision.describe_image(endpoint, thumbnail)
            })
            .await;
        match description {
            Ok(description) => Some((file.id.clone(), description)),
            Err(e) => {
                warn!("[{note_id}] Failed to describe image {}: {e}", file.id);
                None
            }
        }
    });

    join_all(requests).await.into_iter().flatten().collect()
}

/// Copies descriptions onto the entries whose notes carried the images.
pub fn attach_descriptions(entries: &mut [ContextEntry], descriptions: &HashMap<String, String>) {
    for entry in entries {
        entry.image_descriptions = entry
            .files
            .iter()
            .filter_map(|file| descriptions.get(&file.id).cloned())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::error::{BotError, Result};
    use crate::types::{MessageRole, Provider};

    /// Fails for any URL containing "broken" and records requested URLs.
    #[derive(Default)]
    struct FakeVision {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VisionBackend for FakeVision {
        async fn describe_image(&self, endpoint: &Endpoint, image_url: &str) -> Result<String> {
            self.requested
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(image_url.to_string());
            if image_url.contains("broken") {
                return Err(BotError::EndpointResponse("bad image".to_string()));
            }
            Ok(format!("{} saw {image_url}", endpoint.model))
        }
    }

    fn file(id: &str, content_type: &str, thumbnail: Option<&str>) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            url: format!("https://files.example/{id}"),
            thumbnail_url: thumbnail.map(str::to_string),
            content_type: content_type.to_string(),
        }
    }

    fn vision_endpoints() -> Vec<Endpoint> {
        ["primary", "backup"]
            .into_iter()
            .map(|model| Endpoint {
                url: Url::parse("https://vision.example/v1/")
                    .unwrap_or_else(|e| panic!("bad test url: {e}")),
                key: None,
                model: model.to_string(),
                provider: Provider::OpenAi,
            })
            .collect()
    }

    #[tokio::test]
    async fn describes_only_images_using_thumbnails() {
        let vision = FakeVision::default();
        let files = vec![
            file("img", "image/png", Some("https://files.example/thumb-img")),
            file("vid", "video/mp4", None),
            file("doc", "application/pdf", None),
        ];

        let descriptions = describe_images(
            &vision,
            &FallbackDispatcher::new(Duration::ZERO),
            &vision_endpoints(),
            &files,
            "n1",
        )
        .await;

        assert_eq!(descriptions.len(), 1);
        assert_eq!(
            descriptions.get("img").map(String::as_str),
            Some("primary saw https://files.example/thumb-img")
        );
        let requested = vision.requested.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(*requested, vec!["https://files.example/thumb-img".to_string()]);
    }

    #[tokio::test]
    async fn failed_image_is_omitted() {
        let vision = FakeVision::default();
        let files = vec![
            file("ok", "image/jpeg", Some("https://files.example/thumb-ok")),
            file("broken", "image/jpeg", Some("https://files.example/thumb-broken")),
        ];

        let descriptions = describe_images(
            &vision,
            &FallbackDispatcher::new(Duration::ZERO),
            &vision_endpoints(),
            &files,
            "n1",
        )
        .await;

        assert_eq!(descriptions.len(), 1);
        assert!(descriptions.contains_key("ok"));
        // Both vision endpoints were tried for the broken image.
        let requested = vision.requested.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(requested.iter().filter(|url| url.contains("broken")).count(), 2);
    }

    #[tokio::test]
    async fn no_vision_endpoints_means_no_descriptions() {
        let vision = FakeVision::default();
        let descriptions = describe_images(
            &vision,
            &FallbackDispatcher::new(Duration::ZERO),
            &[],
            &[file("img", "image/png", Some("https://files.example/thumb-img"))],
            "n1",
        )
        .await;
        assert!(descriptions.is_empty());
    }

    #[tokio::test]
    async fn images_without_thumbnails_are_never_sent_in_full() {
        let vision = FakeVision::default();
        let files = vec![
            file("full", "image/png", None),
            file("small", "image/png", Some("https://files.example/thumb-small")),
        ];

        let descriptions = describe_images(
            &vision,
            &FallbackDispatcher::new(Duration::ZERO),
            &vision_endpoints(),
            &files,
            "n1",
        )
        .await;

        assert!(!descriptions.contains_key("full"));
        assert!(descriptions.contains_key("small"));
        let requested = vision.requested.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(*requested, vec!["https://files.example/thumb-small".to_string()]);
    }

    #[test]
    fn only_image_content_types_count_as_images() {
        assert!(is_image(&file("a", "image/webp", None)));
        assert!(!is_image(&file("c", "video/mp4", None)));
        assert!(!is_image(&file("d", "application/pdf", None)));
        assert!(!is_image(&file("e", "not a mime", None)));
    }

    #[test]
    fn attaches_descriptions_per_entry() {
        let mut entries = vec![ContextEntry {
            note_id: "n1".into(),
            role: MessageRole::User,
            author: "@alice".into(),
            text: "look".into(),
            files: vec![file("a", "image/png", None), file("b", "image/png", None)],
            image_descriptions: Vec::new(),
        }];
        let descriptions = HashMap::from([("b".to_string(), "a dog".to_string())]);
        attach_descriptions(&mut entries, &descriptions);
        assert_eq!(entries[0].image_descriptions, vec!["a dog".to_string()]);
    }
}
