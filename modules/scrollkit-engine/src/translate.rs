//! Normalizes heterogeneous remote paginated responses into the uniform
//! `TranslatedPage` shape. Pure functions; the monotonic has-next-page
//! merge happens in the controller, never here.

use serde_json::{json, Value};

use scrollkit_core::{EntityType, FeedKind, RawPage, ScrollError, TranslatedPage};

pub fn translate(entity_type: EntityType, page: &RawPage) -> Result<TranslatedPage, ScrollError> {
    match entity_type {
        EntityType::Comments => Ok(translate_comments(&page.payload)),
        EntityType::Posts(kind) => Ok(translate_posts(kind, &page.payload)),
        EntityType::Followers => translate_users(&page.payload, "user", "edge_followed_by"),
        EntityType::Following => translate_users(&page.payload, "user", "edge_follow"),
        EntityType::Likers => translate_users(&page.payload, "shortcode_media", "edge_liked_by"),
    }
}

fn translate_comments(payload: &Value) -> TranslatedPage {
    let Some(timeline) = payload.pointer("/shortcode_media/edge_media_to_parent_comment") else {
        // Collection gone: the post no longer exposes comments.
        return TranslatedPage::terminal();
    };

    // Remote API returns newest-first; output wants chronological order.
    let mut items = edges(timeline);
    items.reverse();

    TranslatedPage {
        items,
        has_next_page: page_info_has_next(timeline),
        total_count: timeline.get("count").and_then(Value::as_u64),
    }
}

fn translate_posts(kind: FeedKind, payload: &Value) -> TranslatedPage {
    let pointer = match kind {
        FeedKind::Profile => "/user/edge_owner_to_timeline_media",
        FeedKind::Hashtag => "/hashtag/edge_hashtag_to_media",
        FeedKind::Location => "/location/edge_location_to_media",
    };

    match payload.pointer(pointer) {
        Some(timeline) => {
            let items = edges(timeline);
            // The count field is unreliable or absent for feeds; fall
            // back to the edge length rather than None.
            let total = timeline
                .get("count")
                .and_then(Value::as_u64)
                .unwrap_or(items.len() as u64);
            TranslatedPage {
                has_next_page: page_info_has_next(timeline),
                total_count: Some(total),
                items,
            }
        }
        None => TranslatedPage {
            items: Vec::new(),
            has_next_page: false,
            total_count: Some(0),
        },
    }
}

/// Finite user lists (followers/following/likers). Unlike feeds, an
/// absent top-level object here means the response shape changed, not
/// "no more data" — surfaced as MalformedResponse.
fn translate_users(
    payload: &Value,
    root: &str,
    edge_field: &str,
) -> Result<TranslatedPage, ScrollError> {
    let container = payload
        .get(root)
        .ok_or_else(|| ScrollError::MalformedResponse(format!("response has no `{root}` object")))?;
    let collection = container.get(edge_field).ok_or_else(|| {
        ScrollError::MalformedResponse(format!("`{root}` has no `{edge_field}` collection"))
    })?;

    let items = edges(collection).iter().map(project_user_node).collect();

    let has_next_page = collection
        .pointer("/page_info/end_cursor")
        .and_then(Value::as_str)
        .map(|cursor| !cursor.is_empty())
        .unwrap_or(false);

    Ok(TranslatedPage {
        items,
        has_next_page,
        total_count: collection.get("count").and_then(Value::as_u64),
    })
}

/// Minimal user projection shared by all finite-list types.
fn project_user_node(edge: &Value) -> Value {
    let node = edge.get("node").unwrap_or(edge);
    json!({
        "id": node.get("id").cloned().unwrap_or(Value::Null),
        "displayName": node.get("full_name").cloned().unwrap_or(Value::Null),
        "username": node.get("username").cloned().unwrap_or(Value::Null),
        "profilePicUrl": node.get("profile_pic_url").cloned().unwrap_or(Value::Null),
        "isPrivate": node.get("is_private").cloned().unwrap_or(Value::Null),
        "isVerified": node.get("is_verified").cloned().unwrap_or(Value::Null),
    })
}

fn edges(collection: &Value) -> Vec<Value> {
    collection
        .get("edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn page_info_has_next(collection: &Value) -> bool {
    collection
        .pointer("/page_info/has_next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_payload() -> Value {
        json!({
            "shortcode_media": {
                "edge_media_to_parent_comment": {
                    "count": 42,
                    "page_info": { "has_next_page": true, "end_cursor": "abc" },
                    "edges": [
                        { "node": { "id": "c3", "text": "newest", "created_at": 300 } },
                        { "node": { "id": "c2", "text": "middle", "created_at": 200 } },
                        { "node": { "id": "c1", "text": "oldest", "created_at": 100 } },
                    ],
                }
            }
        })
    }

    #[test]
    fn comments_are_reversed_into_chronological_order() {
        let page = RawPage::new("https://example.com/p/x/", comment_payload());
        let translated = translate(EntityType::Comments, &page).unwrap();

        let ids: Vec<&str> = translated
            .items
            .iter()
            .map(|item| item.pointer("/node/id").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert!(translated.has_next_page);
        assert_eq!(translated.total_count, Some(42));
    }

    #[test]
    fn absent_comment_collection_is_an_empty_terminal_page() {
        let page = RawPage::new("https://example.com/p/x/", json!({ "shortcode_media": {} }));
        let translated = translate(EntityType::Comments, &page).unwrap();

        assert!(translated.items.is_empty());
        assert!(!translated.has_next_page);
        assert_eq!(translated.total_count, None);
    }

    #[test]
    fn post_feed_dispatches_on_kind() {
        let payload = json!({
            "hashtag": {
                "edge_hashtag_to_media": {
                    "count": 7,
                    "page_info": { "has_next_page": false },
                    "edges": [ { "node": { "id": "p1" } } ],
                }
            }
        });
        let page = RawPage::new("https://example.com/explore/tags/x/", payload);
        let translated = translate(EntityType::Posts(FeedKind::Hashtag), &page).unwrap();

        assert_eq!(translated.items.len(), 1);
        assert!(!translated.has_next_page);
        assert_eq!(translated.total_count, Some(7));
    }

    #[test]
    fn post_feed_count_falls_back_to_edge_length() {
        let payload = json!({
            "user": {
                "edge_owner_to_timeline_media": {
                    "page_info": { "has_next_page": true },
                    "edges": [ { "node": { "id": "p1" } }, { "node": { "id": "p2" } } ],
                }
            }
        });
        let page = RawPage::new("https://example.com/someone/", payload);
        let translated = translate(EntityType::Posts(FeedKind::Profile), &page).unwrap();

        assert_eq!(translated.total_count, Some(2));
    }

    #[test]
    fn absent_post_collection_counts_zero_not_none() {
        let page = RawPage::new("https://example.com/someone/", json!({ "user": {} }));
        let translated = translate(EntityType::Posts(FeedKind::Profile), &page).unwrap();

        assert!(translated.items.is_empty());
        assert!(!translated.has_next_page);
        assert_eq!(translated.total_count, Some(0));
    }

    #[test]
    fn user_list_projects_minimal_user_shape() {
        let payload = json!({
            "user": {
                "edge_followed_by": {
                    "count": 1,
                    "page_info": { "end_cursor": "next" },
                    "edges": [
                        { "node": {
                            "id": "u1",
                            "full_name": "Some One",
                            "username": "someone",
                            "profile_pic_url": "https://example.com/pic.jpg",
                            "is_private": false,
                            "is_verified": true,
                        } }
                    ],
                }
            }
        });
        let page = RawPage::new("https://example.com/graphql/query/", payload);
        let translated = translate(EntityType::Followers, &page).unwrap();

        assert!(translated.has_next_page);
        let user = &translated.items[0];
        assert_eq!(user["id"], "u1");
        assert_eq!(user["displayName"], "Some One");
        assert_eq!(user["username"], "someone");
        assert_eq!(user["isVerified"], true);
    }

    #[test]
    fn user_list_without_end_cursor_has_no_next_page() {
        let payload = json!({
            "shortcode_media": {
                "edge_liked_by": {
                    "page_info": { "end_cursor": "" },
                    "edges": [],
                }
            }
        });
        let page = RawPage::new("https://example.com/graphql/query/", payload);
        let translated = translate(EntityType::Likers, &page).unwrap();
        assert!(!translated.has_next_page);
    }

    #[test]
    fn user_list_with_missing_root_is_malformed() {
        let page = RawPage::new("https://example.com/graphql/query/", json!({}));
        let err = translate(EntityType::Following, &page).unwrap_err();
        assert!(matches!(err, ScrollError::MalformedResponse(_)));
    }
}
