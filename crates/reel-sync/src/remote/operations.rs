//! # GraphQL Operations
//!
//! Typed queries and mutations against the remote list service.
//!
//! Each operation struct doubles as its variables object; its `Response`
//! type mirrors the `data` member of the reply.
//!
//! ## Status Mapping
//! ```text
//! ┌──────────────────┬──────────────────┐
//! │ EntryStatus      │ Wire status      │
//! ├──────────────────┼──────────────────┤
//! │ Watching         │ CURRENT          │
//! │ Completed        │ COMPLETED        │
//! │ PlanToWatch      │ PLANNING         │
//! │ OnHold           │ PAUSED           │
//! │ Dropped          │ DROPPED          │
//! │ (REPEATING)      │ → Watching       │
//! └──────────────────┴──────────────────┘
//! ```

use chrono::{DateTime, Utc};
use reel_core::{EntryStatus, MediaFormat, MediaItem, RemoteEntrySnapshot, Score};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A GraphQL document plus the shape of its variables and `data`.
pub trait GraphQlOperation: Serialize + Send + Sync {
    /// Operation name, used for logging.
    const NAME: &'static str;
    const QUERY: &'static str;
    type Response: DeserializeOwned + Send;
}

// =============================================================================
// Wire Status
// =============================================================================

/// List status as spelled by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    Current,
    Planning,
    Completed,
    Dropped,
    Paused,
    Repeating,
}

impl From<EntryStatus> for RemoteStatus {
    fn from(status: EntryStatus) -> Self {
        match status {
            EntryStatus::Watching => RemoteStatus::Current,
            EntryStatus::Completed => RemoteStatus::Completed,
            EntryStatus::PlanToWatch => RemoteStatus::Planning,
            EntryStatus::OnHold => RemoteStatus::Paused,
            EntryStatus::Dropped => RemoteStatus::Dropped,
        }
    }
}

impl From<RemoteStatus> for EntryStatus {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::Current | RemoteStatus::Repeating => EntryStatus::Watching,
            RemoteStatus::Completed => EntryStatus::Completed,
            RemoteStatus::Planning => EntryStatus::PlanToWatch,
            RemoteStatus::Paused => EntryStatus::OnHold,
            RemoteStatus::Dropped => EntryStatus::Dropped,
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCoverImage {
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMedia {
    pub id: i64,
    pub title: WireTitle,
    pub cover_image: Option<WireCoverImage>,
    pub episodes: Option<u32>,
    pub format: Option<MediaFormat>,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
    pub description: Option<String>,
    pub site_url: Option<String>,
    /// Unix seconds.
    pub updated_at: Option<i64>,
}

impl WireMedia {
    pub fn into_media(self) -> MediaItem {
        let WireTitle {
            romaji,
            english,
            native,
        } = self.title;
        let cover = self.cover_image;

        MediaItem {
            id: self.id,
            title_romaji: romaji
                .or_else(|| english.clone())
                .or_else(|| native.clone())
                .unwrap_or_else(|| format!("#{}", self.id)),
            title_english: english,
            title_native: native,
            cover_image_large: cover.as_ref().and_then(|c| c.large.clone()),
            cover_image_medium: cover.and_then(|c| c.medium),
            episodes: self.episodes,
            format: self.format,
            genres: self.genres.unwrap_or_default(),
            synopsis: self.description,
            site_url: self.site_url,
            updated_at: timestamp(self.updated_at),
        }
    }
}

/// One list entry as returned by list queries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireListEntry {
    pub id: i64,
    pub media_id: i64,
    pub status: RemoteStatus,
    pub progress: Option<u32>,
    pub score: Option<f64>,
    /// Unix seconds.
    pub updated_at: Option<i64>,
    pub media: Option<WireMedia>,
}

impl WireListEntry {
    pub fn updated_at(&self) -> DateTime<Utc> {
        timestamp(self.updated_at)
    }

    /// Converts to the reconciliation input.
    ///
    /// The remote reports "unscored" as 0; anything above the scale is clamped.
    pub fn into_snapshot(self) -> RemoteEntrySnapshot {
        let score = self
            .score
            .filter(|s| *s > 0.0)
            .and_then(|s| Score::from_decimal(s.min(10.0)).ok());

        RemoteEntrySnapshot {
            remote_id: self.id,
            media_id: self.media_id,
            status: self.status.into(),
            progress: self.progress.unwrap_or(0),
            score,
            updated_at: timestamp(self.updated_at),
            media: self.media.map(WireMedia::into_media),
        }
    }
}

fn timestamp(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_else(Utc::now)
}

// =============================================================================
// Viewer
// =============================================================================

/// The authenticated user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Viewer {}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerData {
    #[serde(rename = "Viewer")]
    pub viewer: ViewerUser,
}

impl GraphQlOperation for Viewer {
    const NAME: &'static str = "Viewer";
    const QUERY: &'static str = "query { Viewer { id name } }";
    type Response = ViewerData;
}

// =============================================================================
// User List Page
// =============================================================================

/// One page of the user's entries, most recently updated first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListPage {
    pub user_id: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub page_info: PageInfo,
    #[serde(default)]
    pub media_list: Vec<WireListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPageData {
    #[serde(rename = "Page")]
    pub page: ListPage,
}

impl GraphQlOperation for UserListPage {
    const NAME: &'static str = "UserListPage";
    const QUERY: &'static str = concat!(
        "query ($userId: Int, $page: Int, $perPage: Int) {\n",
        "  Page(page: $page, perPage: $perPage) {\n",
        "    pageInfo { hasNextPage }\n",
        "    mediaList(userId: $userId, type: ANIME, sort: UPDATED_TIME_DESC) {\n",
        "      id mediaId status progress score(format: POINT_10_DECIMAL) updatedAt\n",
        "      media { id title { romaji english native } coverImage { large medium }\n",
        "              episodes format genres description(asHtml: false) siteUrl updatedAt }\n",
        "    }\n",
        "  }\n",
        "}"
    );
    type Response = ListPageData;
}

// =============================================================================
// User List Collection
// =============================================================================

/// Every list of the user in one response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListCollection {
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListGroup {
    #[serde(default)]
    pub entries: Vec<WireListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListCollection {
    #[serde(default)]
    pub lists: Vec<ListGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListCollectionData {
    #[serde(rename = "MediaListCollection")]
    pub collection: ListCollection,
}

impl ListCollectionData {
    /// Flattens the per-status groups into one entry list.
    pub fn into_entries(self) -> Vec<WireListEntry> {
        self.collection
            .lists
            .into_iter()
            .flat_map(|group| group.entries)
            .collect()
    }
}

impl GraphQlOperation for UserListCollection {
    const NAME: &'static str = "UserListCollection";
    const QUERY: &'static str = concat!(
        "query ($userId: Int) {\n",
        "  MediaListCollection(userId: $userId, type: ANIME) {\n",
        "    lists { entries {\n",
        "      id mediaId status progress score(format: POINT_10_DECIMAL) updatedAt\n",
        "      media { id title { romaji english native } coverImage { large medium }\n",
        "              episodes format genres description(asHtml: false) siteUrl updatedAt }\n",
        "    } }\n",
        "  }\n",
        "}"
    );
    type Response = ListCollectionData;
}

// =============================================================================
// Find List Entry
// =============================================================================

/// Looks up the user's list entry id for a media item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindListEntry {
    pub user_id: i64,
    pub media_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEntryRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindListEntryData {
    #[serde(rename = "MediaList")]
    pub entry: Option<ListEntryRef>,
}

impl GraphQlOperation for FindListEntry {
    const NAME: &'static str = "FindListEntry";
    const QUERY: &'static str =
        "query ($userId: Int, $mediaId: Int) { MediaList(userId: $userId, mediaId: $mediaId) { id } }";
    type Response = FindListEntryData;
}

// =============================================================================
// Save List Entry
// =============================================================================

/// Creates or updates a list entry. Absent fields are left unchanged remotely.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveListEntry {
    pub media_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RemoteStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    /// Decimal score; 0 clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedListEntry {
    pub id: i64,
    pub status: Option<RemoteStatus>,
    pub progress: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveListEntryData {
    #[serde(rename = "SaveMediaListEntry")]
    pub saved: SavedListEntry,
}

impl GraphQlOperation for SaveListEntry {
    const NAME: &'static str = "SaveListEntry";
    const QUERY: &'static str = concat!(
        "mutation ($mediaId: Int, $status: MediaListStatus, $progress: Int, $score: Float) {\n",
        "  SaveMediaListEntry(mediaId: $mediaId, status: $status, progress: $progress, score: $score) {\n",
        "    id status progress\n",
        "  }\n",
        "}"
    );
    type Response = SaveListEntryData;
}

// =============================================================================
// Delete List Entry
// =============================================================================

/// Removes a list entry by its remote id.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteListEntry {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deleted {
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteListEntryData {
    #[serde(rename = "DeleteMediaListEntry")]
    pub result: Deleted,
}

impl GraphQlOperation for DeleteListEntry {
    const NAME: &'static str = "DeleteListEntry";
    const QUERY: &'static str = "mutation ($id: Int) { DeleteMediaListEntry(id: $id) { deleted } }";
    type Response = DeleteListEntryData;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        for status in EntryStatus::ALL {
            assert_eq!(EntryStatus::from(RemoteStatus::from(status)), status);
        }
        assert_eq!(EntryStatus::from(RemoteStatus::Repeating), EntryStatus::Watching);
        assert_eq!(
            serde_json::to_value(RemoteStatus::from(EntryStatus::PlanToWatch)).unwrap(),
            json!("PLANNING")
        );
    }

    #[test]
    fn test_save_variables_skip_unset_fields() {
        let vars = SaveListEntry {
            media_id: 21,
            progress: Some(12),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&vars).unwrap(),
            json!({ "mediaId": 21, "progress": 12 })
        );
    }

    #[test]
    fn test_list_entry_into_snapshot() {
        let wire: WireListEntry = serde_json::from_value(json!({
            "id": 9001,
            "mediaId": 1,
            "status": "PAUSED",
            "progress": 14,
            "score": 8.5,
            "updatedAt": 1_700_000_000,
            "media": {
                "id": 1,
                "title": { "romaji": "Cowboy Bebop", "english": null, "native": null },
                "coverImage": { "large": "https://img/l.jpg", "medium": null },
                "episodes": 26,
                "format": "TV",
                "genres": ["Action", "Sci-Fi"],
                "description": null,
                "siteUrl": "https://anilist.co/anime/1",
                "updatedAt": null
            }
        }))
        .unwrap();

        let snapshot = wire.into_snapshot();
        assert_eq!(snapshot.remote_id, 9001);
        assert_eq!(snapshot.status, EntryStatus::OnHold);
        assert_eq!(snapshot.progress, 14);
        assert_eq!(snapshot.score.map(|s| s.tenths()), Some(85));
        assert_eq!(snapshot.updated_at.timestamp(), 1_700_000_000);

        let media = snapshot.media.unwrap();
        assert_eq!(media.title_romaji, "Cowboy Bebop");
        assert_eq!(media.format, Some(MediaFormat::Tv));
        assert_eq!(media.cover_image_large.as_deref(), Some("https://img/l.jpg"));
        assert_eq!(media.genres, vec!["Action", "Sci-Fi"]);
    }

    #[test]
    fn test_zero_score_is_unscored() {
        let wire: WireListEntry = serde_json::from_value(json!({
            "id": 1, "mediaId": 2, "status": "CURRENT",
            "progress": null, "score": 0, "updatedAt": null, "media": null
        }))
        .unwrap();
        let snapshot = wire.into_snapshot();
        assert_eq!(snapshot.score, None);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.media.is_none());
    }

    #[test]
    fn test_collection_flattens_groups() {
        let data: ListCollectionData = serde_json::from_value(json!({
            "MediaListCollection": { "lists": [
                { "entries": [
                    { "id": 1, "mediaId": 10, "status": "CURRENT", "progress": 1,
                      "score": null, "updatedAt": 1, "media": null }
                ] },
                { "entries": [
                    { "id": 2, "mediaId": 20, "status": "COMPLETED", "progress": 12,
                      "score": 7, "updatedAt": 2, "media": null },
                    { "id": 3, "mediaId": 30, "status": "DROPPED", "progress": 3,
                      "score": null, "updatedAt": 3, "media": null }
                ] }
            ] }
        }))
        .unwrap();

        let ids: Vec<i64> = data.into_entries().iter().map(|e| e.media_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }
}
