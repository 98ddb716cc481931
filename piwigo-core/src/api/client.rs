use std::fmt;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use piwigo_model::{
    AlbumId, AlbumRecord, ImageId, ImageRecord, ImageScope, TagRecord, UploadChunk,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use super::wire::{
    self, AlbumList, CreatedTag, Envelope, ImageList, Scalar, TagList, WireImage, WireTagEntry,
};
use super::{PwgRequest, Transport};
use crate::error::{ClientError, ClientResult};
use crate::network::{
    AlbumMutation, ImageMutation, ImagePage, ImagePageRequest, NetworkClient, TagListing,
};
use crate::settings::CacheSettings;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// [`NetworkClient`] speaking the Piwigo JSON API over a [`Transport`].
pub struct PiwigoApi<T> {
    transport: T,
    recent_period_days: u32,
    thumbnail_size: &'static str,
}

impl<T> fmt::Debug for PiwigoApi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PiwigoApi")
            .field("recent_period_days", &self.recent_period_days)
            .field("thumbnail_size", &self.thumbnail_size)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> PiwigoApi<T> {
    pub fn new(transport: T, settings: &CacheSettings) -> Self {
        Self {
            transport,
            recent_period_days: settings.recent_period_days,
            thumbnail_size: "thumb",
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request and unwrap the `stat`/`result` envelope.
    async fn call(&self, request: PwgRequest) -> ClientResult<Value> {
        let method = request.method;
        let body = self.transport.call(request).await?;
        let envelope: Envelope = serde_json::from_value(body)
            .map_err(|err| ClientError::decode(format!("{method}: {err}")))?;
        envelope.into_result()
    }

    async fn call_typed<R: DeserializeOwned>(&self, request: PwgRequest) -> ClientResult<R> {
        let method = request.method;
        let result = self.call(request).await?;
        serde_json::from_value(result).map_err(|err| ClientError::decode(format!("{method}: {err}")))
    }

    fn images_request(&self, request: &ImagePageRequest) -> PwgRequest {
        let base = match &request.scope {
            ImageScope::Album(album) => PwgRequest::new("pwg.categories.getImages")
                .param("cat_id", album)
                .param("recursive", false),
            ImageScope::Search(query) => {
                PwgRequest::new("pwg.images.search").param("query", format!("*{query}*"))
            }
            ImageScope::Tagged(tag) => PwgRequest::new("pwg.tags.getImages").param("tag_id", tag),
            ImageScope::Favorites => PwgRequest::new("pwg.users.favorites.getList"),
            ImageScope::MostVisited => PwgRequest::new("pwg.categories.getImages")
                .param("recursive", true)
                .param("f_min_hit", 1),
            ImageScope::BestRated => PwgRequest::new("pwg.categories.getImages")
                .param("recursive", true)
                .param("f_min_rate", 1),
            ImageScope::Recent => {
                let since = Utc::now().naive_utc()
                    - Duration::days(i64::from(self.recent_period_days));
                PwgRequest::new("pwg.categories.getImages")
                    .param("recursive", true)
                    .param("f_min_date_available", since.format(DATE_FORMAT))
            }
        };
        base.param("per_page", request.per_page)
            .param("page", request.page)
            .param("order", request.sort.order_param())
    }
}

fn page_from_wire(request: &ImagePageRequest, list: ImageList) -> ClientResult<ImagePage> {
    let album = request.scope.real_album();
    let images = list
        .images
        .into_iter()
        .map(|image| image.into_record(album))
        .collect::<ClientResult<Vec<_>>>()?;

    let total = wire::total_count(list.paging.as_ref())?;

    let has_more = match total {
        Some(total) => (u64::from(request.page) + 1) * u64::from(request.per_page) < total,
        None => images.len() >= request.per_page as usize,
    };

    let page = ImagePage::new(images, has_more);
    Ok(match total {
        Some(total) => page.with_total(total),
        None => page,
    })
}

fn join_ids<I: fmt::Display>(ids: &[I]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl<T: Transport> NetworkClient for PiwigoApi<T> {
    #[instrument(skip(self), level = "debug")]
    async fn list_albums(&self) -> ClientResult<Vec<AlbumRecord>> {
        let request = PwgRequest::new("pwg.categories.getList")
            .param("recursive", true)
            .param("fullname", false)
            .param("thumbnail_size", self.thumbnail_size);
        let list: AlbumList = self.call_typed(request).await?;
        let albums = list
            .categories
            .into_iter()
            .map(|album| album.into_record())
            .collect::<ClientResult<Vec<_>>>()?;
        debug!(count = albums.len(), "albums listed");
        Ok(albums)
    }

    #[instrument(skip(self, request), fields(scope = %request.scope, page = request.page), level = "debug")]
    async fn list_images(&self, request: &ImagePageRequest) -> ClientResult<ImagePage> {
        let list: ImageList = self.call_typed(self.images_request(request)).await?;
        page_from_wire(request, list)
    }

    #[instrument(skip(self), level = "debug")]
    async fn image_info(&self, id: ImageId) -> ClientResult<ImageRecord> {
        let request = PwgRequest::new("pwg.images.getInfo").param("image_id", id);
        let image: WireImage = self.call_typed(request).await?;
        let record = image.into_record(None)?;
        if record.id != id {
            return Err(ClientError::decode(format!(
                "pwg.images.getInfo: asked for {id}, got {}",
                record.id
            )));
        }
        Ok(record)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_tags(&self, listing: TagListing) -> ClientResult<Vec<TagRecord>> {
        let method = match listing {
            TagListing::Visible => "pwg.tags.getList",
            TagListing::Admin => "pwg.tags.getAdminList",
        };
        let list: TagList = self.call_typed(PwgRequest::new(method)).await?;
        let tags = list
            .tags
            .into_iter()
            .map(WireTagEntry::into_record)
            .collect::<ClientResult<Vec<_>>>()?;
        debug!(count = tags.len(), "tags listed");
        Ok(tags)
    }

    async fn create_tag(&self, name: &str) -> ClientResult<TagRecord> {
        let request = PwgRequest::new("pwg.tags.add").param("name", name);
        let created: CreatedTag = self.call_typed(request).await?;
        let mut tag = TagRecord::new(
            wire::tag_id(&created.id)?,
            created.name.unwrap_or_else(|| name.to_string()),
        );
        tag.image_count = Some(0);
        Ok(tag)
    }

    async fn mutate_album(&self, mutation: &AlbumMutation) -> ClientResult<Option<AlbumRecord>> {
        match mutation {
            AlbumMutation::Create {
                name,
                parent,
                comment,
            } => {
                let request = PwgRequest::new("pwg.categories.add")
                    .param("name", name)
                    .param("parent", parent)
                    .param_opt("comment", comment.as_ref());
                let result = self.call(request).await?;
                let id = result
                    .get("id")
                    .cloned()
                    .map(serde_json::from_value::<Scalar>)
                    .transpose()?
                    .ok_or_else(|| ClientError::decode("pwg.categories.add: missing id"))?;

                let mut album = AlbumRecord::new(wire::album_id(&id)?, name.clone(), *parent);
                album.comment = comment.clone().unwrap_or_default();
                album.can_upload = true;
                Ok(Some(album))
            }
            AlbumMutation::Rename { id, name, comment } => {
                let request = PwgRequest::new("pwg.categories.setInfo")
                    .param("category_id", id)
                    .param("name", name)
                    .param_opt("comment", comment.as_ref());
                self.call(request).await?;
                Ok(None)
            }
            AlbumMutation::Move { id, new_parent } => {
                let request = PwgRequest::new("pwg.categories.move")
                    .param("category_id", id)
                    .param("parent", new_parent);
                self.call(request).await?;
                Ok(None)
            }
            AlbumMutation::Delete { id } => {
                let request = PwgRequest::new("pwg.categories.delete")
                    .param("category_id", id)
                    .param("photo_deletion_mode", "no_delete");
                self.call(request).await?;
                Ok(None)
            }
        }
    }

    async fn mutate_image(&self, mutation: &ImageMutation) -> ClientResult<Option<ImageRecord>> {
        let request = match mutation {
            ImageMutation::SetInfo { id, edit } => PwgRequest::new("pwg.images.setInfo")
                .param("image_id", id)
                .param_opt("name", edit.title.as_ref())
                .param_opt("comment", edit.comment.as_ref())
                .param_opt("author", edit.author.as_ref())
                .param_opt("level", edit.privacy.map(|level| level.level()))
                .param_opt(
                    "date_creation",
                    edit.date_created.map(|date| date.format(DATE_FORMAT)),
                )
                .param_opt("tag_ids", edit.tag_ids.as_deref().map(join_ids))
                .param("single_value_mode", "replace")
                .param("multiple_value_mode", "replace"),
            ImageMutation::Delete { ids } => {
                PwgRequest::new("pwg.images.delete").param("image_id", join_ids(ids))
            }
            ImageMutation::Associate { ids, album } => set_category(ids, *album, "associate"),
            ImageMutation::Dissociate { ids, album } => set_category(ids, *album, "dissociate"),
            ImageMutation::Move { ids, to, .. } => set_category(ids, *to, "move"),
        };
        self.call(request).await?;
        Ok(None)
    }

    async fn find_image_by_checksum(&self, md5: &str) -> ClientResult<Option<ImageId>> {
        let request = PwgRequest::new("pwg.images.exist").param("md5sum_list", md5);
        let result = self.call(request).await?;
        let found = match result.get(md5) {
            None | Some(Value::Null) => None,
            Some(value) => Some(wire::image_id(&serde_json::from_value::<Scalar>(
                value.clone(),
            )?)?),
        };
        Ok(found)
    }

    #[instrument(skip(self, chunk), fields(file = %chunk.request.file_name, chunk = chunk.chunk, chunks = chunk.chunks), level = "debug")]
    async fn upload_chunk(&self, chunk: &UploadChunk<'_>) -> ClientResult<Option<ImageRecord>> {
        let upload = chunk.request;
        let request = PwgRequest::new("pwg.images.uploadAsync")
            .param("chunk", chunk.chunk)
            .param("chunks", chunk.chunks)
            .param("original_sum", chunk.original_sum)
            .param("file_sum", format!("{:x}", md5::compute(chunk.data)))
            .param("category", upload.album)
            .param("filename", &upload.file_name)
            .param_opt("name", upload.title.as_ref())
            .param_opt("author", upload.author.as_ref())
            .param_opt("comment", upload.comment.as_ref())
            .param("level", upload.privacy.level())
            .param_opt(
                "tag_ids",
                (!upload.tag_ids.is_empty()).then(|| join_ids(&upload.tag_ids)),
            )
            .with_file(chunk.data.to_vec());

        let result = self.call(request).await?;
        if result.get("id").is_none_or(Value::is_null) {
            return Ok(None);
        }
        let image: WireImage = serde_json::from_value(result)?;
        image.into_record(Some(upload.album)).map(Some)
    }
}

fn set_category(ids: &[ImageId], album: AlbumId, action: &str) -> PwgRequest {
    PwgRequest::new("pwg.images.setCategory")
        .param("image_id", join_ids(ids))
        .param("category_id", album)
        .param("action", action)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::function;
    use piwigo_model::{ImageEdit, PrivacyLevel, UploadRequest};
    use serde_json::json;

    use super::*;
    use crate::api::MockTransport;
    use piwigo_model::ImageSort;

    fn api(transport: MockTransport) -> PiwigoApi<MockTransport> {
        PiwigoApi::new(transport, &CacheSettings::default())
    }

    fn page_request(scope: ImageScope, page: u32) -> ImagePageRequest {
        ImagePageRequest {
            scope,
            page,
            per_page: 2,
            sort: ImageSort::IdAscending,
        }
    }

    #[tokio::test]
    async fn album_pages_use_cat_id_and_report_more() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .with(function(|req: &PwgRequest| {
                req.method == "pwg.categories.getImages"
                    && req.get("cat_id") == Some("5")
                    && req.get("page") == Some("0")
                    && req.get("per_page") == Some("2")
                    && req.get("order") == Some("id asc")
            }))
            .times(1)
            .returning(|_| {
                Ok(json!({
                    "stat": "ok",
                    "result": {
                        "paging": {"page": 0, "per_page": 2, "count": 2, "total_count": "3"},
                        "images": [{"id": 10, "name": "a"}, {"id": 11, "name": "b"}]
                    }
                }))
            });

        let page = api(transport)
            .list_images(&page_request(ImageScope::Album(AlbumId(5)), 0))
            .await
            .expect("page");
        assert_eq!(page.images.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.total_count, Some(3));
        assert!(page.images[0].belongs_to(AlbumId(5)));
    }

    #[tokio::test]
    async fn smart_albums_dispatch_to_their_methods() {
        let cases = [
            (ImageScope::Search("sea".into()), "pwg.images.search", "query", "*sea*"),
            (ImageScope::Tagged(piwigo_model::TagId(4)), "pwg.tags.getImages", "tag_id", "4"),
            (ImageScope::MostVisited, "pwg.categories.getImages", "f_min_hit", "1"),
            (ImageScope::BestRated, "pwg.categories.getImages", "f_min_rate", "1"),
        ];

        for (scope, method, key, value) in cases {
            let mut transport = MockTransport::new();
            transport
                .expect_call()
                .with(function(move |req: &PwgRequest| {
                    req.method == method && req.get(key) == Some(value)
                }))
                .times(1)
                .returning(|_| Ok(json!({"stat": "ok", "result": {"images": []}})));

            let page = api(transport)
                .list_images(&page_request(scope, 0))
                .await
                .expect("page");
            assert!(page.images.is_empty());
            assert!(!page.has_more);
        }
    }

    #[tokio::test]
    async fn recent_scope_sends_a_date_bound() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .with(function(|req: &PwgRequest| {
                req.get("recursive") == Some("true")
                    && req.get("f_min_date_available").is_some()
            }))
            .returning(|_| Ok(json!({"stat": "ok", "result": {"images": []}})));

        api(transport)
            .list_images(&page_request(ImageScope::Recent, 0))
            .await
            .expect("page");
    }

    #[tokio::test]
    async fn server_failures_become_server_errors() {
        let mut transport = MockTransport::new();
        transport.expect_call().returning(|_| {
            Ok(json!({"stat": "fail", "err": 401, "message": "Access denied"}))
        });

        let err = api(transport).list_albums().await.expect_err("rejected");
        assert_eq!(
            err,
            ClientError::Server {
                code: 401,
                message: "Access denied".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_result_fields_fail_fast() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .returning(|_| Ok(json!({"stat": "ok", "result": {"albums": []}})));

        let err = api(transport).list_albums().await.expect_err("bad shape");
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn created_album_carries_the_new_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .with(function(|req: &PwgRequest| {
                req.method == "pwg.categories.add" && req.get("parent") == Some("3")
            }))
            .returning(|_| Ok(json!({"stat": "ok", "result": {"info": "Album added", "id": "14"}})));

        let album = api(transport)
            .mutate_album(&AlbumMutation::Create {
                name: "New".into(),
                parent: AlbumId(3),
                comment: None,
            })
            .await
            .expect("created")
            .expect("record");
        assert_eq!(album.id, AlbumId(14));
        assert_eq!(album.parent_id, AlbumId(3));
    }

    #[tokio::test]
    async fn set_info_sends_only_edited_fields() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .with(function(|req: &PwgRequest| {
                req.method == "pwg.images.setInfo"
                    && req.get("name") == Some("Renamed")
                    && req.get("level") == Some("4")
                    && req.get("comment").is_none()
            }))
            .times(1)
            .returning(|_| Ok(json!({"stat": "ok", "result": null})));

        let edit = ImageEdit {
            title: Some("Renamed".into()),
            privacy: Some(PrivacyLevel::AdminsFamily),
            ..Default::default()
        };
        api(transport)
            .mutate_image(&ImageMutation::SetInfo {
                id: ImageId(9),
                edit,
            })
            .await
            .expect("saved");
    }

    #[tokio::test]
    async fn checksum_lookup_reads_the_md5_key() {
        let mut transport = MockTransport::new();
        transport.expect_call().times(2).returning(|req| {
            let md5 = req.get("md5sum_list").unwrap_or_default().to_string();
            let hit = if md5 == "aaa" { json!("77") } else { Value::Null };
            let mut result = serde_json::Map::new();
            result.insert(md5, hit);
            Ok(json!({"stat": "ok", "result": result}))
        });

        let api = api(transport);
        assert_eq!(
            api.find_image_by_checksum("aaa").await.expect("lookup"),
            Some(ImageId(77))
        );
        assert_eq!(api.find_image_by_checksum("bbb").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn last_upload_chunk_yields_the_image() {
        let mut transport = MockTransport::new();
        transport.expect_call().times(2).returning(|req| {
            if req.get("chunk") == Some("0") {
                Ok(json!({"stat": "ok", "result": {"message": "chunks uploaded = 0"}}))
            } else {
                Ok(json!({"stat": "ok", "result": {"id": 501, "name": "beach", "file": "beach.jpg"}}))
            }
        });

        let upload = UploadRequest::new("local-1", "beach.jpg", vec![1, 2, 3, 4], AlbumId(5));
        let api = api(transport);
        let first = UploadChunk {
            request: &upload,
            original_sum: "abc",
            chunk: 0,
            chunks: 2,
            data: &upload.data[..2],
        };
        assert_eq!(api.upload_chunk(&first).await.expect("chunk 0"), None);

        let last = UploadChunk {
            chunk: 1,
            data: &upload.data[2..],
            ..first
        };
        let image = api
            .upload_chunk(&last)
            .await
            .expect("chunk 1")
            .expect("image");
        assert_eq!(image.id, ImageId(501));
        assert!(image.belongs_to(AlbumId(5)));
    }

    #[tokio::test]
    async fn image_details_come_from_get_info() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .with(function(|req: &PwgRequest| {
                req.method == "pwg.images.getInfo" && req.get("image_id") == Some("42")
            }))
            .times(1)
            .returning(|_| {
                Ok(json!({"stat": "ok", "result": {
                    "id": 42,
                    "name": "Harbour",
                    "categories": [{"id": 5}, {"id": "9"}],
                    "tags": [{"id": "2"}]
                }}))
            });

        let image = api(transport).image_info(ImageId(42)).await.expect("details");
        assert_eq!(image.title, "Harbour");
        assert!(image.belongs_to(AlbumId(5)) && image.belongs_to(AlbumId(9)));
        assert_eq!(image.tag_ids, vec![piwigo_model::TagId(2)]);
    }

    #[tokio::test]
    async fn tag_listings_pick_their_method() {
        let mut transport = MockTransport::new();
        transport.expect_call().times(2).returning(|req| {
            let tags = if req.method == "pwg.tags.getAdminList" {
                json!([{"id": "1", "name": "Unused", "url_name": "unused"}])
            } else {
                json!([{"id": 2, "name": "Sky", "url_name": "sky", "counter": 4}])
            };
            Ok(json!({"stat": "ok", "result": {"tags": tags}}))
        });
        let api = api(transport);

        let admin = api.list_tags(TagListing::Admin).await.expect("admin");
        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].image_count, None);

        let visible = api.list_tags(TagListing::Visible).await.expect("visible");
        assert_eq!(visible[0].name, "Sky");
        assert_eq!(visible[0].image_count, Some(4));
    }

    #[tokio::test]
    async fn created_tags_take_the_server_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .with(function(|req: &PwgRequest| {
                req.method == "pwg.tags.add" && req.get("name") == Some("Boats")
            }))
            .times(1)
            .returning(|_| {
                Ok(json!({"stat": "ok", "result": {"info": "Keyword added", "id": 17}}))
            });

        let tag = api(transport).create_tag("Boats").await.expect("created");
        assert_eq!(tag.id, piwigo_model::TagId(17));
        assert_eq!(tag.name, "Boats");
        assert_eq!(tag.image_count, Some(0));
    }
}
