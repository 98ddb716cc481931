//! Typed shapes of the Piwigo JSON payloads and their conversion into model
//! records.
//!
//! Piwigo is loose with scalar types: ids, counters and sizes arrive as
//! numbers or as strings depending on server version and plugin set, and
//! most fields may be `null`. [`Scalar`] absorbs that; anything else that
//! does not match fails the whole decode.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use piwigo_model::{
    AlbumId, AlbumRecord, ImageId, ImageRecord, ImageSize, PrivacyLevel, SizeTable, SizedUrl,
    TagId, TagRecord,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `{"stat": "ok", "result": ...}` or `{"stat": "fail", "err": .., "message": ..}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    stat: String,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    err: Value,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    /// The `result` payload, or the server's error.
    pub(crate) fn into_result(self) -> ClientResult<Value> {
        match self.stat.as_str() {
            "ok" => Ok(self.result),
            "fail" => {
                // Some methods nest the error as {"code": .., "msg": ..}.
                let (code, nested) = match &self.err {
                    Value::Object(fields) => (
                        fields.get("code").and_then(value_as_i64),
                        fields.get("msg").and_then(Value::as_str).map(str::to_owned),
                    ),
                    other => (value_as_i64(other), None),
                };
                Err(ClientError::Server {
                    code: code.unwrap_or(-1),
                    message: self.message.or(nested).unwrap_or_default(),
                })
            }
            other => Err(ClientError::decode(format!("unexpected stat {other:?}"))),
        }
    }
}

/// Number or numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(value) => Some(*value),
            Scalar::Float(value) => whole(*value),
            Scalar::Text(text) => {
                let text = text.trim();
                text.parse()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(whole))
            }
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            Scalar::Text(text) => text.trim().parse().ok(),
        }
    }

    fn require_i64(&self, field: &str) -> ClientResult<i64> {
        self.as_i64()
            .ok_or_else(|| ClientError::decode(format!("{field} is not an integer: {self:?}")))
    }

    fn require_i32(&self, field: &str) -> ClientResult<i32> {
        let value = self.require_i64(field)?;
        i32::try_from(value)
            .map_err(|_| ClientError::decode(format!("{field} out of range: {value}")))
    }

    fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(text) if text.trim().is_empty())
    }
}

/// Integral floats only; `3.0` is an id, `3.5` is not.
fn whole(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64)
        .then_some(value as i64)
}

/// Absent, `null` and `""` are `None`; anything else must be an integer.
fn optional_i64(value: &Option<Scalar>, field: &str) -> ClientResult<Option<i64>> {
    match value {
        None => Ok(None),
        Some(scalar) if scalar.is_blank() => Ok(None),
        Some(scalar) => scalar.require_i64(field).map(Some),
    }
}

fn optional_i32(value: &Option<Scalar>, field: &str) -> ClientResult<Option<i32>> {
    match value {
        None => Ok(None),
        Some(scalar) if scalar.is_blank() => Ok(None),
        Some(scalar) => scalar.require_i32(field).map(Some),
    }
}

pub(crate) fn album_id(value: &Scalar) -> ClientResult<AlbumId> {
    value.require_i32("album id").map(AlbumId)
}

pub(crate) fn tag_id(value: &Scalar) -> ClientResult<TagId> {
    value.require_i32("tag id").map(TagId)
}

pub(crate) fn image_id(value: &Scalar) -> ClientResult<ImageId> {
    value.require_i64("image id").map(ImageId)
}

pub(crate) fn total_count(paging: Option<&Paging>) -> ClientResult<Option<u64>> {
    let total = paging.map_or(Ok(None), |paging| optional_i64(&paging.total_count, "total_count"))?;
    Ok(total.map(|total| total.max(0) as u64))
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn count(value: &Option<Scalar>, field: &str) -> ClientResult<u64> {
    Ok(optional_i64(value, field)?.map_or(0, |value| value.max(0) as u64))
}

fn text(value: Option<String>) -> String {
    value.unwrap_or_default()
}

pub(crate) fn parse_date(value: Option<&str>) -> ClientResult<Option<NaiveDateTime>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        // MySQL zero dates mean "unknown".
        Some(raw) if raw.starts_with("0000-00-00") => Ok(None),
        Some(raw) => NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|err| ClientError::decode(format!("bad date {raw:?}: {err}"))),
    }
}

/// Entry of `pwg.categories.getList`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireAlbum {
    id: Scalar,
    name: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    uppercats: Option<String>,
    #[serde(default)]
    global_rank: Option<String>,
    #[serde(default)]
    nb_images: Option<Scalar>,
    #[serde(default)]
    total_nb_images: Option<Scalar>,
    #[serde(default)]
    nb_categories: Option<Scalar>,
    #[serde(default)]
    id_uppercat: Option<Scalar>,
    #[serde(default)]
    representative_picture_id: Option<Scalar>,
    #[serde(default)]
    tn_url: Option<String>,
    #[serde(default)]
    date_last: Option<String>,
    #[serde(default)]
    max_date_last: Option<String>,
    #[serde(default)]
    can_upload: Option<bool>,
}

impl WireAlbum {
    pub(crate) fn into_record(self) -> ClientResult<AlbumRecord> {
        let id = album_id(&self.id)?;
        let parent_id = optional_i32(&self.id_uppercat, "id_uppercat")?
            .map_or(AlbumId::ROOT, AlbumId);

        let mut upper_categories = self
            .uppercats
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i32>()
                    .map(AlbumId)
                    .map_err(|_| ClientError::decode(format!("bad uppercats entry {part:?}")))
            })
            .collect::<ClientResult<Vec<_>>>()?;
        if upper_categories.last() != Some(&id) {
            upper_categories.push(id);
        }

        let date_last = match parse_date(self.max_date_last.as_deref())? {
            Some(date) => Some(date),
            None => parse_date(self.date_last.as_deref())?,
        };

        let nb_images = count(&self.nb_images, "nb_images")?;
        let total_nb_images = count(&self.total_nb_images, "total_nb_images")?;
        let nb_sub_albums = count(&self.nb_categories, "nb_categories")?;
        let thumbnail_id =
            optional_i64(&self.representative_picture_id, "representative_picture_id")?;
        Ok(AlbumRecord {
            id,
            name: self.name,
            comment: text(self.comment),
            parent_id,
            upper_categories,
            global_rank: self.global_rank,
            nb_images,
            total_nb_images: total_nb_images.max(nb_images),
            nb_sub_albums: u32::try_from(nb_sub_albums).unwrap_or(u32::MAX),
            thumbnail_id: thumbnail_id.map(ImageId),
            thumbnail_url: self.tn_url.filter(|url| !url.is_empty()),
            date_last,
            can_upload: self.can_upload.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumList {
    pub(crate) categories: Vec<WireAlbum>,
}

/// Entry of `pwg.tags.getList` or `pwg.tags.getAdminList`. The admin list
/// sends ids as strings and no counter.
#[derive(Debug, Deserialize)]
pub(crate) struct WireTagEntry {
    id: Scalar,
    name: String,
    #[serde(default)]
    url_name: Option<String>,
    #[serde(default)]
    lastmodified: Option<String>,
    #[serde(default)]
    counter: Option<Scalar>,
}

impl WireTagEntry {
    pub(crate) fn into_record(self) -> ClientResult<TagRecord> {
        let id = tag_id(&self.id)?;
        let image_count = optional_i64(&self.counter, "tag counter")?;
        Ok(TagRecord {
            id,
            name: self.name,
            url_name: text(self.url_name),
            last_modified: parse_date(self.lastmodified.as_deref())?,
            image_count: image_count.map(|count| count.max(0) as u64),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagList {
    pub(crate) tags: Vec<WireTagEntry>,
}

/// Result of `pwg.tags.add`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedTag {
    pub(crate) id: Scalar,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDerivative {
    url: Option<String>,
    #[serde(default)]
    width: Option<Scalar>,
    #[serde(default)]
    height: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct WireTag {
    id: Scalar,
}

#[derive(Debug, Deserialize)]
struct WireCategoryRef {
    id: Scalar,
}

/// One image as returned by the listing, search and upload methods.
#[derive(Debug, Deserialize)]
pub(crate) struct WireImage {
    id: Scalar,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    hit: Option<Scalar>,
    #[serde(default)]
    date_available: Option<String>,
    #[serde(default)]
    date_creation: Option<String>,
    #[serde(default)]
    width: Option<Scalar>,
    #[serde(default)]
    height: Option<Scalar>,
    #[serde(default)]
    element_url: Option<String>,
    #[serde(default)]
    level: Option<Scalar>,
    #[serde(default)]
    rating_score: Option<Scalar>,
    #[serde(default)]
    filesize: Option<Scalar>,
    #[serde(default)]
    md5sum: Option<String>,
    #[serde(default)]
    rank: Option<Scalar>,
    #[serde(default)]
    tags: Vec<WireTag>,
    #[serde(default)]
    categories: Vec<WireCategoryRef>,
    #[serde(default)]
    derivatives: BTreeMap<String, WireDerivative>,
}

fn dimension(value: &Option<Scalar>) -> ClientResult<u32> {
    Ok(optional_i64(value, "dimension")?
        .map_or(0, |value| value.clamp(0, i64::from(u32::MAX)) as u32))
}

impl WireImage {
    /// Convert to a record. `album` is added to the memberships when the
    /// payload does not list the image's categories.
    pub(crate) fn into_record(self, album: Option<AlbumId>) -> ClientResult<ImageRecord> {
        let id = image_id(&self.id)?;

        let mut sizes = SizeTable::new();
        for (name, derivative) in &self.derivatives {
            let (Some(size), Some(url)) = (ImageSize::from_wire_name(name), &derivative.url)
            else {
                continue;
            };
            sizes.set(
                size,
                SizedUrl::new(
                    url.clone(),
                    dimension(&derivative.width)?,
                    dimension(&derivative.height)?,
                ),
            );
        }
        if let Some(url) = self.element_url.filter(|url| !url.is_empty()) {
            sizes.set(
                ImageSize::FullRes,
                SizedUrl::new(url, dimension(&self.width)?, dimension(&self.height)?),
            );
        }

        let privacy = match optional_i64(&self.level, "level")? {
            Some(level) => PrivacyLevel::from_level(level)?,
            None => PrivacyLevel::default(),
        };

        let mut album_ids = self
            .categories
            .iter()
            .map(|category| album_id(&category.id))
            .collect::<ClientResult<std::collections::BTreeSet<_>>>()?;
        let tag_ids = self
            .tags
            .iter()
            .map(|tag| tag_id(&tag.id))
            .collect::<ClientResult<Vec<_>>>()?;
        if album_ids.is_empty()
            && let Some(album) = album.filter(|album| album.is_real())
        {
            album_ids.insert(album);
        }

        Ok(ImageRecord {
            id,
            title: text(self.name),
            comment: text(self.comment),
            author: text(self.author),
            file_name: text(self.file),
            date_created: parse_date(self.date_creation.as_deref())?,
            date_posted: parse_date(self.date_available.as_deref())?,
            privacy,
            visits: count(&self.hit, "hit")?,
            rating_score: self
                .rating_score
                .as_ref()
                .and_then(Scalar::as_f64)
                .map(|score| score as f32),
            file_size: optional_i64(&self.filesize, "filesize")?.map(|size| size.max(0) as u64),
            checksum: self.md5sum.filter(|sum| !sum.is_empty()),
            rank: optional_i64(&self.rank, "rank")?,
            sizes,
            tag_ids,
            album_ids,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub(crate) total_count: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageList {
    #[serde(default)]
    pub(crate) paging: Option<Paging>,
    pub(crate) images: Vec<WireImage>,
}
