use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3001";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::Api {
                status: StatusCode::NOT_FOUND,
                ..
            }
        )
    }
}

#[derive(Clone)]
pub struct StoreClient {
    http: Client,
    base_url: Url,
}

impl StoreClient {
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    pub async fn get_bookmarks(&self) -> Result<BookmarksDocument, StoreError> {
        let url = self.endpoint("/api/bookmarks")?;
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, StoreError> {
        let url = self.endpoint("/api/bookmarks/categories")?;
        let response = self
            .http
            .post(url)
            .json(&NewCategory { name })
            .send()
            .await?;
        let payload: CategoryEnvelope = Self::handle_response(response).await?;
        Ok(payload.category)
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("/api/bookmarks/categories/{category_id}"))?;
        let response = self.http.delete(url).send().await?;
        let _: Ack = Self::handle_response(response).await?;
        Ok(())
    }

    pub async fn create_bookmark(
        &self,
        category_id: &str,
        bookmark: &NewBookmark,
    ) -> Result<Bookmark, StoreError> {
        let url = self.endpoint(&format!("/api/bookmarks/categories/{category_id}/bookmarks"))?;
        let response = self.http.post(url).json(bookmark).send().await?;
        let payload: BookmarkEnvelope = Self::handle_response(response).await?;
        Ok(payload.bookmark)
    }

    pub async fn delete_bookmark(
        &self,
        category_id: &str,
        bookmark_id: &str,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&format!(
            "/api/bookmarks/categories/{category_id}/bookmarks/{bookmark_id}"
        ))?;
        let response = self.http.delete(url).send().await?;
        let _: Ack = Self::handle_response(response).await?;
        Ok(())
    }

    pub async fn update_bookmark(
        &self,
        category_id: &str,
        bookmark_id: &str,
        patch: &BookmarkPatch,
    ) -> Result<Bookmark, StoreError> {
        let url = self.endpoint(&format!(
            "/api/bookmarks/categories/{category_id}/bookmarks/{bookmark_id}"
        ))?;
        let response = self.http.patch(url).json(patch).send().await?;
        let payload: BookmarkEnvelope = Self::handle_response(response).await?;
        Ok(payload.bookmark)
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Api { status, body })
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookmarksDocument {
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Bookmark {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, rename = "quickLink")]
    pub quick_link: Option<bool>,
}

#[derive(Debug, Serialize)]
struct NewCategory<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBookmark {
    pub name: String,
    pub url: String,
    pub icon: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookmarkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "quickLink")]
    pub quick_link: Option<bool>,
}

impl BookmarkPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.icon.is_none()
            && self.color.is_none()
            && self.quick_link.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct CategoryEnvelope {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    category: Category,
}

#[derive(Debug, Deserialize)]
struct BookmarkEnvelope {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    bookmark: Bookmark,
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
}
