use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::config::Config;
use crate::inbox::{FetchQuery, Notification, NotificationId, NotificationPage};

use super::api_types::{ApiErrorBody, ApiListResponse, ApiReadFlagPayload, ApiSingleResponse};
use super::{Transport, TransportError, TransportResult};

/// REST client for the notification API
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: Url,
  token: String,
}

impl HttpTransport {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    let timeout = Duration::from_secs(config.api.timeout_secs);

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base_url = parse_base_url(&config.api.base_url)?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }

  fn endpoint(&self, path: &str) -> TransportResult<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| TransportError::InvalidRequest(format!("endpoint {}: {}", path, e)))
  }

  fn list_url(&self, query: FetchQuery) -> TransportResult<Url> {
    let mut url = self.endpoint("notifications/")?;
    {
      let mut pairs = url.query_pairs_mut();
      if let Some(unread) = query.unread_only {
        pairs.append_pair("unread", if unread { "true" } else { "false" });
      }
      if let Some(page) = query.page {
        pairs.append_pair("page", &page.to_string());
      }
    }
    // An empty query_pairs_mut() still leaves a trailing '?'
    if url.query() == Some("") {
      url.set_query(None);
    }
    Ok(url)
  }

  async fn send(&self, request: reqwest::RequestBuilder) -> TransportResult<Response> {
    let response = request
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| TransportError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let message = response
      .json::<ApiErrorBody>()
      .await
      .ok()
      .and_then(ApiErrorBody::message)
      .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    Err(classify_status(status, message))
  }

  async fn decode<T: DeserializeOwned>(response: Response) -> TransportResult<T> {
    response
      .json::<T>()
      .await
      .map_err(|e| TransportError::Decode(e.to_string()))
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn list_notifications(&self, query: FetchQuery) -> TransportResult<NotificationPage> {
    let url = self.list_url(query)?;
    trace!(%url, "GET notifications");

    let response = self.send(self.http.get(url)).await?;
    let body: ApiListResponse = Self::decode(response).await?;
    debug!(
      status = %body.status,
      count = body.data.notifications.len(),
      unread = body.data.unread_count,
      "listed notifications"
    );

    Ok(body.into_page())
  }

  async fn set_read_flag(
    &self,
    id: NotificationId,
    is_read: bool,
  ) -> TransportResult<Notification> {
    let url = self.endpoint(&format!("notifications/{}/", id))?;
    trace!(%url, is_read, "PATCH notification");

    let request = self.http.patch(url).json(&ApiReadFlagPayload { is_read });
    let response = self.send(request).await?;
    let body: ApiSingleResponse = Self::decode(response).await?;
    debug!(%id, status = %body.status, message = %body.message, "updated read flag");

    Ok(body.data.into_notification())
  }

  async fn mark_all_read(&self) -> TransportResult<()> {
    let url = self.endpoint("notifications/mark-all-read/")?;
    trace!(%url, "POST mark-all-read");

    self.send(self.http.post(url)).await?;
    Ok(())
  }

  async fn unread_count(&self) -> TransportResult<u32> {
    let page = self.list_notifications(FetchQuery::unread()).await?;
    Ok(page.unread_count)
  }
}

/// Map a non-success status to the transport taxonomy
pub fn classify_status(status: StatusCode, message: String) -> TransportError {
  match status {
    StatusCode::UNAUTHORIZED => TransportError::Unauthorized,
    StatusCode::FORBIDDEN => TransportError::Forbidden,
    StatusCode::NOT_FOUND => TransportError::NotFound,
    _ => TransportError::Server {
      status: status.as_u16(),
      message,
    },
  }
}

/// Parse the configured base URL, making sure it ends in '/' so relative
/// joins append instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };
  Url::parse(&normalized).map_err(|e| eyre!("Invalid api.base_url '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn transport(base: &str) -> HttpTransport {
    HttpTransport {
      http: reqwest::Client::new(),
      base_url: parse_base_url(base).unwrap(),
      token: "token".to_string(),
    }
  }

  #[test]
  fn test_base_url_keeps_path_prefix() {
    let t = transport("https://example.org/api");
    assert_eq!(
      t.endpoint("notifications/7/").unwrap().as_str(),
      "https://example.org/api/notifications/7/"
    );
  }

  #[test]
  fn test_list_url_query_params() {
    let t = transport("https://example.org/api/");

    let url = t.list_url(FetchQuery::default()).unwrap();
    assert_eq!(url.as_str(), "https://example.org/api/notifications/");

    let url = t
      .list_url(FetchQuery {
        unread_only: Some(true),
        page: Some(3),
      })
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://example.org/api/notifications/?unread=true&page=3"
    );
  }

  #[test]
  fn test_bad_endpoint_is_not_a_network_error() {
    let t = transport("https://example.org/api/");
    assert!(matches!(
      t.endpoint("http://[::1"),
      Err(TransportError::InvalidRequest(_))
    ));
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(parse_base_url("not a url").is_err());
  }

  #[test]
  fn test_classify_status() {
    assert_eq!(
      classify_status(StatusCode::UNAUTHORIZED, String::new()),
      TransportError::Unauthorized
    );
    assert_eq!(
      classify_status(StatusCode::FORBIDDEN, String::new()),
      TransportError::Forbidden
    );
    assert_eq!(
      classify_status(StatusCode::NOT_FOUND, String::new()),
      TransportError::NotFound
    );
    assert_eq!(
      classify_status(StatusCode::BAD_GATEWAY, "upstream".to_string()),
      TransportError::Server {
        status: 502,
        message: "upstream".to_string()
      }
    );
  }
}
