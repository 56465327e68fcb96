//! # 严格的请求提取器
//!
//! 请求体必须是 `application/json`，未知字段与重复字段都会被拒绝；
//! 路径中的编号必须是正整数。所有拒绝都转换为带 `field` 的 400。

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{HeaderMap, header, request::Parts},
};
use serde::de::DeserializeOwned;

use crate::domain::TicketCode;
use crate::error::TicketingError;

/// 从 serde 的错误信息中取出第一个反引号包围的名字
///
/// serde 的格式为 ``unknown field `x`, expected ...``、``duplicate field `x` ``
/// 或 ``missing field `x` ``。
fn offending_field(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(message[start..start + len].to_string())
}

fn deserialize_error(message: &str) -> TicketingError {
    // serde_json 会在末尾附加 " at line 1 column 12"
    let clean = message
        .rsplit_once(" at line ")
        .map_or(message, |(head, _)| head)
        .to_string();
    TicketingError::InvalidRequest {
        field: offending_field(&clean),
        message: clean,
    }
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json")
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
}

/// 严格绑定的 JSON 请求体
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJson<T>(pub T);

impl<T, S> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = TicketingError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_json_content_type(req.headers()) {
            return Err(TicketingError::invalid_request(
                "expected Content-Type: application/json",
            ));
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            TicketingError::invalid_request(format!("failed to read request body: {rejection}"))
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TicketingError::invalid_request("request body must not be empty"));
        }

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| deserialize_error(&e.to_string()))
    }
}

/// 严格绑定的查询参数，未知参数返回 400
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for StrictQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = TicketingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::try_from_uri(&parts.uri)
            .map(|Query(value)| Self(value))
            .map_err(|rejection| {
                let text = rejection.body_text();
                let text = text
                    .strip_prefix("Failed to deserialize query string: ")
                    .unwrap_or(&text);
                deserialize_error(text)
            })
    }
}

async fn raw_path_params(parts: &mut Parts) -> Result<Vec<(String, String)>, TicketingError> {
    Path::<Vec<(String, String)>>::from_request_parts(parts, &())
        .await
        .map(|Path(params)| params)
        .map_err(|rejection| TicketingError::invalid_request(rejection.body_text()))
}

fn parse_positive(name: &str, raw: &str) -> Result<i32, TicketingError> {
    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(TicketingError::invalid_field(
            name,
            format!("{name} must be a positive integer, got {raw:?}"),
        )),
    }
}

/// 单个正整数路径参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveId(pub i32);

impl<S> FromRequestParts<S> for PositiveId
where
    S: Send + Sync,
{
    type Rejection = TicketingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = raw_path_params(parts).await?;
        let (name, raw) = params
            .last()
            .ok_or_else(|| TicketingError::internal("route has no path parameter"))?;
        parse_positive(name, raw).map(Self)
    }
}

/// 两个正整数路径参数，按路由中的顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveIdPair(pub i32, pub i32);

impl<S> FromRequestParts<S> for PositiveIdPair
where
    S: Send + Sync,
{
    type Rejection = TicketingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = raw_path_params(parts).await?;
        let [(first_name, first), (second_name, second)] = params.as_slice() else {
            return Err(TicketingError::internal("route must have two path parameters"));
        };
        Ok(Self(
            parse_positive(first_name, first)?,
            parse_positive(second_name, second)?,
        ))
    }
}

/// 门票编号路径参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketCodePath(pub TicketCode);

impl<S> FromRequestParts<S> for TicketCodePath
where
    S: Send + Sync,
{
    type Rejection = TicketingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = raw_path_params(parts).await?;
        let (_, raw) = params
            .last()
            .ok_or_else(|| TicketingError::internal("route has no path parameter"))?;
        raw.parse::<TicketCode>()
            .map(Self)
            .map_err(|e| TicketingError::invalid_field("code", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Body {
        #[allow(dead_code)]
        name: String,
    }

    fn json_request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = HttpRequest::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(axum::body::Body::from(body)).unwrap()
    }

    #[test]
    fn extracts_backticked_field() {
        assert_eq!(
            offending_field("unknown field `colour`, expected `name`").as_deref(),
            Some("colour")
        );
        assert_eq!(offending_field("expected value"), None);
    }

    #[tokio::test]
    async fn rejects_unknown_fields() {
        let err = StrictJson::<Body>::from_request(
            json_request(Some("application/json"), r#"{"name":"a","colour":"red"}"#),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field(), Some("colour"));
        assert!(!err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn rejects_duplicate_fields() {
        let err = StrictJson::<Body>::from_request(
            json_request(Some("application/json"), r#"{"name":"a","name":"b"}"#),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[tokio::test]
    async fn rejects_wrong_content_type_and_empty_body() {
        let err = StrictJson::<Body>::from_request(json_request(Some("text/plain"), "{}"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::InvalidRequest { .. }));

        let err = StrictJson::<Body>::from_request(json_request(Some("application/json"), "  "), &())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn accepts_json_with_charset() {
        let StrictJson(body) = StrictJson::<Body>::from_request(
            json_request(Some("application/json; charset=utf-8"), r#"{"name":"Gala"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(body.name, "Gala");
    }

    #[tokio::test]
    async fn strict_query_rejects_unknown_params() {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Filters {
            #[allow(dead_code)]
            page: Option<u64>,
        }
        let request = HttpRequest::builder().uri("/events?page=2&sort=x").body(()).unwrap();
        let (mut parts, ()) = request.into_parts();
        let err = StrictQuery::<Filters>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("sort"));
    }

    #[test]
    fn positive_ids_only() {
        assert_eq!(parse_positive("id", "7").unwrap(), 7);
        let err = parse_positive("event_id", "0").unwrap_err();
        assert_eq!(err.field(), Some("event_id"));
        assert!(parse_positive("id", "-3").is_err());
        assert!(parse_positive("id", "abc").is_err());
    }
}
