//! Serialization boundary
//!
//! Outbound payloads go through [`encode_json`], which resolves every pending
//! value in the scope before encoding, so no unresolved [`Deferred`](crate::Deferred)
//! reaches the wire. Inbound payloads go through [`decode_json`], which tells
//! malformed shapes apart from malformed syntax.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;
use thiserror::Error;

use crate::{Result, Scope};

/// Resolve the scope's active resolver set, then encode `value` as JSON
///
/// Fails with [`ResolveError::ScopeNotFound`](crate::ResolveError::ScopeNotFound)
/// when no resolver set is attached to `scope`.
pub async fn encode_json<T: Serialize + ?Sized>(scope: &Scope, value: &T) -> Result<Vec<u8>> {
    scope.resolve_all().await?;
    Ok(serde_json::to_vec(value)?)
}

/// Request body decode errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Well-formed JSON with the wrong shape (type mismatch, missing field)
    #[error("unmarshal type error: line={line}, column={column}, error={message}")]
    Type {
        line: usize,
        column: usize,
        message: String,
    },

    /// Not valid JSON, including truncated input
    #[error("syntax error: line={line}, column={column}, error={message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error(transparent)]
    Other(serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        let (line, column) = (err.line(), err.column());
        match err.classify() {
            Category::Data => DecodeError::Type {
                line,
                column,
                message: err.to_string(),
            },
            Category::Syntax | Category::Eof => DecodeError::Syntax {
                line,
                column,
                message: err.to_string(),
            },
            Category::Io => DecodeError::Other(err),
        }
    }
}

/// Decode a JSON payload
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoxError, Deferred, ResolveError, Resolver};
    use serde::Deserialize;

    async fn fetch_titles(
        _scope: Scope,
        ids: Vec<u64>,
    ) -> std::result::Result<Vec<String>, BoxError> {
        Ok(ids.iter().map(|id| format!("title-{}", id)).collect())
    }

    #[derive(Serialize)]
    struct Feed {
        items: Vec<Deferred<String, u64>>,
        pinned: Deferred<String, u64>,
    }

    #[derive(Debug, Deserialize)]
    struct NewPost {
        title: String,
    }

    #[tokio::test]
    async fn test_encode_resolves_before_writing() {
        let scope = Scope::new().with_resolvers(Resolver::from_fn("titles", fetch_titles));
        let titles = scope.resolvers::<Resolver<String, u64>>().unwrap();

        let feed = Feed {
            items: vec![titles.future(1), titles.future(2)],
            pinned: Deferred::ready("welcome".to_string()),
        };

        let body = encode_json(&scope, &feed).await.unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"items":["title-1","title-2"],"pinned":"welcome"}"#
        );
    }

    #[tokio::test]
    async fn test_encode_without_scope_resolvers() {
        let err = encode_json(&Scope::new(), &Deferred::<u8, u8>::ready(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ScopeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_encode_value_owned_by_foreign_resolver() {
        let scope = Scope::new().with_resolvers(Resolver::from_fn("titles", fetch_titles));
        let detached = Resolver::from_fn("detached", fetch_titles);

        let err = encode_json(&scope, &detached.future(5)).await.unwrap_err();

        assert!(matches!(err, ResolveError::Encode(_)));
        assert!(err.to_string().contains("resolver=detached, key=5"));
    }

    #[test]
    fn test_decode_shape_error() {
        let err = decode_json::<NewPost>(br#"{"title": 5}"#).unwrap_err();
        match err {
            DecodeError::Type { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column > 0);
            }
            other => panic!("expected Type, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_syntax_error() {
        let err = decode_json::<NewPost>(br#"{"title" "x"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { .. }));
        assert!(err.to_string().starts_with("syntax error: line=1"));
    }

    #[test]
    fn test_decode_truncated_input_is_syntax_error() {
        let err = decode_json::<NewPost>(br#"{"title": "x""#).unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { .. }));
    }

    #[test]
    fn test_decode_valid_payload() {
        let post = decode_json::<NewPost>(br#"{"title": "hello"}"#).unwrap();
        assert_eq!(post.title, "hello");
    }
}
