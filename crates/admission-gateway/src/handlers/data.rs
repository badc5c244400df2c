//! Raw binary column download.
//!
//! `GET data/:table/:id/:column/:hash` serves the stored bytes only when
//! `:hash` is the Keccak-256 of those bytes, so links cannot be guessed from
//! row ids alone.

use crate::domain::error::{ApiError, ApiResult};
use crate::middleware::chain::Reply;
use crate::ports::BinaryStore;
use axum::extract::{Path, State};
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use tracing::debug;

pub async fn fetch_binary(
    State(store): State<Arc<dyn BinaryStore>>,
    Path((table, id, column, hash)): Path<(String, String, String, String)>,
) -> ApiResult<Reply> {
    let row_id: i64 = id
        .parse()
        .map_err(|_| ApiError::invalid_params(format!("id {id:?} is not an int64")))?;

    let Some(body) = store.fetch(&table, row_id, &column).await? else {
        return Err(ApiError::not_found(format!("{table}/{id}/{column}")));
    };

    if !constant_time_compare(&keccak_hex(&body), &hash.to_ascii_lowercase()) {
        debug!(table = %table, id = row_id, column = %column, "Binary hash mismatch");
        return Err(ApiError::not_found(format!("{table}/{id}/{column}")));
    }

    Ok(Reply::Binary {
        content_type: "application/octet-stream",
        body,
    })
}

/// Lowercase hex Keccak-256 digest
pub fn keccak_hex(data: &[u8]) -> String {
    hex::encode(Keccak256::digest(data))
}

/// Constant-time string comparison.
///
/// Takes the same time however many leading bytes match. Length differences
/// are folded into the result rather than returned early.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad bytes so unequal lengths never compare equal
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
