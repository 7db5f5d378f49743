//! Request-string helpers for absMid computation.

use crate::error::Result;
use crate::loader::DojoRequire;
use dojo_amd_util::path as upath;
use tracing::trace;
use url::form_urlencoded;

/// Query-string key carrying explicit absMid aliases.
pub const ABS_MID_QUERY_KEY: &str = "absMid";

fn is_abs_mid_part(part: &str) -> bool {
    !part.starts_with(['.', '/', '\\']) && !upath::is_absolute(part)
}

/// Whether every part is a plain module id: no relative or absolute paths.
pub fn is_abs_mid<'a>(parts: impl IntoIterator<Item = &'a str>) -> bool {
    parts.into_iter().all(is_abs_mid_part)
}

/// [`is_abs_mid`] over the `!`-separated segments of a request.
#[must_use]
pub fn is_abs_mid_request(request: &str) -> bool {
    is_abs_mid(request.split('!'))
}

/// Canonicalize every segment of a loader-chain request.
///
/// Segments are resolved against the last non-empty segment of the issuer's
/// absMid, provided it has a directory part. If that fails the request is
/// retried without a context. Returns `None` when no attempt succeeds; the
/// caller keeps the request as it was.
#[must_use]
pub fn canonicalize(
    request: &str,
    issuer_abs_mid: Option<&str>,
    dojo_require: &dyn DojoRequire,
) -> Option<String> {
    if request.is_empty() {
        return None;
    }
    let context = issuer_abs_mid
        .and_then(|mid| mid.split('!').rev().find(|part| !part.is_empty()))
        .filter(|context| context.contains('/'));

    let result = canonicalize_with(request, context, dojo_require).or_else(|err| {
        if context.is_none() {
            return Err(err);
        }
        trace!(request, error = %err, "Retrying canonicalization without context");
        canonicalize_with(request, None, dojo_require)
    });
    match result {
        Ok(mid) => Some(mid),
        Err(err) => {
            trace!(request, error = %err, "Could not canonicalize request");
            None
        }
    }
}

fn canonicalize_with(
    request: &str,
    context: Option<&str>,
    dojo_require: &dyn DojoRequire,
) -> Result<String> {
    let segments = request
        .split('!')
        .map(|segment| dojo_require.to_abs_mid(segment, context))
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("!"))
}

/// Remove `absMid=` query arguments from every segment of `request`.
///
/// Returns the rewritten request and the non-empty absMid values in the order
/// they appeared. Other query arguments are kept, grouped by key in order of
/// first appearance.
#[must_use]
pub fn take_abs_mid_query_args(request: &str) -> (String, Vec<String>) {
    let mut abs_mids = Vec::new();
    let parts: Vec<String> = request
        .split('!')
        .map(|part| {
            let Some((path, query)) = part.split_once('?') else {
                return part.to_string();
            };

            let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
            for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                match grouped.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, values)) => values.push(value.into_owned()),
                    None => grouped.push((key.into_owned(), vec![value.into_owned()])),
                }
            }

            let Some(idx) = grouped.iter().position(|(k, _)| k == ABS_MID_QUERY_KEY) else {
                return part.to_string();
            };
            let (_, values) = grouped.remove(idx);
            let found: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
            if found.is_empty() {
                return part.to_string();
            }
            abs_mids.extend(found);

            if grouped.is_empty() {
                return path.to_string();
            }
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, values) in &grouped {
                for value in values {
                    serializer.append_pair(key, value);
                }
            }
            format!("{path}?{}", serializer.finish())
        })
        .collect();
    (parts.join("!"), abs_mids)
}
