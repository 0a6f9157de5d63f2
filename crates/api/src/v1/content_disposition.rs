//! The §6 `Content-Disposition` percent-encoding rule: map
//! `A–Z a–z 0–9 - _ . ! ~ * ' ( )` to themselves and every other byte to
//! `%HH`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const ARTICLE_TITLE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode an article title per the §6 rule.
#[must_use]
pub fn percent_encode_article_title(title: &str) -> String {
    utf8_percent_encode(title, ARTICLE_TITLE_ENCODE_SET).to_string()
}

/// Build the verbatim `Content-Disposition` header value for a rendered
/// article PDF.
#[must_use]
pub fn build_content_disposition(title: &str) -> String {
    let encoded = percent_encode_article_title(title);
    format!("attachment; filename=\"{encoded}.pdf\"; filename*=UTF-8''{encoded}.pdf")
}
