//! API v1 DTOs and helpers: the `GET /{domain}/v1/pdf/{title}/{format}[/{type}]`
//! wire contract's path-segment parsing, error body shape, and
//! `Content-Disposition` encoding.

mod content_disposition;
mod mappers;
mod types;

pub use content_disposition::{build_content_disposition, percent_encode_article_title};
pub use mappers::render_error_to_api_v1_response;
pub use types::{
    ApiV1DeviceProfileParam, ApiV1ErrorBody, ApiV1ErrorResponse, ApiV1PageFormatParam,
    ApiV1PathParamError,
};
