//! Utility functions shared by the checkout and discovery modules.
//!
//! - **URL handling**: lenient parsing and path matching for navigation URLs
//!
//! # Examples
//!
//! ```
//! use crowdflow::util::{parse_web_url, query_flag};
//!
//! let url = parse_web_url("https://www.kickstarter.com/checkouts/1/thanks?racing=1").unwrap();
//! assert!(query_flag(&url, "racing"));
//! ```

mod web_url;

pub use web_url::{
    ensure_web_scheme, parse_web_url, query_flag, same_resource, segments_under, trimmed_path,
    UrlError,
};
