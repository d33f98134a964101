//! newsroom-core: presentation utilities for a news-reading client.
//!
//! This crate turns raw article and event data into display values, including:
//! - Configuration namespaces with dotted-path lookup
//! - Date rendering under configured format policies, with an injectable clock
//! - Agenda event labels
//! - Plain-text extraction and word counts for HTML bodies
//! - URL query synchronization and live-update subscriptions

pub mod agenda;
pub mod clock;
pub mod config;
pub mod dates;
pub mod error;
pub mod html;
pub mod i18n;
pub mod paths;
pub mod push;
pub mod query;
pub mod types;
pub mod wordcount;

pub use agenda::{AgendaDate, AgendaDates, AgendaLabel};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClientConfig;
pub use dates::{DateFormatter, DateInput, DatePolicies, FormatPolicy, Moment};
pub use error::{Error, Result};
pub use html::{HtmlFragment, TextTree, extract_text};
pub use i18n::Translations;
pub use paths::AppPaths;
pub use push::{LiveUpdates, MemoryChannel, PushChannel};
pub use query::{History, MemoryHistory, QueryParams, QueryUpdateSet, sync_query_params};
pub use types::NewsItem;
pub use wordcount::{char_count, word_count};
