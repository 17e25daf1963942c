pub mod cbf_csv;
pub mod config;
mod error;
pub mod month;
pub mod normalize;
pub mod source;
pub mod split;
pub mod transform;
pub mod types;
pub mod upload;

pub use cbf_csv::{CORE_COLUMNS, read_raw_records, write_line_items};
pub use config::{AdaptorConfig, Env, parse_dotenv};
pub use error::{CostdropError, Result};
pub use month::{Month, resolve_months};
pub use normalize::normalize_record;
pub use source::{CsvFileSource, RecordSource};
pub use split::{MAX_PAYLOAD_BYTES, PayloadGroup, SplitOutcome, split_line_items};
pub use transform::{TransformOutcome, transform_records};
pub use types::{LineItem, LineItemKind, Operation, RawRecord, RecordKind};
pub use upload::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT, MonthReport, SendOutcome, StreamClient, UploadReport,
};
