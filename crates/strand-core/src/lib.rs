pub mod codec;
pub mod error;
pub mod record;
pub mod uri;

pub use codec::{binary_value, decode_from_json, encode_for_json, value_bytes, value_to_bytes};
pub use error::{http_status_for_code, StrandError};
pub use record::{
    DeleteResult, HealthResult, HealthStatus, ListEntry, ListEntryKind, ListOptions, ListResult,
    Pagination, ReadMultiEntry, ReadMultiResult, ReadResult, ReceiveResult, Record, SortBy,
    SortOrder, Transaction, DEFAULT_LIST_LIMIT, READ_MULTI_MAX,
};
pub use uri::{substitute, Uri};
