//! Wire protocol of the camera's recording API.
//!
//! Every request is a small SOAP-style envelope POSTed over plain HTTP.
//! The header carries the shared credentials, the body carries the
//! operation payload.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use quick_xml::escape::escape;

/// Endpoint that lists recordings for a time window.
pub const QUERY_PATH: &str = "/getRecordQueryInfo";
/// Prefix of the download endpoint; the recording's remote path is appended.
pub const PLAYBACK_PATH: &str = "/playback";
/// Endpoint that removes a recording from the SD card.
pub const DELETE_PATH: &str = "/setDeleteFile";

/// Timestamp format used by the device, both in queries and responses.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Condition filter: any record mode, video only, any stream, no size bounds.
const RECORD_MODE_ANY: i32 = -1;
const MEDIA_TYPE_VIDEO: i32 = 3;
const STREAM_INDEX_ANY: i32 = -1;
const SIZE_UNBOUNDED: i64 = -1;

/// A single recording stored on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Device-side path, e.g. `/mnt/sd/record/20240601/100000.mp4`.
    pub remote_path: String,
    pub size_bytes: u64,
    pub record_mode: String,
    pub media_type: String,
    pub stream_index: String,
    pub start_time: NaiveDateTime,
}

impl Recording {
    /// Last component of the remote path, for log lines.
    pub fn file_name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.remote_path)
    }

    /// Local file name: `<camera>-<YYYYMMDD>-<HHMMSS>.<ext>`.
    pub fn local_file_name(&self, camera_name: &str, extension: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            camera_name,
            self.start_time.format("%Y%m%d"),
            self.start_time.format("%H%M%S"),
            extension
        )
    }
}

/// Time window of a recording query plus the pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    cursor: u32,
}

impl QueryWindow {
    /// Inclusive 00:00:00 – 23:59:59 bounds of `date`, cursor at 0.
    pub fn for_date(date: NaiveDate) -> Self {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self {
            start: date.and_time(NaiveTime::MIN),
            end: date.and_time(last_second),
            cursor: 0,
        }
    }

    /// Number of records already retrieved (`skipCount`).
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Move past `count` records.  The cursor never goes backwards.
    pub fn advance(&mut self, count: u32) {
        self.cursor = self.cursor.saturating_add(count);
    }
}

/// Wrap `body` in the authenticated envelope.  `body` is inserted as is.
pub fn envelope(userid: &str, passwd_hash: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><soap:Envelope xmlns:soap=\"http://www.w3.org/2001/12/soap-envelope\">\
         <soap:Header>\t<userid>{}</userid>\t<passwd>{}</passwd></soap:Header>\
         <soap:Body>{}</soap:Body></soap:Envelope>",
        escape(userid),
        escape(passwd_hash),
        body
    )
}

/// Envelope for one page of a recording query.
pub fn query_envelope(userid: &str, passwd_hash: &str, window: &QueryWindow) -> String {
    let body = format!(
        "<RecordQueryInfo><Condition record_mode=\"{RECORD_MODE_ANY}\" \
         media_type=\"{MEDIA_TYPE_VIDEO}\" stream_index=\"{STREAM_INDEX_ANY}\" \
         min_size=\"{SIZE_UNBOUNDED}\" max_size=\"{SIZE_UNBOUNDED}\" \
         start_time=\"{}\" end_time=\"{}\" skipCount=\"{}\" /></RecordQueryInfo>",
        window.start.format(TIMESTAMP_FORMAT),
        window.end.format(TIMESTAMP_FORMAT),
        window.cursor()
    );
    envelope(userid, passwd_hash, &body)
}

/// Envelope for deleting one recording: the remote path is the whole body.
pub fn delete_envelope(userid: &str, passwd_hash: &str, remote_path: &str) -> String {
    envelope(userid, passwd_hash, &escape(remote_path))
}
