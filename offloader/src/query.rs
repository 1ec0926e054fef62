//! Recording discovery: pages through `getRecordQueryInfo` for one day.

use chrono::NaiveDate;
use tracing::{debug, error, info};

use jennov_common::protocol::{QueryWindow, Recording, TIMESTAMP_FORMAT};

use crate::client::CameraApi;
use crate::parser;

/// Upper bound on the skip count.  Recordings are at least one minute
/// long, so a day cannot hold more than 24 * 60 of them; this only stops
/// a device that never returns an empty page.
pub const MAX_CURSOR: u32 = 24 * 60;

/// Collect every recording the device reports for `date`.
///
/// Never fails: a transport error or an unreadable page ends discovery
/// and whatever earlier pages produced is returned.
pub fn query_recordings(api: &impl CameraApi, date: NaiveDate) -> Vec<Recording> {
    let mut window = QueryWindow::for_date(date);
    let mut recordings = Vec::new();

    while window.cursor() <= MAX_CURSOR {
        debug!(
            "Querying recordings from {} to {} with skip count {}",
            window.start.format(TIMESTAMP_FORMAT),
            window.end.format(TIMESTAMP_FORMAT),
            window.cursor()
        );

        let body = match api.query(&window) {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to query recordings: {e}");
                break;
            }
        };

        let page = match parser::parse_query_response(&body) {
            Ok(p) => p,
            Err(e) => {
                error!(
                    "Failed to parse query response at skip count {}: {e}",
                    window.cursor()
                );
                break;
            }
        };

        if page.item_count() == 0 {
            info!("No more recordings found.");
            break;
        }

        window.advance(u32::try_from(page.item_count()).unwrap_or(u32::MAX));
        recordings.extend(page.recordings);
    }

    if window.cursor() > MAX_CURSOR {
        error!(
            "Stopped paging at skip count {} (limit {MAX_CURSOR})",
            window.cursor()
        );
    }

    recordings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeCamera};
    use crate::parser::tests::response;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_two_calls_for_single_page() {
        let cam = FakeCamera::new().page(response(&[
            ("/a.mp4", "2024-06-01 01:00:00"),
            ("/b.mp4", "2024-06-01 02:00:00"),
            ("/c.mp4", "2024-06-01 03:00:00"),
        ]));

        let recs = query_recordings(&cam, date());
        assert_eq!(recs.len(), 3);
        assert_eq!(cam.calls(), vec![Call::Query(0), Call::Query(3)]);
    }

    #[test]
    fn test_cursor_is_running_sum() {
        let cam = FakeCamera::new()
            .page(response(&[
                ("/a.mp4", "2024-06-01 01:00:00"),
                ("/b.mp4", "2024-06-01 02:00:00"),
            ]))
            .page(response(&[("/c.mp4", "2024-06-01 03:00:00")]))
            .page(response(&[
                ("/d.mp4", "2024-06-01 04:00:00"),
                ("/e.mp4", "2024-06-01 05:00:00"),
                ("/f.mp4", "2024-06-01 06:00:00"),
            ]));

        let recs = query_recordings(&cam, date());
        assert_eq!(cam.query_cursors(), vec![0, 2, 3, 6]);
        let paths: Vec<&str> = recs.iter().map(|r| r.remote_path.as_str()).collect();
        assert_eq!(paths, ["/a.mp4", "/b.mp4", "/c.mp4", "/d.mp4", "/e.mp4", "/f.mp4"]);
    }

    #[test]
    fn test_skipped_items_advance_cursor() {
        let page = "<RecordQueryInfo>\
            <items filepath=\"/a.mp4\" filesize=\"1\" record_mode=\"1\" media_type=\"3\" stream_index=\"0\" start_time=\"2024-06-01 00:00:01\" />\
            <items filepath=\"/b.mp4\" record_mode=\"1\" media_type=\"3\" stream_index=\"0\" start_time=\"2024-06-01 00:00:02\" />\
            </RecordQueryInfo>";
        let cam = FakeCamera::new().page(page);

        let recs = query_recordings(&cam, date());
        assert_eq!(recs.len(), 1);
        assert_eq!(cam.query_cursors(), vec![0, 2]);
    }

    #[test]
    fn test_endless_device_is_bounded() {
        let cam = FakeCamera::new().repeat_forever(response(&[
            ("/a.mp4", "2024-06-01 01:00:00"),
            ("/b.mp4", "2024-06-01 02:00:00"),
            ("/c.mp4", "2024-06-01 03:00:00"),
            ("/d.mp4", "2024-06-01 04:00:00"),
            ("/e.mp4", "2024-06-01 05:00:00"),
            ("/f.mp4", "2024-06-01 06:00:00"),
            ("/g.mp4", "2024-06-01 07:00:00"),
        ]));

        let recs = query_recordings(&cam, date());
        let cursors = cam.query_cursors();
        assert!(cursors.iter().all(|&c| c <= MAX_CURSOR));
        // 0, 7, ..., 1435 -> 206 pages of 7
        assert_eq!(cursors.len(), 206);
        assert_eq!(recs.len(), 206 * 7);
    }

    #[test]
    fn test_malformed_first_page_yields_nothing() {
        let cam = FakeCamera::new().page("<html><body>oops");
        let recs = query_recordings(&cam, date());
        assert!(recs.is_empty());
        assert_eq!(cam.calls(), vec![Call::Query(0)]);
    }

    #[test]
    fn test_transport_failure_keeps_earlier_pages() {
        let cam = FakeCamera::new()
            .page(response(&[
                ("/a.mp4", "2024-06-01 01:00:00"),
                ("/b.mp4", "2024-06-01 02:00:00"),
            ]))
            .failing_page()
            .page(response(&[("/never.mp4", "2024-06-01 03:00:00")]));

        let recs = query_recordings(&cam, date());
        assert_eq!(recs.len(), 2);
        assert_eq!(cam.query_cursors(), vec![0, 2]);
    }
}
