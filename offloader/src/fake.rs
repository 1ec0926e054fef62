//! In-memory [`CameraApi`] used by the tests.  Records every call so
//! tests can assert on the exact request sequence.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::io::Write;

use reqwest::StatusCode;

use jennov_common::protocol::QueryWindow;

use crate::client::{CameraApi, DeviceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(u32),
    Download(String),
    Delete(String),
}

enum Page {
    Body(String),
    Fail,
}

pub struct FakeCamera {
    pages: RefCell<VecDeque<Page>>,
    /// Served once `pages` runs out.  `None` means an empty result page.
    repeat: Option<String>,
    failing_downloads: HashSet<String>,
    delete_status: StatusCode,
    calls: RefCell<Vec<Call>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            pages: RefCell::new(VecDeque::new()),
            repeat: None,
            failing_downloads: HashSet::new(),
            delete_status: StatusCode::ACCEPTED,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn page(self, body: impl Into<String>) -> Self {
        self.pages.borrow_mut().push_back(Page::Body(body.into()));
        self
    }

    pub fn failing_page(self) -> Self {
        self.pages.borrow_mut().push_back(Page::Fail);
        self
    }

    pub fn repeat_forever(mut self, body: impl Into<String>) -> Self {
        self.repeat = Some(body.into());
        self
    }

    pub fn fail_download(mut self, remote_path: &str) -> Self {
        self.failing_downloads.insert(remote_path.to_string());
        self
    }

    pub fn delete_status(mut self, status: StatusCode) -> Self {
        self.delete_status = status;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn query_cursors(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(cursor) => Some(cursor),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }
}

fn server_error(url: &str) -> DeviceError {
    DeviceError::Status {
        method: "POST",
        url: url.to_string(),
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl CameraApi for FakeCamera {
    fn query(&self, window: &QueryWindow) -> Result<String, DeviceError> {
        self.calls.borrow_mut().push(Call::Query(window.cursor()));
        match self.pages.borrow_mut().pop_front() {
            Some(Page::Body(body)) => Ok(body),
            Some(Page::Fail) => Err(server_error("fake/getRecordQueryInfo")),
            None => Ok(self
                .repeat
                .clone()
                .unwrap_or_else(|| "<RecordQueryInfo/>".to_string())),
        }
    }

    fn download(&self, remote_path: &str, out: &mut dyn Write) -> Result<u64, DeviceError> {
        self.calls
            .borrow_mut()
            .push(Call::Download(remote_path.to_string()));
        if self.failing_downloads.contains(remote_path) {
            out.write_all(b"partial")?;
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )
            .into());
        }
        let body = format!("video:{remote_path}");
        out.write_all(body.as_bytes())?;
        Ok(body.len() as u64)
    }

    fn delete(&self, remote_path: &str) -> Result<StatusCode, DeviceError> {
        self.calls
            .borrow_mut()
            .push(Call::Delete(remote_path.to_string()));
        Ok(self.delete_status)
    }
}
